use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(ReviewStatus {
    NotFlagged => "not_flagged",
    Pending => "pending",
    Approved => "approved",
    Dismissed => "dismissed",
});

// Only the reviewer-assignable states. NotFlagged and Pending are set by
// the pipeline and cannot be submitted.
str_enum!(ReviewAction {
    Approved => "approved",
    Dismissed => "dismissed",
});

impl ReviewStatus {
    /// Approved and Dismissed never return to Pending.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Dismissed)
    }

    pub fn all() -> &'static [ReviewStatus] {
        &[Self::NotFlagged, Self::Pending, Self::Approved, Self::Dismissed]
    }
}

impl From<ReviewAction> for ReviewStatus {
    fn from(action: ReviewAction) -> Self {
        match action {
            ReviewAction::Approved => Self::Approved,
            ReviewAction::Dismissed => Self::Dismissed,
        }
    }
}
