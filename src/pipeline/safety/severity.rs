//! Severity ladders for the risk fields.
//!
//! Each risk dimension owns its own ordered level enum and rank function.
//! Ranks are explicit numbers, never declaration order. Free text is first
//! matched exactly, then by keyword with negation ("no plan", "denies SI").
//! A value that still does not land on a ladder ranks above "none" and
//! below every risk level: it never replaces a detected risk, and a bare
//! "none" never discards it.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The risk-assessment fields that receive guardrail scrutiny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskField {
    SuicidalIdeation,
    HomicidalIdeation,
    SelfHarm,
}

impl RiskField {
    /// Key inside the `risk_assessment` category.
    pub fn key(&self) -> &'static str {
        match self {
            Self::SuicidalIdeation => "suicidal_ideation",
            Self::HomicidalIdeation => "homicidal_ideation",
            Self::SelfHarm => "self_harm",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SuicidalIdeation => "Suicidal ideation",
            Self::HomicidalIdeation => "Homicidal ideation",
            Self::SelfHarm => "Self-harm",
        }
    }

    pub fn all() -> &'static [RiskField] {
        &[Self::SuicidalIdeation, Self::HomicidalIdeation, Self::SelfHarm]
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|f| f.key() == key)
    }

    /// Allowed level names, least to most severe, for prompts.
    pub fn levels(&self) -> &'static [&'static str] {
        match self {
            Self::SuicidalIdeation => SuicidalIdeationLevel::NAMES,
            Self::HomicidalIdeation => HomicidalIdeationLevel::NAMES,
            Self::SelfHarm => SelfHarmLevel::NAMES,
        }
    }

    /// Rank a free-text value on this field's ladder.
    pub fn severity_of(&self, value: Option<&str>) -> Severity {
        let Some(text) = value else {
            return Severity::Known(0);
        };
        let key = squash(text);
        if key.is_empty() || is_absent(&key) {
            return Severity::Known(0);
        }
        let exact = match self {
            Self::SuicidalIdeation => SuicidalIdeationLevel::parse(&key).map(|l| l.rank()),
            Self::HomicidalIdeation => HomicidalIdeationLevel::parse(&key).map(|l| l.rank()),
            Self::SelfHarm => SelfHarmLevel::parse(&key).map(|l| l.rank()),
        };
        if let Some(rank) = exact {
            return Severity::Known(rank);
        }

        let words = Words::new(text);
        let loose = match self {
            Self::SuicidalIdeation => SuicidalIdeationLevel::parse_words(&words).map(|l| l.rank()),
            Self::HomicidalIdeation => {
                HomicidalIdeationLevel::parse_words(&words).map(|l| l.rank())
            }
            Self::SelfHarm => SelfHarmLevel::parse_words(&words).map(|l| l.rank()),
        };
        match loose {
            Some(rank) => Severity::Known(rank),
            None if words.is_denial() => Severity::Known(0),
            None => Severity::Unrecognized,
        }
    }
}

impl fmt::Display for RiskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Position of a value on a risk ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Known(u8),
    Unrecognized,
}

impl Severity {
    /// None < Unrecognized < every risk level.
    fn order_key(&self) -> u16 {
        match self {
            Self::Known(rank) => u16::from(*rank) * 2,
            Self::Unrecognized => 1,
        }
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lowercase and drop everything but letters and digits:
/// "Active - with plan" → "activewithplan".
fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_absent(key: &str) -> bool {
    matches!(
        key,
        "none" | "no" | "denied" | "denies" | "absent" | "negative" | "notpresent" | "false" | "null"
    )
}

/// Lowercased words of a free-text value with negation scope marked.
struct Words {
    words: Vec<(String, bool)>,
    has_negator: bool,
}

/// Words negated by a preceding negator: "no plan or intent".
const NEGATION_SCOPE: usize = 3;

impl Words {
    fn new(text: &str) -> Self {
        let mut words = Vec::new();
        let mut has_negator = false;
        let mut negated_left = 0;
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            if is_negator(&word) {
                has_negator = true;
                negated_left = NEGATION_SCOPE;
                continue;
            }
            words.push((word, negated_left > 0));
            negated_left = negated_left.saturating_sub(1);
        }
        Self { words, has_negator }
    }

    /// Some affirmed (not negated) word satisfies `pred`.
    fn affirms(&self, pred: impl Fn(&str) -> bool) -> bool {
        self.words.iter().any(|(w, negated)| !negated && pred(w))
    }

    fn any(&self, words: &[&str]) -> bool {
        self.affirms(|w| words.contains(&w))
    }

    /// A denial with nothing affirmed on the ladder: "Denies SI".
    fn is_denial(&self) -> bool {
        self.has_negator
    }
}

fn is_negator(word: &str) -> bool {
    word.starts_with("deni")
        || word.starts_with("deny")
        || matches!(word, "no" | "none" | "not" | "without" | "negative" | "never" | "absent")
}

// ── Suicidal ideation ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuicidalIdeationLevel {
    None,
    Passive,
    ActiveNoPlan,
    ActiveWithPlan,
    ActiveWithIntent,
}

impl SuicidalIdeationLevel {
    pub const NAMES: &'static [&'static str] =
        &["None", "Passive", "ActiveNoPlan", "ActiveWithPlan", "ActiveWithIntent"];

    pub fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Passive => 1,
            Self::ActiveNoPlan => 2,
            Self::ActiveWithPlan => 3,
            Self::ActiveWithIntent => 4,
        }
    }

    fn parse(key: &str) -> Option<Self> {
        match key {
            "none" => Some(Self::None),
            "passive" | "passivedeathwish" | "passivewish" => Some(Self::Passive),
            "active" | "activenoplan" | "activewithoutplan" => Some(Self::ActiveNoPlan),
            "activewithplan" | "withplan" | "plan" => Some(Self::ActiveWithPlan),
            "activewithintent" | "withintent" | "intent" | "activewithplanandintent" => {
                Some(Self::ActiveWithIntent)
            }
            _ => None,
        }
    }

    fn parse_words(words: &Words) -> Option<Self> {
        if words.any(&["intent", "intends", "intention"]) {
            Some(Self::ActiveWithIntent)
        } else if words.any(&["plan", "plans", "planned", "planning"]) {
            Some(Self::ActiveWithPlan)
        } else if words.any(&["active", "actively"]) {
            Some(Self::ActiveNoPlan)
        } else if words.any(&["passive", "passively", "wish", "wishes"]) {
            Some(Self::Passive)
        } else {
            None
        }
    }
}

// ── Homicidal ideation ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomicidalIdeationLevel {
    None,
    Passive,
    Active,
    ActiveWithPlan,
    ActiveWithIntent,
}

impl HomicidalIdeationLevel {
    pub const NAMES: &'static [&'static str] =
        &["None", "Passive", "Active", "ActiveWithPlan", "ActiveWithIntent"];

    pub fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Passive => 1,
            Self::Active => 2,
            Self::ActiveWithPlan => 3,
            Self::ActiveWithIntent => 4,
        }
    }

    fn parse(key: &str) -> Option<Self> {
        match key {
            "none" => Some(Self::None),
            "passive" | "fleeting" | "vague" => Some(Self::Passive),
            "active" | "activenoplan" | "activewithoutplan" | "explicitthreat"
            | "explicitthreats" => Some(Self::Active),
            "activewithplan" | "withplan" | "plan" => Some(Self::ActiveWithPlan),
            "activewithintent" | "withintent" | "intent" | "activewithplanandintent" => {
                Some(Self::ActiveWithIntent)
            }
            _ => None,
        }
    }

    fn parse_words(words: &Words) -> Option<Self> {
        if words.any(&["intent", "intends", "intention"]) {
            Some(Self::ActiveWithIntent)
        } else if words.any(&["plan", "plans", "planned", "planning"]) {
            Some(Self::ActiveWithPlan)
        } else if words.affirms(|w| w == "active" || w == "actively" || w.starts_with("threat")) {
            Some(Self::Active)
        } else if words.any(&["passive", "fleeting", "vague"]) {
            Some(Self::Passive)
        } else {
            None
        }
    }
}

// ── Self-harm ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelfHarmLevel {
    None,
    Historical,
    Urges,
    Recent,
    Current,
}

impl SelfHarmLevel {
    pub const NAMES: &'static [&'static str] = &["None", "Historical", "Urges", "Recent", "Current"];

    pub fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Historical => 1,
            Self::Urges => 2,
            Self::Recent => 3,
            Self::Current => 4,
        }
    }

    fn parse(key: &str) -> Option<Self> {
        match key {
            "none" => Some(Self::None),
            "historical" | "history" | "past" | "remote" => Some(Self::Historical),
            "urges" | "urge" | "thoughts" => Some(Self::Urges),
            "recent" | "recentepisode" => Some(Self::Recent),
            "current" | "ongoing" | "active" => Some(Self::Current),
            _ => None,
        }
    }

    fn parse_words(words: &Words) -> Option<Self> {
        if words.any(&["current", "currently", "ongoing", "active"]) {
            Some(Self::Current)
        } else if words.any(&["recent", "recently"]) {
            Some(Self::Recent)
        } else if words.any(&["urge", "urges", "thoughts"]) {
            Some(Self::Urges)
        } else if words.any(&["historical", "history", "past", "remote", "prior"]) {
            Some(Self::Historical)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suicidal_ladder_is_ordered() {
        let f = RiskField::SuicidalIdeation;
        let ranks: Vec<Severity> = SuicidalIdeationLevel::NAMES
            .iter()
            .map(|n| f.severity_of(Some(n)))
            .collect();
        assert!(ranks.windows(2).all(|w| w[0] < w[1]), "{ranks:?}");
    }

    #[test]
    fn every_ladder_parses_its_own_names() {
        for field in RiskField::all() {
            for name in field.levels() {
                assert!(
                    matches!(field.severity_of(Some(name)), Severity::Known(_)),
                    "{field}: {name}"
                );
            }
        }
    }

    #[test]
    fn spacing_and_case_are_ignored() {
        let f = RiskField::SuicidalIdeation;
        assert_eq!(
            f.severity_of(Some("active with plan")),
            f.severity_of(Some("ActiveWithPlan"))
        );
        assert_eq!(f.severity_of(Some("ACTIVE_NO_PLAN")), Severity::Known(2));
    }

    #[test]
    fn absent_values_rank_lowest() {
        let f = RiskField::HomicidalIdeation;
        assert_eq!(f.severity_of(None), Severity::Known(0));
        assert_eq!(f.severity_of(Some("")), Severity::Known(0));
        assert_eq!(f.severity_of(Some("Denies")), Severity::Known(0));
        assert_eq!(f.severity_of(Some("false")), Severity::Known(0));
    }

    #[test]
    fn unrecognized_sits_between_none_and_risk() {
        let f = RiskField::SelfHarm;
        let unclear = f.severity_of(Some("unclear, see note"));
        assert_eq!(unclear, Severity::Unrecognized);
        assert!(unclear > f.severity_of(Some("None")));
        assert!(unclear < f.severity_of(Some("Historical")));
        assert!(unclear < f.severity_of(Some("Current")));
    }

    #[test]
    fn clinical_shorthand_lands_on_ladder() {
        let si = RiskField::SuicidalIdeation;
        assert_eq!(si.severity_of(Some("Denies SI")), Severity::Known(0));
        assert_eq!(si.severity_of(Some("No SI reported")), Severity::Known(0));
        assert_eq!(si.severity_of(Some("Passive SI")), Severity::Known(1));
        assert_eq!(si.severity_of(Some("Passive SI, no plan or intent")), Severity::Known(1));
        assert_eq!(si.severity_of(Some("Active SI without plan")), Severity::Known(2));
        assert_eq!(si.severity_of(Some("SI with a specific plan")), Severity::Known(3));
        assert_eq!(si.severity_of(Some("Active SI, plan and intent")), Severity::Known(4));

        let hi = RiskField::HomicidalIdeation;
        assert_eq!(hi.severity_of(Some("Denies HI")), Severity::Known(0));
        assert_eq!(hi.severity_of(Some("Threatened coworker")), Severity::Known(2));

        let sh = RiskField::SelfHarm;
        assert_eq!(sh.severity_of(Some("History of cutting, none recent")), Severity::Known(1));
        assert_eq!(sh.severity_of(Some("Cut arm last week, recent episode")), Severity::Known(3));
    }

    #[test]
    fn ladders_differ_per_field() {
        assert_eq!(
            RiskField::SelfHarm.severity_of(Some("Historical")),
            Severity::Known(1)
        );
        assert_eq!(
            RiskField::SuicidalIdeation.severity_of(Some("Historical")),
            Severity::Unrecognized
        );
    }

    #[test]
    fn field_keys_roundtrip() {
        for field in RiskField::all() {
            assert_eq!(RiskField::from_key(field.key()), Some(*field));
        }
        assert_eq!(RiskField::from_key("mood"), None);
    }
}
