pub mod severity;
pub mod keywords;
pub mod types;
pub mod guardrail;

pub use severity::*;
pub use keywords::*;
pub use types::*;
pub use guardrail::*;
