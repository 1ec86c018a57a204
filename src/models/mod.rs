pub mod enums;
pub mod extraction;
pub mod review;

pub use extraction::*;
pub use review::*;
