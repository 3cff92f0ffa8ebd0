//! Feature and favorites store access

pub mod favorites;
pub mod features;

pub use favorites::*;
pub use features::*;
