//! Type definitions

pub mod analytics;
pub mod contact;
pub mod messages;
pub mod operator;

pub use analytics::*;
pub use contact::*;
pub use messages::*;
pub use operator::*;
