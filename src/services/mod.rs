//! Domain services

pub mod export;
pub mod rate_limiter;
pub mod recorder;
pub mod spam;
pub mod validation;
