//! Database queries

pub mod analytics;
pub mod contact;
pub mod operator;
