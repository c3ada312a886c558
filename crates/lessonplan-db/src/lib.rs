//! Persistence layer for lesson plans, context entries, curriculum
//! standards, curriculum mappings and the generation attempt log.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
