//! Query functions, one module per table.

pub mod context_entries;
pub mod curriculum;
pub mod generation_attempts;
pub mod lesson_plans;
pub mod mappings;
