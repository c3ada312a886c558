//! Lesson plan generation and curriculum alignment.
//!
//! ```text
//! GenerationOrchestrator
//!     |-- CurriculumMatcher  --> CurriculumSource (lookup)
//!     |-- ContextStore       --> LessonStore
//!     |-- assemble_prompt    (pure)
//!     |-- ContentProvider    (AI collaborator)
//!     |-- parse_content      (pure)
//!     `-- LessonLifecycle    --> LessonStore (only status writer)
//! ```

pub mod content;
pub mod context;
pub mod curriculum;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod request;
pub mod store;
