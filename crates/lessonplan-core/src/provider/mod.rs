//! AI content provider seam.
//!
//! ```text
//! GenerationOrchestrator
//!     |
//!     v
//! Arc<dyn ContentProvider> --generate(prompt)--> Result<String, ProviderError>
//!     |
//!     +-- CommandProvider  (local CLI, prompt on stdin)
//!     `-- HttpProvider     (OpenAI-compatible chat completions)
//! ```
//!
//! [`ProviderRegistry`] maps configured names to providers.

pub mod command;
pub mod http;
pub mod registry;
pub mod trait_def;

pub use command::CommandProvider;
pub use http::HttpProvider;
pub use registry::ProviderRegistry;
pub use trait_def::ContentProvider;

pub use crate::error::ProviderError;
