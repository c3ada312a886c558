//! The `ContentProvider` trait.

use async_trait::async_trait;

use crate::error::ProviderError;

/// Something that turns a prompt into raw lesson content.
///
/// Implementations do not retry and do not enforce a deadline; the
/// orchestrator owns both. A provider future may be dropped at any await
/// point and must not leave work running behind it.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Name recorded on generation attempts (e.g. "claude-cli").
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn ContentProvider) {}
};
