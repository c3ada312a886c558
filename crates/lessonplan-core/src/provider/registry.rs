//! Provider registry: named lookup of configured content providers.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::trait_def::ContentProvider;

#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ContentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under [`ContentProvider::name`], returning any
    /// provider it replaced.
    pub fn register(
        &mut self,
        provider: impl ContentProvider + 'static,
    ) -> Option<Arc<dyn ContentProvider>> {
        self.register_arc(Arc::new(provider))
    }

    pub fn register_arc(
        &mut self,
        provider: Arc<dyn ContentProvider>,
    ) -> Option<Arc<dyn ContentProvider>> {
        self.providers.insert(provider.name().to_string(), provider)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ContentProvider>> {
        self.providers.get(name).cloned()
    }

    /// Registered names in sorted order.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list())
            .finish()
    }
}
