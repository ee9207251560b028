use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type PluginFactory<T> = Arc<dyn Fn() -> Arc<T> + Send + Sync>;

/// Maps locator strings (the URLs a directory advertises) to statically linked implementations.
/// Used for signaling stubs and codecs
pub struct PluginRegistry<T: ?Sized> {
    factories: RwLock<HashMap<String, PluginFactory<T>>>,
}

impl<T: ?Sized> Default for PluginRegistry<T> {
    fn default() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: ?Sized> PluginRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `locator`, replacing any previous registration
    pub fn register<F>(&self, locator: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        let locator = locator.into();
        log::trace!(target: "parley", "Registering plugin {locator}");
        let _ = self.factories.write().insert(locator, Arc::new(factory));
    }

    /// Produces a fresh instance. `None` if nothing is registered under `locator`
    pub fn instantiate(&self, locator: &str) -> Option<Arc<T>> {
        let factory = self.factories.read().get(locator).cloned()?;
        Some((factory)())
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.factories.read().contains_key(locator)
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::capabilities::{Codec, PlainCodec};
    use serde_json::json;

    #[test]
    fn instantiates_registered_factories_only() {
        let registry = PluginRegistry::<dyn Codec>::new();
        assert!(registry.is_empty());
        registry.register("codec:plain", || Arc::new(PlainCodec) as Arc<dyn Codec>);

        assert!(registry.contains("codec:plain"));
        assert!(registry.instantiate("codec:chat").is_none());

        let codec = registry.instantiate("codec:plain").unwrap();
        assert_eq!(codec.decode(b"1").unwrap(), json!(1));
    }
}
