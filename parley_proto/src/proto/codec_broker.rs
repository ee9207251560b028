use crate::constants::BUILTIN_PLAIN_CODEC_LOCATOR;
use crate::error::SessionError;
use crate::proto::capabilities::{Codec, PlainCodec};
use crate::proto::identity::Identity;
use crate::proto::registry::PluginRegistry;
use parking_lot::Mutex;
use parley_types::prelude::{Address, DemandValue, PayloadType};
use std::collections::HashMap;
use std::sync::Arc;

/// Codec instances keyed by locator. Shared by every conversation of a session; an instance is
/// created at most once and never evicted
pub struct CodecCache {
    registry: PluginRegistry<dyn Codec>,
    instances: Mutex<HashMap<String, Arc<dyn Codec>>>,
}

impl Default for CodecCache {
    fn default() -> Self {
        Self::new(PluginRegistry::new())
    }
}

impl CodecCache {
    pub fn new(registry: PluginRegistry<dyn Codec>) -> Self {
        registry.register(BUILTIN_PLAIN_CODEC_LOCATOR, || {
            Arc::new(PlainCodec) as Arc<dyn Codec>
        });

        Self {
            registry,
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &PluginRegistry<dyn Codec> {
        &self.registry
    }

    pub fn load(&self, locator: &str) -> Result<Arc<dyn Codec>, SessionError> {
        let mut instances = self.instances.lock();
        if let Some(codec) = instances.get(locator) {
            return Ok(codec.clone());
        }

        let codec = self
            .registry
            .instantiate(locator)
            .ok_or_else(|| SessionError::CodecLoadError(locator.to_string()))?;
        log::trace!(target: "parley", "Loaded codec {locator}");
        let _ = instances.insert(locator.to_string(), codec.clone());
        Ok(codec)
    }

    pub fn is_loaded(&self, locator: &str) -> bool {
        self.instances.lock().contains_key(locator)
    }
}

#[derive(Clone)]
pub struct CodecBinding {
    pub locator: String,
    pub codec: Arc<dyn Codec>,
}

type BindingMap = HashMap<Address, HashMap<Address, HashMap<PayloadType, CodecBinding>>>;

/// Binds payload types to codecs per `(from, to)` pair. Created lazily by a conversation the first
/// time it uses a data channel
pub struct CodecBroker {
    cache: Arc<CodecCache>,
    map: BindingMap,
}

impl CodecBroker {
    pub fn new(cache: Arc<CodecCache>) -> Self {
        Self {
            cache,
            map: HashMap::new(),
        }
    }

    /// Binds the codec `to` advertises for `requested`. Payload types `to` does not advertise
    /// degrade to plain; only an explicit `false` is refused
    pub fn bind(
        &mut self,
        from: &Address,
        to: &Identity,
        requested: &DemandValue,
    ) -> Result<(PayloadType, Arc<dyn Codec>), SessionError> {
        let payload_type = Self::negotiate(to, requested)?;
        let locator = to
            .codec_locator(&payload_type)
            .unwrap_or(BUILTIN_PLAIN_CODEC_LOCATOR)
            .to_string();
        let codec = self.cache.load(&locator)?;

        log::trace!(target: "parley", "Bound {payload_type} codec {locator} for {from} -> {}", to.address());
        let _ = self
            .map
            .entry(from.clone())
            .or_default()
            .entry(to.address().clone())
            .or_default()
            .insert(
                payload_type.clone(),
                CodecBinding {
                    locator,
                    codec: codec.clone(),
                },
            );

        Ok((payload_type, codec))
    }

    /// Finds an existing binding without loading anything. A payload type without a binding of
    /// its own falls back to the plain binding
    pub fn lookup(
        &self,
        from: &Address,
        to: &Address,
        requested: &DemandValue,
    ) -> Option<(PayloadType, &CodecBinding)> {
        let payload_type = match requested {
            DemandValue::Flag(false) => return None,
            DemandValue::PayloadType(payload_type) if !payload_type.is_empty() => {
                PayloadType::from(payload_type.as_str())
            }
            _ => PayloadType::plain(),
        };

        let bindings = self.map.get(from)?.get(to)?;
        bindings
            .get(&payload_type)
            .map(|binding| (payload_type, binding))
            .or_else(|| {
                let plain = PayloadType::plain();
                bindings.get(&plain).map(|binding| (plain, binding))
            })
    }

    /// Removes one binding. Loaded codec instances stay cached
    pub fn unbind(&mut self, from: &Address, to: &Address, payload_type: &PayloadType) -> bool {
        self.map
            .get_mut(from)
            .and_then(|targets| targets.get_mut(to))
            .and_then(|bindings| bindings.remove(payload_type))
            .is_some()
    }

    pub fn cache(&self) -> &Arc<CodecCache> {
        &self.cache
    }

    fn negotiate(to: &Identity, requested: &DemandValue) -> Result<PayloadType, SessionError> {
        match requested {
            DemandValue::Flag(false) => Err(SessionError::PayloadRejected {
                to: to.address().to_string(),
            }),
            DemandValue::PayloadType(payload_type) if !payload_type.is_empty() => {
                let payload_type = PayloadType::from(payload_type.as_str());
                if to.codec_locator(&payload_type).is_some() {
                    Ok(payload_type)
                } else {
                    Ok(PayloadType::plain())
                }
            }
            _ => Ok(PayloadType::plain()),
        }
    }
}
