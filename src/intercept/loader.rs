use super::export::{LoadError, ModuleExports, ModuleSource};
use super::registry::ActivationRegistry;
use super::rule::InterceptorRule;
use std::collections::HashMap;
use std::sync::Arc;

/// Wraps a [`ModuleSource`] and applies interceptor rules the first time a
/// module loads, before any caller sees its exports.
pub struct InterceptingLoader<S> {
    source: S,
    rules: Vec<InterceptorRule>,
    registry: Arc<ActivationRegistry>,
    cache: HashMap<String, ModuleExports>,
}

impl<S: ModuleSource> InterceptingLoader<S> {
    pub fn new(source: S, registry: Arc<ActivationRegistry>) -> Self {
        Self {
            source,
            rules: Vec::new(),
            registry,
            cache: HashMap::new(),
        }
    }

    pub fn add_rule(&mut self, rule: InterceptorRule) {
        self.registry.install(&rule.id);
        tracing::debug!(rule = %rule.id, module = %rule.module, "interceptor rule installed");
        self.rules.push(rule);
    }

    pub fn load(&mut self, specifier: &str) -> Result<&ModuleExports, LoadError> {
        if !self.cache.contains_key(specifier) {
            let mut exports = self.source.resolve(specifier)?;
            self.intercept(&mut exports);
            self.cache.insert(specifier.to_string(), exports);
        }
        self.cache
            .get(specifier)
            .ok_or_else(|| LoadError::NotFound {
                specifier: specifier.to_string(),
            })
    }

    /// Drop a module from the cache so the next load resolves it again.
    pub fn evict(&mut self, specifier: &str) -> bool {
        self.cache.remove(specifier).is_some()
    }

    fn intercept(&self, exports: &mut ModuleExports) {
        let specifier = exports.specifier.clone();
        for rule in self.rules.iter().filter(|r| r.module == specifier) {
            if !self.registry.claim(&rule.id) {
                tracing::debug!(rule = %rule.id, "already settled; leaving export as loaded");
                continue;
            }

            let Some(original) = exports.get(&rule.export).cloned() else {
                let reason = format!("export '{}' not found", rule.export);
                tracing::warn!(rule = %rule.id, %reason, "interceptor skipped");
                self.registry.skip(&rule.id, reason);
                continue;
            };

            if let Err(reason) = rule.capability.check(&original) {
                tracing::warn!(rule = %rule.id, %reason, "interceptor skipped");
                self.registry.skip(&rule.id, reason);
                continue;
            }

            exports.insert(rule.export.clone(), rule.rebind(original));
            tracing::info!(
                rule = %rule.id,
                module = %rule.module,
                export = %rule.export,
                "interceptor activated"
            );
        }
    }
}
