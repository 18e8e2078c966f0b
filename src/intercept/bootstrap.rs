use super::export::ModuleSource;
use super::loader::InterceptingLoader;
use super::registry::ActivationRegistry;
use super::rule::InterceptorRule;
use std::sync::Arc;

/// A named group of rules installed together at process start.
pub trait InterceptorModule {
    fn name(&self) -> &str;

    fn rules(&self) -> Vec<InterceptorRule>;
}

/// Installs a fixed, ordered list of interceptor modules into a loader.
pub struct Bootstrap {
    registry: Arc<ActivationRegistry>,
    modules: Vec<Box<dyn InterceptorModule>>,
}

impl Bootstrap {
    pub fn new(registry: Arc<ActivationRegistry>) -> Self {
        Self {
            registry,
            modules: Vec::new(),
        }
    }

    pub fn module(mut self, module: impl InterceptorModule + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Register every module once and hand back a loader carrying their rules.
    pub fn install<S: ModuleSource>(self, source: S) -> InterceptingLoader<S> {
        let mut loader = InterceptingLoader::new(source, Arc::clone(&self.registry));

        for module in &self.modules {
            let name = module.name();
            if !self.registry.register_module(name) {
                tracing::info!(module = name, "interceptor module already registered; skipping");
                continue;
            }
            let rules = module.rules();
            let count = rules.len();
            for rule in rules {
                loader.add_rule(rule);
            }
            tracing::info!(module = name, rules = count, "interceptor module registered");
        }

        loader
    }
}
