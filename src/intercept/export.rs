use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("expected {expected} argument(s), got {got}")]
    Arity { expected: usize, got: usize },

    #[error("export is not callable")]
    NotCallable,

    #[error("{0}")]
    Failed(String),
}

pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, CallError> + Send + Sync>;

/// A single named export of a loaded module.
#[derive(Clone)]
pub enum Export {
    Function { arity: usize, call: NativeFn },
    Value(Value),
}

impl Export {
    pub fn function<F>(arity: usize, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Export::Function {
            arity,
            call: Arc::new(f),
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        match self {
            Export::Function { arity, call } => {
                if args.len() != *arity {
                    return Err(CallError::Arity {
                        expected: *arity,
                        got: args.len(),
                    });
                }
                call(args)
            }
            Export::Value(_) => Err(CallError::NotCallable),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Export::Value(v) => Some(v),
            Export::Function { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Export::Function { .. } => "function",
            Export::Value(_) => "value",
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Export::Function { arity, .. } => write!(f, "Function(arity={arity})"),
            Export::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

/// Everything a module exposes, keyed by export name.
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    pub specifier: String,
    exports: BTreeMap<String, Export>,
}

impl ModuleExports {
    pub fn new(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            exports: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, export: Export) -> Self {
        self.insert(name, export);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, export: Export) -> Option<Export> {
        self.exports.insert(name.into(), export)
    }

    pub fn get(&self, name: &str) -> Option<&Export> {
        self.exports.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("module '{specifier}' not found")]
    NotFound { specifier: String },

    #[error("module '{specifier}' failed to load: {message}")]
    Source { specifier: String, message: String },
}

/// Host-side module resolution.
pub trait ModuleSource {
    fn resolve(&self, specifier: &str) -> Result<ModuleExports, LoadError>;
}

/// Fixed set of modules held in memory; the embedding host registers its
/// modules here before handing the source to a loader.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    modules: BTreeMap<String, ModuleExports>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module: ModuleExports) -> Self {
        self.modules.insert(module.specifier.clone(), module);
        self
    }
}

impl ModuleSource for MemorySource {
    fn resolve(&self, specifier: &str) -> Result<ModuleExports, LoadError> {
        self.modules
            .get(specifier)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                specifier: specifier.to_string(),
            })
    }
}
