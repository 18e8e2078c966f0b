use super::export::{CallError, Export, NativeFn};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Shape an export must have before a rule may rebind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Function { arity: usize },
    AnyFunction,
    Value,
}

impl Capability {
    /// `Err` carries the reason the export does not qualify.
    pub fn check(&self, export: &Export) -> Result<(), String> {
        match (self, export) {
            (Capability::Function { arity }, Export::Function { arity: actual, .. }) => {
                if arity == actual {
                    Ok(())
                } else {
                    Err(format!("expected arity {arity}, found {actual}"))
                }
            }
            (Capability::AnyFunction, Export::Function { .. }) => Ok(()),
            (Capability::Value, Export::Value(_)) => Ok(()),
            (expected, found) => Err(format!(
                "expected {}, found {}",
                expected.describe(),
                found.kind()
            )),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Capability::Function { .. } | Capability::AnyFunction => "function",
            Capability::Value => "value",
        }
    }
}

pub type Rebind = Arc<dyn Fn(Export) -> Export + Send + Sync>;

/// Rebinds one export of one module, at most once per registry.
#[derive(Clone)]
pub struct InterceptorRule {
    pub id: String,
    pub module: String,
    pub export: String,
    pub capability: Capability,
    rebind: Rebind,
}

impl InterceptorRule {
    pub fn new<F>(
        id: impl Into<String>,
        module: impl Into<String>,
        export: impl Into<String>,
        capability: Capability,
        rebind: F,
    ) -> Self
    where
        F: Fn(Export) -> Export + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            module: module.into(),
            export: export.into(),
            capability,
            rebind: Arc::new(rebind),
        }
    }

    pub fn rebind(&self, original: Export) -> Export {
        (self.rebind)(original)
    }
}

impl fmt::Debug for InterceptorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorRule")
            .field("id", &self.id)
            .field("module", &self.module)
            .field("export", &self.export)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// Rebinder that wraps a function export. `wrapper` receives the call's
/// arguments and the original function. Non-function exports pass through.
pub fn around<F>(wrapper: F) -> impl Fn(Export) -> Export + Send + Sync + 'static
where
    F: Fn(&[Value], &dyn Fn(&[Value]) -> Result<Value, CallError>) -> Result<Value, CallError>
        + Send
        + Sync
        + 'static,
{
    let wrapper = Arc::new(wrapper);
    move |original| match original {
        Export::Function { arity, call } => {
            let wrapper = Arc::clone(&wrapper);
            let wrapped: NativeFn = Arc::new(move |args: &[Value]| wrapper(args, &*call));
            Export::Function {
                arity,
                call: wrapped,
            }
        }
        other => other,
    }
}
