//! Load-time interception of module exports inside a host process.
//!
//! Some behavior cannot be fixed on disk: dependency internals that get
//! reinstalled, or fixes that must hold even when the on-disk patch failed.
//! A host resolves modules through an [`InterceptingLoader`], which rebinds
//! selected exports the first time their module loads. Whether a rule has
//! fired lives in an [`ActivationRegistry`] handed in at construction.

pub mod bootstrap;
pub mod export;
pub mod loader;
pub mod registry;
pub mod rule;

pub use bootstrap::{Bootstrap, InterceptorModule};
pub use export::{CallError, Export, LoadError, MemorySource, ModuleExports, ModuleSource, NativeFn};
pub use loader::InterceptingLoader;
pub use registry::{Activation, ActivationRegistry};
pub use rule::{around, Capability, InterceptorRule, Rebind};
