use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lifecycle of one rule within a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// Registered, target module not loaded yet
    Installed,
    Activated,
    /// Target export did not qualify; left untouched
    Skipped { reason: String },
}

#[derive(Debug, Default)]
struct RegistryState {
    rules: BTreeMap<String, Activation>,
    modules: BTreeSet<String>,
}

/// Tracks which rules and interceptor modules are live in this process.
///
/// Shared between loaders through an `Arc`; every transition goes through
/// the lock so a rule is claimed by exactly one load.
#[derive(Debug, Default)]
pub struct ActivationRegistry {
    state: Mutex<RegistryState>,
}

impl ActivationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark an interceptor module as registered. False if it already was.
    pub fn register_module(&self, name: &str) -> bool {
        self.lock().modules.insert(name.to_string())
    }

    pub fn is_module_registered(&self, name: &str) -> bool {
        self.lock().modules.contains(name)
    }

    /// Record a rule as installed. Existing state is kept.
    pub fn install(&self, rule_id: &str) -> bool {
        let mut state = self.lock();
        if state.rules.contains_key(rule_id) {
            return false;
        }
        state
            .rules
            .insert(rule_id.to_string(), Activation::Installed);
        true
    }

    /// Move an installed rule to `Activated`. Only the first caller wins.
    pub fn claim(&self, rule_id: &str) -> bool {
        let mut state = self.lock();
        match state.rules.get_mut(rule_id) {
            Some(activation) if *activation == Activation::Installed => {
                *activation = Activation::Activated;
                true
            }
            _ => false,
        }
    }

    /// Record that a claimed rule could not be applied.
    pub fn skip(&self, rule_id: &str, reason: impl Into<String>) {
        self.lock().rules.insert(
            rule_id.to_string(),
            Activation::Skipped {
                reason: reason.into(),
            },
        );
    }

    pub fn state(&self, rule_id: &str) -> Option<Activation> {
        self.lock().rules.get(rule_id).cloned()
    }

    /// Rules installed but never exercised, because their module never loaded.
    pub fn report(&self) -> Vec<String> {
        self.lock()
            .rules
            .iter()
            .filter(|(_, a)| **a == Activation::Installed)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Return every rule to `Installed`. Module registrations are kept.
    pub fn reset(&self) {
        for activation in self.lock().rules.values_mut() {
            *activation = Activation::Installed;
        }
    }
}
