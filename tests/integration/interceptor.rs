//! Load-time interception through the public bootstrap API.

use drift_patcher::intercept::{
    around, Activation, ActivationRegistry, Bootstrap, Capability, Export, InterceptorModule,
    InterceptorRule, MemorySource, ModuleExports,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Forces TLS on the IDE probe even when the on-disk patch did not land.
struct SecureProbe {
    rebinds: Arc<AtomicUsize>,
}

impl InterceptorModule for SecureProbe {
    fn name(&self) -> &str {
        "secure-probe"
    }

    fn rules(&self) -> Vec<InterceptorRule> {
        let rebinds = Arc::clone(&self.rebinds);
        let secure = around(|args, original| {
            let url = original(args)?;
            let url = url.as_str().unwrap_or_default();
            Ok(Value::String(url.replacen("ws://", "wss://", 1)))
        });
        vec![InterceptorRule::new(
            "secure-probe.url",
            "ide-probe",
            "probeUrl",
            Capability::Function { arity: 1 },
            move |export| {
                rebinds.fetch_add(1, Ordering::SeqCst);
                secure(export)
            },
        )]
    }
}

fn host_modules() -> MemorySource {
    MemorySource::new().with_module(ModuleExports::new("ide-probe").with(
        "probeUrl",
        Export::function(1, |args| Ok(json!(format!("ws://127.0.0.1:{}", args[0])))),
    ))
}

#[test]
fn test_export_rebound_once_per_registry() {
    let registry = Arc::new(ActivationRegistry::new());
    let rebinds = Arc::new(AtomicUsize::new(0));
    let mut loader = Bootstrap::new(Arc::clone(&registry))
        .module(SecureProbe {
            rebinds: Arc::clone(&rebinds),
        })
        .install(host_modules());

    let probe = loader.load("ide-probe").unwrap();
    let url = probe.get("probeUrl").unwrap().call(&[json!(9229)]).unwrap();
    assert_eq!(url, json!("wss://127.0.0.1:9229"));

    loader.evict("ide-probe");
    loader.load("ide-probe").unwrap();
    loader.load("ide-probe").unwrap();
    assert_eq!(rebinds.load(Ordering::SeqCst), 1);
    assert_eq!(
        registry.state("secure-probe.url"),
        Some(Activation::Activated)
    );
    assert!(registry.report().is_empty());
}

#[test]
fn test_reset_allows_reactivation() {
    let registry = Arc::new(ActivationRegistry::new());
    let rebinds = Arc::new(AtomicUsize::new(0));
    let mut loader = Bootstrap::new(Arc::clone(&registry))
        .module(SecureProbe {
            rebinds: Arc::clone(&rebinds),
        })
        .install(host_modules());

    loader.load("ide-probe").unwrap();
    loader.evict("ide-probe");
    registry.reset();
    loader.load("ide-probe").unwrap();

    assert_eq!(rebinds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_shape_change_fails_closed() {
    let registry = Arc::new(ActivationRegistry::new());
    let rebinds = Arc::new(AtomicUsize::new(0));
    // Upstream turned probeUrl into a two-argument function
    let source = MemorySource::new().with_module(ModuleExports::new("ide-probe").with(
        "probeUrl",
        Export::function(2, |args| {
            Ok(json!(format!("ws://{}:{}", args[0].as_str().unwrap_or(""), args[1])))
        }),
    ));

    let mut loader = Bootstrap::new(Arc::clone(&registry))
        .module(SecureProbe {
            rebinds: Arc::clone(&rebinds),
        })
        .install(source);

    let probe = loader.load("ide-probe").unwrap();
    let url = probe
        .get("probeUrl")
        .unwrap()
        .call(&[json!("localhost"), json!(9229)])
        .unwrap();
    assert_eq!(url, json!("ws://localhost:9229"));
    assert_eq!(rebinds.load(Ordering::SeqCst), 0);
    assert_eq!(
        registry.state("secure-probe.url"),
        Some(Activation::Skipped {
            reason: "expected arity 1, found 2".to_string()
        })
    );
}

#[test]
fn test_never_loaded_module_is_reported() {
    let registry = Arc::new(ActivationRegistry::new());
    let _loader = Bootstrap::new(Arc::clone(&registry))
        .module(SecureProbe {
            rebinds: Arc::new(AtomicUsize::new(0)),
        })
        .install(host_modules());

    assert_eq!(registry.report(), vec!["secure-probe.url".to_string()]);
}
