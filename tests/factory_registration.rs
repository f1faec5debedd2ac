//! The process-wide factory slot is global state, so it gets its own test binary.
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flow_resource::config::ResourceConfig;
use flow_resource::definition::link_expr::{
    clear_link_expr_manager_factory, register_link_expr_manager_factory,
    registered_link_expr_manager_factory,
};
use flow_resource::definition::{
    FlowDefinition, Link, LinkExprError, LinkExprManager, LinkExprManagerFactory,
};
use flow_resource::flow::{FlowManager, Materializer};
use serde_json::{Value, json};

struct Fixed(bool);

impl LinkExprManager for Fixed {
    fn eval_link_expr(&self, _: &Link, _: &HashMap<String, Value>) -> Result<bool, LinkExprError> {
        Ok(self.0)
    }
}

struct FixedFactory {
    answer: bool,
    built: AtomicUsize,
}

impl FixedFactory {
    fn new(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            built: AtomicUsize::new(0),
        })
    }
}

impl LinkExprManagerFactory for FixedFactory {
    fn new_link_expr_manager(&self, _: &FlowDefinition) -> Arc<dyn LinkExprManager> {
        self.built.fetch_add(1, Ordering::SeqCst);
        Arc::new(Fixed(self.answer))
    }
}

fn resource(id: &str) -> ResourceConfig {
    let data = json!({
        "name": id,
        "rootTask": {
            "id": "root",
            "tasks": [{ "id": "a" }, { "id": "b" }],
            "links": [{ "type": 1, "from": "a", "to": "b", "value": "1 > 2" }]
        }
    });
    ResourceConfig::new(id, serde_json::to_vec(&data).unwrap(), false)
}

fn follows_link(mgr: &FlowManager, id: &str) -> bool {
    let def = mgr.get_resource(id).unwrap();
    def.link_expr_manager()
        .unwrap()
        .eval_link_expr(def.get_link(0).unwrap(), &HashMap::new())
        .unwrap()
}

// One test so the steps run in order against the shared slot.
#[test]
fn test_factory_resolution_order() {
    // 1) nothing registered: Rhai evaluates `1 > 2`
    assert!(registered_link_expr_manager_factory().is_none());
    let mgr = FlowManager::new(None);
    mgr.load_resource(&resource("builtin")).unwrap();
    assert!(!follows_link(&mgr, "builtin"));

    // 2) registered factory replaces the built-in one
    let registered = FixedFactory::new(true);
    register_link_expr_manager_factory(registered.clone());
    mgr.load_resource(&resource("registered")).unwrap();
    assert!(follows_link(&mgr, "registered"));
    assert_eq!(registered.built.load(Ordering::SeqCst), 1);

    // already materialized definitions keep their manager
    assert!(!follows_link(&mgr, "builtin"));

    // 3) an injected factory wins over the registered one
    let injected = FixedFactory::new(false);
    let mgr = FlowManager::with_materializer(None, Materializer::with_factory(injected.clone()));
    mgr.load_resource(&resource("injected")).unwrap();
    assert!(!follows_link(&mgr, "injected"));
    assert_eq!(injected.built.load(Ordering::SeqCst), 1);
    assert_eq!(registered.built.load(Ordering::SeqCst), 1);

    // 4) clearing falls back to Rhai again
    clear_link_expr_manager_factory();
    assert!(registered_link_expr_manager_factory().is_none());
    let mgr = FlowManager::new(None);
    mgr.load_resource(&resource("cleared")).unwrap();
    assert!(!follows_link(&mgr, "cleared"));
    assert_eq!(registered.built.load(Ordering::SeqCst), 1);
}
