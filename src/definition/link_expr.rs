//! Evaluation of expression links.
//!
//! A [`FlowDefinition`] is only runnable once a [`LinkExprManager`] is bound to
//! it. Managers are produced by a [`LinkExprManagerFactory`]; the built-in one
//! compiles every expression link as a [Rhai](https://rhai.rs) expression.
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use rhai::{AST, Dynamic, Engine, Scope};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::{FlowDefinition, Link, LinkType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkExprError {
    #[error("link {link} expression failed to compile: {message}")]
    Compile { link: usize, message: String },

    #[error("link {link} expression failed to evaluate: {message}")]
    Eval { link: usize, message: String },

    #[error("link {link} expression returned `{type_name}`, expected a boolean")]
    NotBoolean { link: usize, type_name: String },

    #[error("link {link} ({from} -> {to}) does not belong to this definition")]
    UnknownLink { link: usize, from: String, to: String },
}

pub trait LinkExprManager: Send + Sync {
    /// Decide whether `link` should be followed. Links that are not
    /// expression links are always followed.
    fn eval_link_expr(
        &self,
        link: &Link,
        scope: &HashMap<String, Value>,
    ) -> Result<bool, LinkExprError>;
}

pub trait LinkExprManagerFactory: Send + Sync {
    fn new_link_expr_manager(&self, def: &FlowDefinition) -> Arc<dyn LinkExprManager>;
}

static REGISTERED_FACTORY: Lazy<RwLock<Option<Arc<dyn LinkExprManagerFactory>>>> =
    Lazy::new(|| RwLock::new(None));

/// Install a process-wide factory, consulted when a materializer has none of its own.
pub fn register_link_expr_manager_factory(factory: Arc<dyn LinkExprManagerFactory>) {
    let mut slot = REGISTERED_FACTORY
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = Some(factory);
}

pub fn registered_link_expr_manager_factory() -> Option<Arc<dyn LinkExprManagerFactory>> {
    REGISTERED_FACTORY
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

pub fn clear_link_expr_manager_factory() {
    let mut slot = REGISTERED_FACTORY
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = None;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RhaiLinkExprManagerFactory;

impl LinkExprManagerFactory for RhaiLinkExprManagerFactory {
    fn new_link_expr_manager(&self, def: &FlowDefinition) -> Arc<dyn LinkExprManager> {
        Arc::new(RhaiLinkExprManager::compile(def))
    }
}

/// Holds one pre-compiled AST per expression link of a definition.
pub struct RhaiLinkExprManager {
    engine: Engine,
    // link id -> compiled expression, or the compile error to report on use
    exprs: HashMap<usize, CompiledExpr>,
}

struct CompiledExpr {
    from: String,
    to: String,
    source: String,
    ast: Result<AST, String>,
}

impl CompiledExpr {
    // ids are only unique within one definition
    fn compiled_from(&self, link: &Link) -> bool {
        self.from == link.from()
            && self.to == link.to()
            && self.source == link.value().unwrap_or_default()
    }
}

impl fmt::Debug for RhaiLinkExprManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RhaiLinkExprManager")
            .field("exprs", &self.exprs.len())
            .finish()
    }
}

impl RhaiLinkExprManager {
    pub fn compile(def: &FlowDefinition) -> Self {
        let engine = Engine::new();
        let mut exprs = HashMap::new();
        for link in def.links() {
            if link.link_type() != LinkType::Expression {
                continue;
            }
            let source = link.value().unwrap_or_default();
            let ast = engine.compile_expression(source).map_err(|e| {
                warn!(flow = def.name(), link = link.id(), "link expression does not compile: {}", e);
                e.to_string()
            });
            exprs.insert(
                link.id(),
                CompiledExpr {
                    from: link.from().to_string(),
                    to: link.to().to_string(),
                    source: source.to_string(),
                    ast,
                },
            );
        }
        debug!(flow = def.name(), count = exprs.len(), "compiled link expressions");
        Self { engine, exprs }
    }
}

impl LinkExprManager for RhaiLinkExprManager {
    fn eval_link_expr(
        &self,
        link: &Link,
        scope: &HashMap<String, Value>,
    ) -> Result<bool, LinkExprError> {
        if link.link_type() != LinkType::Expression {
            return Ok(true);
        }
        let compiled = self
            .exprs
            .get(&link.id())
            .filter(|c| c.compiled_from(link))
            .ok_or_else(|| LinkExprError::UnknownLink {
                link: link.id(),
                from: link.from().to_string(),
                to: link.to().to_string(),
            })?;
        let ast = compiled.ast.as_ref().map_err(|message| LinkExprError::Compile {
            link: link.id(),
            message: message.clone(),
        })?;

        let mut rhai_scope = Scope::new();
        for (k, v) in scope {
            if let Ok(dynamic) = rhai::serde::to_dynamic(v) {
                rhai_scope.push_dynamic(k.as_str(), dynamic);
            }
        }

        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut rhai_scope, ast)
            .map_err(|e| LinkExprError::Eval {
                link: link.id(),
                message: e.to_string(),
            })?;
        result.as_bool().map_err(|type_name| LinkExprError::NotBoolean {
            link: link.id(),
            type_name: type_name.to_string(),
        })
    }
}
