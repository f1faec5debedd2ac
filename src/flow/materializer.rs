use std::sync::Arc;

use tracing::debug;

use crate::{
    definition::{
        DefinitionRep, FlowDefinition, LinkExprManagerFactory, RhaiLinkExprManagerFactory,
        link_expr::registered_link_expr_manager_factory,
    },
    flow::{Origin, ResourceError},
};

/// Builds runnable definitions: validates the representation, then binds a
/// link expression manager to it.
///
/// The factory is picked at materialization time, in this order: the one
/// given to [`Materializer::with_factory`], the process-wide registered one,
/// and finally [`RhaiLinkExprManagerFactory`].
#[derive(Clone, Default)]
pub struct Materializer {
    factory: Option<Arc<dyn LinkExprManagerFactory>>,
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materializer")
            .field("injected_factory", &self.factory.is_some())
            .finish()
    }
}

impl Materializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factory(factory: Arc<dyn LinkExprManagerFactory>) -> Self {
        Self {
            factory: Some(factory),
        }
    }

    fn resolve_factory(&self) -> Arc<dyn LinkExprManagerFactory> {
        self.factory
            .clone()
            .or_else(registered_link_expr_manager_factory)
            .unwrap_or_else(|| Arc::new(RhaiLinkExprManagerFactory))
    }

    pub fn materialize(
        &self,
        rep: DefinitionRep,
        origin: Origin,
    ) -> Result<Arc<FlowDefinition>, ResourceError> {
        let mut def = FlowDefinition::new(rep)
            .map_err(|source| ResourceError::Materialize { origin: origin.clone(), source })?;

        let factory = self.resolve_factory();
        def.set_link_expr_manager(factory.new_link_expr_manager(&def));
        // TODO: initialize activities once an activity registry exists
        debug!(flow = def.name(), "materialized {}", origin);

        Ok(Arc::new(def))
    }
}
