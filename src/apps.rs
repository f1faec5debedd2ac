use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::{
    config::{AppConfig, ManagerSettings, RESOURCE_TYPE_FLOW, resource_type},
    definition::LinkExprManagerFactory,
    flow::{BasicRemoteFlowProvider, FlowManager, Materializer, RemoteFlowProvider},
};

/// Wires a [`FlowManager`] from settings and an optional app descriptor.
///
/// The manager is handed back to the caller; there is no process-wide
/// default instance.
pub struct App {
    name: Option<String>,
    flow_manager: Arc<FlowManager>,
}

impl App {
    /// Bootstraps the resource manager:
    ///   - builds the provider with the configured gzip sniffing
    ///   - picks the link expression factory (`factory`, else the registered or built-in one)
    ///   - preloads every flow resource listed in `app_config`
    pub fn bootstrap(
        settings: &ManagerSettings,
        app_config: Option<&AppConfig>,
        factory: Option<Arc<dyn LinkExprManagerFactory>>,
    ) -> Result<Self> {
        // 1) provider & materializer
        let provider: Arc<dyn RemoteFlowProvider> =
            Arc::new(BasicRemoteFlowProvider::new(settings.gzip_sniffing));
        let materializer = match factory {
            Some(factory) => Materializer::with_factory(factory),
            None => Materializer::new(),
        };
        let flow_manager = FlowManager::with_materializer(Some(provider), materializer);

        // 2) preload resources
        let Some(app) = app_config else {
            return Ok(App {
                name: None,
                flow_manager,
            });
        };
        for resource in &app.resources {
            match resource_type(&resource.id) {
                Some(ty) if ty != RESOURCE_TYPE_FLOW => {
                    warn!("Skipping resource `{}` of unsupported type `{}`", resource.id, ty);
                    continue;
                }
                _ => {}
            }
            if let Err(err) = flow_manager.load_resource(resource) {
                error!("Could not load resource: {}", err);
                return Err(err).with_context(|| format!("Failed to bootstrap app `{}`", app.name));
            }
        }
        info!(
            "App `{}` ready with {} flow resources",
            app.name,
            flow_manager.resource_ids().len()
        );

        Ok(App {
            name: Some(app.name.clone()),
            flow_manager,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn flow_manager(&self) -> Arc<FlowManager> {
        self.flow_manager.clone()
    }
}
