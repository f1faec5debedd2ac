//! FlowManager: resolves flow ids and URIs into materialized definitions.
use std::borrow::Cow;
use std::sync::Arc;

use dashmap::DashMap;
use moka::future::Cache;
use tracing::{debug, info, warn};

use crate::{
    config::ResourceConfig,
    decode::decode_and_unzip,
    definition::{DefinitionRep, FlowDefinition},
    flow::{
        Origin, ResourceError,
        materializer::Materializer,
        provider::{BasicRemoteFlowProvider, RemoteFlowProvider},
    },
};

/// Prefix of URIs resolved against preloaded resources instead of being fetched.
pub const URI_SCHEME_RES: &str = "res://";

/// Holds two tiers of flows:
///
/// - preloaded resources, registered explicitly through [`FlowManager::load_resource`]
///   and addressed as `res://<id>`;
/// - remote flows, fetched through the [`RemoteFlowProvider`] the first time
///   their URI is asked for and kept for the life of the manager.
///
/// Remote fetches are coalesced per URI: concurrent callers asking for the
/// same URI share a single fetch, while different URIs fetch independently.
/// A failed fetch is handed to everyone waiting on it and is not remembered,
/// so the next call tries again.
pub struct FlowManager {
    res_flows: DashMap<String, Arc<FlowDefinition>>,
    remote_flows: Cache<String, Arc<FlowDefinition>>,
    provider: Arc<dyn RemoteFlowProvider>,
    materializer: Materializer,
}

impl FlowManager {
    /// `None` selects the [`BasicRemoteFlowProvider`].
    pub fn new(provider: Option<Arc<dyn RemoteFlowProvider>>) -> Arc<Self> {
        Self::with_materializer(provider, Materializer::new())
    }

    pub fn with_materializer(
        provider: Option<Arc<dyn RemoteFlowProvider>>,
        materializer: Materializer,
    ) -> Arc<Self> {
        let provider =
            provider.unwrap_or_else(|| Arc::new(BasicRemoteFlowProvider::default()));
        Arc::new(FlowManager {
            res_flows: DashMap::new(),
            // no capacity bound and no expiry: entries live as long as the manager
            remote_flows: Cache::builder().build(),
            provider,
            materializer,
        })
    }

    /// Decode, parse and materialize a resource, then store it under its id,
    /// replacing whatever was there before.
    pub fn load_resource(&self, config: &ResourceConfig) -> Result<(), ResourceError> {
        let origin = Origin::Resource(config.id.clone());

        let bytes: Cow<'_, [u8]> = if config.compressed {
            let decoded = decode_and_unzip(&config.data).map_err(|source| {
                ResourceError::Decode {
                    origin: origin.clone(),
                    source,
                }
            })?;
            Cow::Owned(decoded)
        } else {
            Cow::Borrowed(&config.data)
        };

        let rep: DefinitionRep =
            serde_json::from_slice(&bytes).map_err(|e| ResourceError::Parse {
                origin: origin.clone(),
                message: e.to_string(),
            })?;

        let flow = self.materializer.materialize(rep, origin)?;
        if self.res_flows.insert(config.id.clone(), flow).is_some() {
            info!("Replaced flow resource: {}", config.id);
        } else {
            info!("Registered flow resource: {}", config.id);
        }
        Ok(())
    }

    /// A preloaded flow, if one is registered under `id`.
    pub fn get_resource(&self, id: &str) -> Option<Arc<FlowDefinition>> {
        self.res_flows.get(id).map(|entry| entry.value().clone())
    }

    pub fn resource_ids(&self) -> Vec<String> {
        self.res_flows.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Resolve a flow URI.
    ///
    /// `res://<id>` only looks at preloaded resources and yields `Ok(None)`
    /// when the id is unknown; the provider is never consulted. Any other URI
    /// is served from the remote cache or fetched and materialized on a miss.
    #[tracing::instrument(skip(self))]
    pub async fn get_flow(&self, uri: &str) -> Result<Option<Arc<FlowDefinition>>, ResourceError> {
        if let Some(id) = uri.strip_prefix(URI_SCHEME_RES) {
            return Ok(self.get_resource(id));
        }

        let key = uri.to_string();
        if let Some(flow) = self.remote_flows.get(&key).await {
            debug!("remote flow cache hit");
            return Ok(Some(flow));
        }

        self.remote_flows
            .try_get_with(key, self.fetch_and_materialize(uri))
            .await
            .map(Some)
            .map_err(|err| ResourceError::clone(&err))
    }

    async fn fetch_and_materialize(&self, uri: &str) -> Result<Arc<FlowDefinition>, ResourceError> {
        let result = match self.provider.get_flow(uri).await {
            Ok(rep) => self.materializer.materialize(rep, Origin::Uri(uri.to_string())),
            Err(err) => Err(err),
        };
        match &result {
            Ok(flow) => info!("Fetched flow `{}` from {}", flow.name(), uri),
            Err(err) => warn!("Could not load remote flow: {}", err),
        }
        result
    }

    /// Whether a remote flow is already materialized for `uri`.
    pub fn is_cached(&self, uri: &str) -> bool {
        self.remote_flows.contains_key(uri)
    }

    pub fn remote_flow_count(&self) -> usize {
        self.remote_flows.iter().count()
    }
}
