//! Fetching flow definitions that are not preloaded.
use async_trait::async_trait;
use reqwest::Client;
use tokio::fs;
use tracing::{error, info, warn};

use crate::{
    decode::{self, Encoding, FLOW_COMPRESSED_HEADER, GZIP_MAGIC, GzipSniffing},
    definition::DefinitionRep,
    flow::{Origin, ResourceError},
    util::{URI_SCHEME_FILE, url_to_file_path},
};

/// Turns a flow URI into its raw representation.
///
/// Implementations can be swapped in when the [`FlowManager`](crate::flow::FlowManager)
/// is built; the default is [`BasicRemoteFlowProvider`].
#[async_trait]
pub trait RemoteFlowProvider: Send + Sync {
    async fn get_flow(&self, uri: &str) -> Result<DefinitionRep, ResourceError>;
}

/// Reads `file://` URIs from disk and fetches everything else with a plain HTTP GET.
#[derive(Debug, Clone, Default)]
pub struct BasicRemoteFlowProvider {
    client: Client,
    sniffing: GzipSniffing,
}

impl BasicRemoteFlowProvider {
    pub fn new(sniffing: GzipSniffing) -> Self {
        Self {
            client: Client::new(),
            sniffing,
        }
    }

    pub fn sniffing(&self) -> GzipSniffing {
        self.sniffing
    }

    async fn load_file(&self, uri: &str) -> Result<Vec<u8>, ResourceError> {
        info!("Loading Local Flow: {}", uri);
        let origin = || Origin::Uri(uri.to_string());

        let path = url_to_file_path(uri).map_err(|message| ResourceError::Read {
            origin: origin(),
            message,
        })?;
        let bytes = fs::read(&path).await.map_err(|e| {
            let err = ResourceError::Read {
                origin: origin(),
                message: e.to_string(),
            };
            error!("{}", err);
            err
        })?;

        let encoding = Encoding::sniff_file(&bytes, self.sniffing);
        if encoding == Encoding::Plain
            && self.sniffing == GzipSniffing::Legacy
            && bytes.starts_with(&GZIP_MAGIC)
        {
            warn!(
                "{} starts with the gzip magic 1f 8b but legacy sniffing only matches 0x8b at offset 2; reading it as JSON",
                uri
            );
        }

        decode::decode(&bytes, encoding).map_err(|source| {
            let err = ResourceError::Decode {
                origin: origin(),
                source,
            };
            error!("{}", err);
            err
        })
    }

    async fn load_http(&self, uri: &str) -> Result<Vec<u8>, ResourceError> {
        let origin = || Origin::Uri(uri.to_string());

        let resp = self.client.get(uri).send().await.map_err(|e| {
            let err = ResourceError::Transport {
                origin: origin(),
                message: e.to_string(),
            };
            error!("{}", err);
            err
        })?;

        let status = resp.status();
        info!(%status, "response status for {}", uri);

        if status.as_u16() >= 300 {
            let err = ResourceError::Status {
                origin: origin(),
                status: status.as_u16(),
            };
            error!("{}", err);
            return Err(err);
        }

        // grab the header before the body consumes the response
        let encoding = Encoding::from_flow_compressed_header(
            resp.headers()
                .get(FLOW_COMPRESSED_HEADER)
                .and_then(|v| v.to_str().ok()),
        );

        let body = resp.bytes().await.map_err(|e| {
            let err = ResourceError::Transport {
                origin: origin(),
                message: format!("error reading response body: {}", e),
            };
            error!("{}", err);
            err
        })?;

        decode::decode(&body, encoding).map_err(|source| {
            let err = ResourceError::Decode {
                origin: origin(),
                source,
            };
            error!("{}", err);
            err
        })
    }
}

#[async_trait]
impl RemoteFlowProvider for BasicRemoteFlowProvider {
    async fn get_flow(&self, uri: &str) -> Result<DefinitionRep, ResourceError> {
        let bytes = if uri.starts_with(URI_SCHEME_FILE) {
            self.load_file(uri).await?
        } else {
            self.load_http(uri).await?
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            let err = ResourceError::Parse {
                origin: Origin::Uri(uri.to_string()),
                message: e.to_string(),
            };
            error!("{}", err);
            err
        })
    }
}
