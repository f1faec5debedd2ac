pub mod manager;
pub mod materializer;
pub mod provider;

use std::fmt;

use thiserror::Error;

use crate::decode::DecodeError;
use crate::definition::DefinitionError;

pub use manager::FlowManager;
pub use materializer::Materializer;
pub use provider::{BasicRemoteFlowProvider, RemoteFlowProvider};

/// Where a flow came from, for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A preloaded resource, by id.
    Resource(String),
    /// A fetched flow, by URI.
    Uri(String),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Resource(id) => write!(f, "resource with id '{}'", id),
            Origin::Uri(uri) => write!(f, "flow with uri '{}'", uri),
        }
    }
}

/// Everything that can go wrong turning an id or URI into a flow definition.
///
/// Causes are kept as values (not boxed sources) so one failed fetch can be
/// handed to every caller that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("error decoding {origin}: {source}")]
    Decode {
        origin: Origin,
        #[source]
        source: DecodeError,
    },

    #[error("error reading {origin}: {message}")]
    Read { origin: Origin, message: String },

    #[error("error getting {origin}: {message}")]
    Transport { origin: Origin, message: String },

    #[error("error getting {origin}: status code {status}")]
    Status { origin: Origin, status: u16 },

    #[error("error parsing {origin}: {message}")]
    Parse { origin: Origin, message: String },

    #[error("error materializing {origin}: {source}")]
    Materialize {
        origin: Origin,
        #[source]
        source: DefinitionError,
    },
}

impl ResourceError {
    pub fn origin(&self) -> &Origin {
        match self {
            ResourceError::Decode { origin, .. }
            | ResourceError::Read { origin, .. }
            | ResourceError::Transport { origin, .. }
            | ResourceError::Status { origin, .. }
            | ResourceError::Parse { origin, .. }
            | ResourceError::Materialize { origin, .. } => origin,
        }
    }
}
