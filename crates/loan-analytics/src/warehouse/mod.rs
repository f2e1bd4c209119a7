//! SQL warehouse client abstraction and the shared connection handle

#[cfg(feature = "databricks")]
mod databricks;
mod provider;

use std::fmt;

use async_trait::async_trait;
#[cfg(feature = "databricks")]
pub use databricks::{DatabricksClient, DatabricksSession};
pub use provider::{ConnectionProvider, DEFAULT_CONNECTION_MAX_AGE};
use serde::Serialize;
use url::Url;

use crate::Result;
use crate::types::ResultSet;

/// Credential passed through to the warehouse
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Personal access or service principal token
    Token(String),
}

impl Credential {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(token.into())
    }

    pub(crate) fn secret(&self) -> &str {
        match self {
            Self::Token(token) => token,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(***)"),
        }
    }
}

/// Fully specified warehouse to connect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseTarget {
    pub host: Url,
    pub warehouse_id: String,
    pub credential: Credential,
}

/// Named parameter sent alongside a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundParam {
    pub name: String,
    pub value: String,
    /// Warehouse SQL type name, e.g. `DATE`
    #[serde(rename = "type")]
    pub sql_type: &'static str,
}

/// Minimal surface the query layer needs from a SQL warehouse
///
/// A handle is created once by [`ConnectionProvider`] and shared by all
/// concurrent callers, so implementations must allow concurrent use of
/// `execute_query` on the same handle.
#[async_trait]
pub trait WarehouseClient: Send + Sync + fmt::Debug + 'static {
    type Handle: Send + Sync + fmt::Debug + 'static;

    /// Open a session; unusable configuration must map to `Error::Config`
    async fn connect(&self, target: &WarehouseTarget) -> Result<Self::Handle>;

    /// Execute one statement with named parameters
    async fn execute_query(
        &self,
        handle: &Self::Handle,
        sql: &str,
        params: &[BoundParam],
    ) -> Result<ResultSet>;

    /// Lightweight liveness check
    async fn ping(&self, handle: &Self::Handle) -> Result<()>;

    /// Release server-side resources held by the handle
    async fn close(&self, handle: &Self::Handle) -> Result<()>;
}
