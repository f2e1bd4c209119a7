//! Databricks SQL warehouse client over the Statement Execution REST API

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{BoundParam, Credential, WarehouseClient, WarehouseTarget};
use crate::constants::DATE_FORMAT;
use crate::types::{ColumnMeta, ResultSet, Row, Value};
use crate::{Error, Result};

/// Bounds the API accepts for `wait_timeout`
const MIN_WAIT: Duration = Duration::from_secs(5);
const MAX_WAIT: Duration = Duration::from_secs(50);

const DEFAULT_WAIT: Duration = Duration::from_secs(30);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Databricks SQL warehouse client
///
/// Holds no connection state; every [`DatabricksSession`] owns its own HTTP
/// client and credential.
#[derive(Debug, Clone)]
pub struct DatabricksClient {
    wait_timeout: Duration,
    request_timeout: Duration,
}

impl Default for DatabricksClient {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl DatabricksClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Server-side wait before an unfinished statement is cancelled
    ///
    /// Clamped to the 5..=50 seconds the API accepts.
    #[must_use]
    pub fn with_wait_timeout(mut self, wait: Duration) -> Self {
        self.wait_timeout = wait.clamp(MIN_WAIT, MAX_WAIT);
        self
    }

    /// Client-side limit for a single HTTP request
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub const fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }
}

/// Authenticated HTTP session bound to one warehouse
#[derive(Debug)]
pub struct DatabricksSession {
    http: reqwest::Client,
    host: Url,
    warehouse_id: String,
    credential: Credential,
    wait_timeout: Duration,
}

impl DatabricksSession {
    pub fn warehouse_id(&self) -> &str {
        &self.warehouse_id
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.host.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("'{}' cannot be used as a base URL", self.host)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch_warehouse_info(&self) -> Result<WarehouseInfo> {
        let url = self.endpoint(&["api", "2.0", "sql", "warehouses", &self.warehouse_id])?;
        let response = self
            .http
            .get(url)
            .bearer_auth(self.credential.secret())
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    async fn submit(&self, request: &StatementRequest<'_>) -> Result<StatementResponse> {
        let url = self.endpoint(&["api", "2.0", "sql", "statements"])?;
        let response = self
            .http
            .post(url)
            .bearer_auth(self.credential.secret())
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    async fn fetch_chunk(&self, link: &str) -> Result<ResultChunk> {
        let url = self
            .host
            .join(link)
            .map_err(|e| Error::Query(format!("invalid chunk link '{link}': {e}")))?;
        let response = self
            .http
            .get(url)
            .bearer_auth(self.credential.secret())
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }
}

#[async_trait]
impl WarehouseClient for DatabricksClient {
    type Handle = DatabricksSession;

    async fn connect(&self, target: &WarehouseTarget) -> Result<Self::Handle> {
        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(concat!("loan-analytics/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        let session = DatabricksSession {
            http,
            host: target.host.clone(),
            warehouse_id: target.warehouse_id.clone(),
            credential: target.credential.clone(),
            wait_timeout: self.wait_timeout,
        };

        let info = session.fetch_warehouse_info().await?;
        tracing::info!(
            warehouse_id = %session.warehouse_id,
            warehouse_name = info.name.as_deref().unwrap_or_default(),
            state = info.state.as_deref().unwrap_or("UNKNOWN"),
            "Connected to SQL warehouse"
        );
        Ok(session)
    }

    async fn execute_query(
        &self,
        handle: &Self::Handle,
        sql: &str,
        params: &[BoundParam],
    ) -> Result<ResultSet> {
        let request = StatementRequest {
            warehouse_id: &handle.warehouse_id,
            statement: sql,
            parameters: params,
            wait_timeout: format!("{}s", handle.wait_timeout.as_secs()),
            on_wait_timeout: "CANCEL",
            format: "JSON_ARRAY",
            disposition: "INLINE",
        };

        let response = handle.submit(&request).await?;
        let statement_id = response.statement_id.clone().unwrap_or_default();
        tracing::debug!(
            statement_id = %statement_id,
            state = ?response.status.state,
            "Statement returned"
        );

        let (columns, chunk) = response.into_success()?;
        let mut rows = decode_rows(&columns, chunk.data_array.unwrap_or_default())?;

        let mut next = chunk.next_chunk_internal_link;
        while let Some(link) = next {
            let chunk = handle.fetch_chunk(&link).await?;
            rows.extend(decode_rows(&columns, chunk.data_array.unwrap_or_default())?);
            next = chunk.next_chunk_internal_link;
        }

        Ok(ResultSet { columns, rows })
    }

    async fn ping(&self, handle: &Self::Handle) -> Result<()> {
        handle.fetch_warehouse_info().await.map(|_| ())
    }

    async fn close(&self, _handle: &Self::Handle) -> Result<()> {
        // statements run with INLINE disposition leave nothing to release
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    warehouse_id: &'a str,
    statement: &'a str,
    #[serde(skip_serializing_if = "<[BoundParam]>::is_empty")]
    parameters: &'a [BoundParam],
    wait_timeout: String,
    on_wait_timeout: &'static str,
    format: &'static str,
    disposition: &'static str,
}

#[derive(Debug, Deserialize)]
struct WarehouseInfo {
    name: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: StatementState,
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    error_code: Option<String>,
    message: Option<String>,
}

impl ApiError {
    fn describe(&self, fallback: &str) -> String {
        match (&self.error_code, &self.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (None, Some(message)) => message.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => fallback.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManifestColumn {
    name: String,
    type_name: Option<String>,
    type_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestSchema {
    #[serde(default)]
    columns: Vec<ManifestColumn>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    schema: ManifestSchema,
}

#[derive(Debug, Default, Deserialize)]
struct ResultChunk {
    data_array: Option<Vec<Vec<Option<String>>>>,
    next_chunk_internal_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    statement_id: Option<String>,
    status: StatementStatus,
    manifest: Option<Manifest>,
    result: Option<ResultChunk>,
}

impl StatementResponse {
    /// Column metadata and first chunk of a finished statement
    fn into_success(self) -> Result<(Vec<ColumnMeta>, ResultChunk)> {
        let error = self.status.error.unwrap_or_default();
        match self.status.state {
            StatementState::Succeeded => {
                let columns = self
                    .manifest
                    .map(|m| m.schema.columns)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|c| {
                        let type_name = c.type_name.or(c.type_text).unwrap_or_default();
                        ColumnMeta::new(c.name, type_name)
                    })
                    .collect();
                Ok((columns, self.result.unwrap_or_default()))
            }
            StatementState::Failed => Err(Error::Query(error.describe("statement failed"))),
            StatementState::Canceled | StatementState::Closed => Err(Error::Connection(
                error.describe("statement was cancelled before completion"),
            )),
            StatementState::Pending | StatementState::Running => Err(Error::Connection(
                "statement did not finish within the wait timeout".into(),
            )),
            StatementState::Unknown => Err(Error::Query(error.describe("unknown statement state"))),
        }
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_builder() {
        Error::Config(format!("Invalid warehouse request: {e}"))
    } else if e.is_timeout() {
        Error::Connection(format!("warehouse request timed out: {e}"))
    } else {
        Error::Connection(format!("warehouse unreachable: {e}"))
    }
}

/// Map a non-success HTTP status to an error kind
fn status_error(status: StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<ApiError>(body)
        .map(|e| e.describe(status.as_str()))
        .unwrap_or_else(|_| status.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Config(format!("warehouse rejected the credential ({status}): {detail}"))
        }
        StatusCode::NOT_FOUND => Error::Config(format!("warehouse not found ({status}): {detail}")),
        StatusCode::TOO_MANY_REQUESTS => {
            Error::Connection(format!("warehouse is rate limiting ({status}): {detail}"))
        }
        s if s.is_server_error() => {
            Error::Connection(format!("warehouse unavailable ({status}): {detail}"))
        }
        _ => Error::Query(format!("warehouse rejected the request ({status}): {detail}")),
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    if !status.is_success() {
        return Err(status_error(status, &body));
    }
    serde_json::from_str(&body)
        .map_err(|e| Error::Query(format!("unexpected warehouse response: {e}")))
}

fn decode_rows(columns: &[ColumnMeta], data: Vec<Vec<Option<String>>>) -> Result<Vec<Row>> {
    data.into_iter()
        .map(|cells| {
            if cells.len() != columns.len() {
                return Err(Error::Query(format!(
                    "row has {} cells but the manifest declares {} columns",
                    cells.len(),
                    columns.len()
                )));
            }
            Ok(columns
                .iter()
                .zip(cells)
                .map(|(column, cell)| (column.name.clone(), decode_cell(&column.type_name, cell)))
                .collect())
        })
        .collect()
}

/// Decode one `JSON_ARRAY` cell; values that fail to parse stay text
fn decode_cell(type_name: &str, cell: Option<String>) -> Value {
    let Some(raw) = cell else {
        return Value::Null;
    };
    let base = type_name
        .split(['(', '<'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_uppercase();

    let parsed = match base.as_str() {
        "BOOLEAN" => raw.parse::<bool>().ok().map(Value::Bool),
        "TINYINT" | "BYTE" | "SMALLINT" | "SHORT" | "INT" | "INTEGER" | "BIGINT" | "LONG" => {
            raw.parse::<i64>().ok().map(Value::Int)
        }
        "FLOAT" | "REAL" | "DOUBLE" | "DECIMAL" | "DEC" | "NUMERIC" => {
            raw.parse::<f64>().ok().map(Value::Float)
        }
        "DATE" => NaiveDate::parse_from_str(&raw, DATE_FORMAT).ok().map(Value::Date),
        _ => None,
    };
    parsed.unwrap_or(Value::Text(raw))
}
