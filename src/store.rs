use crate::model::IdentityKey;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub type Row = Value;

pub const STORE_URL_ENV: &str = "EVENTSCRAPE_STORE_URL";
pub const STORE_KEY_ENV: &str = "EVENTSCRAPE_STORE_KEY";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed")]
    Transport(#[from] reqwest::Error),
    #[error("store returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("store payload could not be decoded")]
    Decode(#[from] serde_json::Error),
    #[error("store file {path} could not be accessed")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store is not configured: {0}")]
    Config(String),
}

pub trait EventStore {
    fn find(&mut self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError>;
    /// `row` is one object or an array of objects. Returns the rows the store
    /// acknowledged; an empty list means nothing was written.
    fn insert(&mut self, table: &str, row: &Row) -> Result<Vec<Row>, StoreError>;
}

/// Conjunction of exact column matches. `None` matches a null or missing column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Option<String>)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: Option<&str>) -> Self {
        self.conditions
            .push((column.to_string(), value.map(ToString::to_string)));
        self
    }

    pub fn identity(key: &IdentityKey) -> Self {
        Filter::new()
            .eq("title", Some(&key.title))
            .eq("start_time", key.start_time.as_deref())
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(column, expected)| {
            match (row.get(column).filter(|v| !v.is_null()), expected) {
                (None, None) => true,
                (Some(Value::String(actual)), Some(expected)) => actual == expected,
                _ => false,
            }
        })
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.conditions
            .iter()
            .map(|(column, value)| {
                let op = match value {
                    Some(v) => format!("eq.{v}"),
                    None => "is.null".to_string(),
                };
                (column.clone(), op)
            })
            .collect()
    }
}

pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        if base_url.trim().is_empty() || api_key.trim().is_empty() {
            return Err(StoreError::Config("store url and key must be set".to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_env(timeout: Duration) -> Result<Self, StoreError> {
        let url = std::env::var(STORE_URL_ENV)
            .map_err(|_| StoreError::Config(format!("{STORE_URL_ENV} is not set")))?;
        let key = std::env::var(STORE_KEY_ENV)
            .map_err(|_| StoreError::Config(format!("{STORE_KEY_ENV} is not set")))?;
        Self::new(&url, &key, timeout)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn decode_rows(resp: reqwest::blocking::Response) -> Result<Vec<Row>, StoreError> {
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(StoreError::Status { status, body });
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&body)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }
}

impl EventStore for RestStore {
    fn find(&mut self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let mut query = vec![("select".to_string(), "id".to_string())];
        query.extend(filter.query_pairs());

        let resp = self
            .client
            .get(self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()?;
        Self::decode_rows(resp)
    }

    fn insert(&mut self, table: &str, row: &Row) -> Result<Vec<Row>, StoreError> {
        let resp = self
            .client
            .post(self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .json(row)
            .send()?;
        Self::decode_rows(resp)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreFile {
    pub schema_version: u32,
    pub tables: BTreeMap<String, Vec<Row>>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            schema_version: 1,
            tables: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: StoreFile,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.data
            .tables
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl EventStore for MemoryStore {
    fn find(&mut self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        Ok(find_rows(&self.data, table, filter))
    }

    fn insert(&mut self, table: &str, row: &Row) -> Result<Vec<Row>, StoreError> {
        append_rows(&mut self.data, table, row)
    }
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: StoreFile,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            path: path.to_path_buf(),
            data: load_store_file(path)?,
        })
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.data.tables.get(table).map_or(0, Vec::len)
    }
}

impl EventStore for JsonFileStore {
    fn find(&mut self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        Ok(find_rows(&self.data, table, filter))
    }

    fn insert(&mut self, table: &str, row: &Row) -> Result<Vec<Row>, StoreError> {
        let mut next = self.data.clone();
        let stored = append_rows(&mut next, table, row)?;
        save_store_file(&self.path, &next)?;
        self.data = next;
        Ok(stored)
    }
}

pub fn load_store_file(path: &Path) -> Result<StoreFile, StoreError> {
    if !path.exists() {
        return Ok(StoreFile::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_store_file(path: &Path, data: &StoreFile) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let serialized = serde_json::to_string_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serialized).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

fn find_rows(data: &StoreFile, table: &str, filter: &Filter) -> Vec<Row> {
    data.tables
        .get(table)
        .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
        .unwrap_or_default()
}

fn append_rows(data: &mut StoreFile, table: &str, row: &Row) -> Result<Vec<Row>, StoreError> {
    let objects = match row {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        single => vec![single],
    };
    if objects.iter().any(|item| !item.is_object()) {
        return Err(StoreError::Config(format!(
            "rows for {table} must be json objects"
        )));
    }

    let rows = data.tables.entry(table.to_string()).or_default();
    let mut stored = Vec::with_capacity(objects.len());
    for item in objects {
        let mut fields = item.as_object().cloned().unwrap_or_default();
        fields.insert("id".to_string(), Value::from(rows.len() as u64 + 1));
        let item = Value::Object(fields);
        rows.push(item.clone());
        stored.push(item);
    }
    debug!(table, rows = rows.len(), "rows appended");
    Ok(stored)
}
