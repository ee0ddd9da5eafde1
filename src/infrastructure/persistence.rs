//! JSON persistence of the aggregate
//!
//! Output is the canonical `metric -> year -> month -> value` document with
//! identifier keys, pretty printed. Writes go to a sibling temp file that is
//! then renamed over the target, so a crash mid-save never leaves a truncated
//! output behind.
//!
//! Loading also accepts the older shapes other producers wrote: display labels
//! as top-level keys, leaves that repeat the `{year: {month: value}}` nesting,
//! and numeric leaves.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::domain::{Aggregate, MetricName, MetricValue, PageMetrics, TimeCoordinate};

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Malformed aggregate document: {message}")]
    Malformed { message: String },
}

impl PersistenceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Reads and writes the aggregate at a fixed path
#[derive(Debug, Clone)]
pub struct Persister {
    path: PathBuf,
}

impl Persister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Serializes `aggregate` and atomically replaces the output file
    pub async fn save(&self, aggregate: &Aggregate) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::io(parent, e))?;
        }

        let content = to_json_string(aggregate)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, content.as_bytes())
            .await
            .map_err(|e| PersistenceError::io(&temp_path, e))?;
        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            // Best effort: don't leave the temp file behind
            let _ = fs::remove_file(&temp_path).await;
            return Err(PersistenceError::io(&self.path, e));
        }

        info!("💾 Saved {} entries to {:?}", aggregate.len(), self.path);
        Ok(())
    }

    /// Reads and normalises the output file
    pub async fn load(&self) -> PersistenceResult<Aggregate> {
        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        let aggregate = from_json_str(&content)?;
        debug!("Loaded {} entries from {:?}", aggregate.len(), self.path);
        Ok(aggregate)
    }

    /// Like `load`, but a missing file is `Ok(None)`
    pub async fn load_if_exists(&self) -> PersistenceResult<Option<Aggregate>> {
        match fs::try_exists(&self.path).await {
            Ok(true) => self.load().await.map(Some),
            Ok(false) => Ok(None),
            Err(e) => Err(PersistenceError::io(&self.path, e)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Canonical pretty-printed JSON for `aggregate`
pub fn to_json_string(aggregate: &Aggregate) -> PersistenceResult<String> {
    let mut content = serde_json::to_string_pretty(aggregate)?;
    content.push('\n');
    Ok(content)
}

/// Parses an aggregate document, normalising legacy shapes
pub fn from_json_str(content: &str) -> PersistenceResult<Aggregate> {
    let document: Value = serde_json::from_str(content)?;
    let Value::Object(metrics) = document else {
        return Err(PersistenceError::malformed("top level must be an object"));
    };

    let mut pages: BTreeMap<TimeCoordinate, PageMetrics> = BTreeMap::new();
    for (key, years) in &metrics {
        let Some(metric) = MetricName::from_key(key) else {
            warn!("Skipping unknown metric '{}' in aggregate document", key);
            continue;
        };
        for (year_key, months) in as_object(years, key)?.into_iter().flatten() {
            for (month_key, leaf) in as_object(months, year_key)?.into_iter().flatten() {
                let coordinate = TimeCoordinate::from_keys(year_key, month_key)
                    .map_err(|e| PersistenceError::malformed(format!("{key}: {e}")))?;
                let value = normalize_leaf(leaf, year_key, month_key)?;
                pages
                    .entry(coordinate)
                    .or_insert_with(|| PageMetrics::new(coordinate))
                    .insert(metric, value);
            }
        }
    }

    let mut aggregate = Aggregate::new();
    for page in pages.values() {
        aggregate.merge(page);
    }
    Ok(aggregate)
}

/// `null` levels are treated as empty
fn as_object<'a>(value: &'a Value, context: &str) -> PersistenceResult<Option<&'a Map<String, Value>>> {
    match value {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        other => Err(PersistenceError::malformed(format!(
            "expected an object under '{context}', found {other}"
        ))),
    }
}

fn normalize_leaf(leaf: &Value, year_key: &str, month_key: &str) -> PersistenceResult<MetricValue> {
    match leaf {
        Value::Null => Ok(MetricValue::Absent),
        Value::String(raw) => Ok(MetricValue::present(raw.clone())),
        Value::Number(number) => Ok(MetricValue::present(number.to_string())),
        Value::Object(nested) => {
            // Double-nested producer output repeats the coordinate inside the leaf
            let inner = nested
                .get(year_key)
                .and_then(|months| months.get(month_key))
                .ok_or_else(|| {
                    PersistenceError::malformed(format!(
                        "nested leaf at {year_key}/{month_key} does not repeat its coordinate"
                    ))
                })?;
            match inner {
                Value::Object(_) => Err(PersistenceError::malformed(format!(
                    "leaf at {year_key}/{month_key} is nested more than once"
                ))),
                flat => normalize_leaf(flat, year_key, month_key),
            }
        }
        Value::Bool(_) | Value::Array(_) => Err(PersistenceError::malformed(format!(
            "unsupported leaf at {year_key}/{month_key}: {leaf}"
        ))),
    }
}
