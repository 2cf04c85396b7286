//! Namespaced runtime parameter store
//!
//! Parameters are kept as a flat, sorted map of fully resolved names
//! (`/cutie_node/model_path`) to JSON values. Nested YAML mappings are
//! flattened on load, so a parameter file reads like this:
//!
//! ```yaml
//! cutie_node:
//!   model_path: models/cutie_step.onnx
//!   device: cuda:0
//!   with_bbox: true
//! ```
//!
//! Nodes address their own parameters with the `~` prefix.

use crate::error::{TrackingError, TrackingResult};
use crate::names::{resolve_name, NodeArgs};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable naming the parameter file to load at startup
pub const PARAMS_ENV_VAR: &str = "TRACKING_ROS_PARAMS";

/// Parameter file used when the environment variable is unset
pub const DEFAULT_PARAMS_FILE: &str = "config/params.yaml";

/// Parameter store bound to one node's namespace
pub struct ParamStore {
    /// Parameter storage - BTreeMap maintains sorted order
    params: Arc<RwLock<BTreeMap<String, Value>>>,
    node_name: String,
    /// File the store was loaded from, if any
    source: Option<PathBuf>,
}

impl ParamStore {
    /// Empty store for a node
    pub fn new(node_name: &str) -> Self {
        Self {
            params: Arc::new(RwLock::new(BTreeMap::new())),
            node_name: node_name.trim_start_matches('/').to_string(),
            source: None,
        }
    }

    /// Build the store a node process starts with
    ///
    /// Loads the parameter file named by `TRACKING_ROS_PARAMS` (an error if it
    /// is set but unreadable) or `config/params.yaml` when present, then
    /// applies the `_key:=value` command-line assignments on top.
    pub fn init(args: &NodeArgs) -> TrackingResult<Self> {
        let mut store = Self::new(args.node_name());

        match std::env::var(PARAMS_ENV_VAR) {
            Ok(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(TrackingError::Config(format!(
                        "{} points to a missing file: {}",
                        PARAMS_ENV_VAR,
                        path.display()
                    )));
                }
                store.load_from_disk(&path)?;
                store.source = Some(path);
            }
            Err(_) => {
                let path = PathBuf::from(DEFAULT_PARAMS_FILE);
                if path.exists() {
                    store.load_from_disk(&path)?;
                    store.source = Some(path);
                }
            }
        }

        for (key, value) in args.private_params() {
            store.set_value(&format!("~{}", key), value.clone());
        }

        tracing::debug!(
            node = %store.node_name,
            count = store.list_keys().len(),
            "parameter store ready"
        );
        Ok(store)
    }

    /// Node this store resolves `~` names against
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// File the parameters were loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Fully resolved parameter name
    pub fn resolve(&self, key: &str) -> String {
        resolve_name(&self.node_name, key)
    }

    /// Get a parameter value
    ///
    /// `Ok(None)` when the key is absent or null; a value of the wrong type
    /// is a configuration error rather than a silent default.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> TrackingResult<Option<T>> {
        let name = self.resolve(key);
        let value = match self.params.read().get(&name) {
            None | Some(Value::Null) => return Ok(None),
            Some(value) => value.clone(),
        };
        serde_json::from_value(value).map(Some).map_err(|e| {
            TrackingError::Config(format!("Parameter '{}' has the wrong type: {}", name, e))
        })
    }

    /// Get parameter with default for absent keys
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> TrackingResult<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn get_f64(&self, key: &str, default: f64) -> TrackingResult<f64> {
        self.get_or(key, default)
    }

    pub fn get_i32(&self, key: &str, default: i32) -> TrackingResult<i32> {
        self.get_or(key, default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> TrackingResult<bool> {
        self.get_or(key, default)
    }

    pub fn get_string(&self, key: &str, default: &str) -> TrackingResult<String> {
        self.get_or(key, default.to_string())
    }

    /// Get a parameter that must be present and well-typed
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> TrackingResult<T> {
        self.get(key)?.ok_or_else(|| {
            TrackingError::Config(format!("Missing required parameter '{}'", self.resolve(key)))
        })
    }

    /// Set a parameter value
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> TrackingResult<()> {
        let json_value = serde_json::to_value(value)?;
        self.set_value(key, json_value);
        Ok(())
    }

    fn set_value(&self, key: &str, value: Value) {
        let name = self.resolve(key);
        self.params.write().insert(name, value);
    }

    /// Check if a parameter exists
    pub fn has(&self, key: &str) -> bool {
        self.params.read().contains_key(&self.resolve(key))
    }

    /// Remove a parameter
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.params.write().remove(&self.resolve(key))
    }

    /// List all parameter names
    pub fn list_keys(&self) -> Vec<String> {
        self.params.read().keys().cloned().collect()
    }

    /// Get all parameters
    pub fn get_all(&self) -> BTreeMap<String, Value> {
        self.params.read().clone()
    }

    /// Merge parameters from a YAML file, flattening nested mappings
    pub fn load_from_disk(&self, path: &Path) -> TrackingResult<()> {
        let yaml_str = std::fs::read_to_string(path)?;
        let loaded: Value = serde_yaml::from_str(&yaml_str)?;

        let mut flat = BTreeMap::new();
        match loaded {
            Value::Object(_) => flatten_into("", loaded, &mut flat),
            Value::Null => {}
            _ => {
                return Err(TrackingError::Config(format!(
                    "Parameter file {} must contain a mapping at the top level",
                    path.display()
                )))
            }
        }

        self.params.write().extend(flat);
        Ok(())
    }

    /// Save parameters to a YAML file (flat names)
    pub fn save_to_disk(&self, path: &Path) -> TrackingResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let params = self.params.read();
        let yaml = serde_yaml::to_string(&*params)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}

impl Clone for ParamStore {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            node_name: self.node_name.clone(),
            source: self.source.clone(),
        }
    }
}

fn flatten_into(prefix: &str, value: Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let key = key.trim_matches('/');
                let name = if prefix.is_empty() {
                    format!("/{}", key)
                } else {
                    format!("{}/{}", prefix, key)
                };
                flatten_into(&name, child, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf);
        }
    }
}
