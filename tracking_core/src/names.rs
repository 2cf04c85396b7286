//! Node names, topic name resolution and command-line assignments
//!
//! Nodes accept the usual robot-middleware assignment syntax and nothing else:
//!
//! ```text
//! cutie_node __name:=tracker ~input_image:=/camera/rgb/image_raw _with_bbox:=true
//! ```
//!
//! - `__name:=<name>` overrides the registered node name
//! - `_<key>:=<value>` sets a private parameter (`~<key>`)
//! - `<from>:=<to>` remaps a topic name

use crate::error::{TrackingError, TrackingResult};
use serde_json::Value;
use std::collections::BTreeMap;

/// Resolve a topic or parameter name relative to a node
///
/// `~name` lives under the node namespace, relative names live in the root
/// namespace and absolute names are returned untouched.
pub fn resolve_name(node_name: &str, name: &str) -> String {
    let node = node_name.trim_start_matches('/');
    if let Some(private) = name.strip_prefix('~') {
        let private = private.trim_start_matches('/');
        if private.is_empty() {
            format!("/{}", node)
        } else {
            format!("/{}/{}", node, private)
        }
    } else if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{}", name)
    }
}

/// Parsed command-line assignments for one node process
#[derive(Debug, Clone, Default)]
pub struct NodeArgs {
    node_name: String,
    remaps: BTreeMap<String, String>,
    private_params: Vec<(String, Value)>,
}

impl NodeArgs {
    /// Node arguments with no assignments
    pub fn new(node_name: &str) -> Self {
        Self {
            node_name: node_name.trim_start_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Parse the process arguments (without the program name)
    pub fn from_env(default_name: &str) -> TrackingResult<Self> {
        Self::parse(default_name, std::env::args().skip(1))
    }

    /// Parse `key:=value` assignments
    pub fn parse<I, S>(default_name: &str, args: I) -> TrackingResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut node_name = default_name.trim_start_matches('/').to_string();
        let mut raw_remaps = Vec::new();
        let mut private_params = Vec::new();

        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg.split_once(":=").ok_or_else(|| {
                TrackingError::Config(format!(
                    "Unsupported argument '{}': expected <name>:=<value>",
                    arg
                ))
            })?;

            if key == "__name" {
                if value.is_empty() {
                    return Err(TrackingError::Config("__name must not be empty".to_string()));
                }
                node_name = value.trim_start_matches('/').to_string();
            } else if key.starts_with("__") {
                // Reserved for the middleware (__ns, __log, ...), not used here
                continue;
            } else if let Some(param) = key.strip_prefix('_') {
                private_params.push((param.to_string(), parse_scalar(value)));
            } else {
                raw_remaps.push((key.to_string(), value.to_string()));
            }
        }

        // Remaps are resolved against the final node name
        let remaps = raw_remaps
            .into_iter()
            .map(|(from, to)| (resolve_name(&node_name, &from), resolve_name(&node_name, &to)))
            .collect();

        Ok(Self {
            node_name,
            remaps,
            private_params,
        })
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn private_params(&self) -> &[(String, Value)] {
        &self.private_params
    }

    pub fn remaps(&self) -> &BTreeMap<String, String> {
        &self.remaps
    }

    /// Add a remapping after parsing (used by launch code and tests)
    pub fn with_remap(mut self, from: &str, to: &str) -> Self {
        let from = resolve_name(&self.node_name, from);
        let to = resolve_name(&self.node_name, to);
        self.remaps.insert(from, to);
        self
    }

    /// Resolve a name for this node, applying remappings
    pub fn resolve(&self, name: &str) -> String {
        let resolved = resolve_name(&self.node_name, name);
        self.remaps.get(&resolved).cloned().unwrap_or(resolved)
    }
}

/// Parse a command-line value as a YAML scalar, falling back to a plain string
pub fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    match serde_yaml::from_str::<Value>(raw) {
        Ok(Value::Null) => Value::String(raw.to_string()),
        Ok(value) => value,
        Err(_) => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_private_relative_absolute() {
        assert_eq!(resolve_name("cutie_node", "~input_image"), "/cutie_node/input_image");
        assert_eq!(resolve_name("/cutie_node", "~output/segmentation"), "/cutie_node/output/segmentation");
        assert_eq!(resolve_name("cutie_node", "camera/image"), "/camera/image");
        assert_eq!(resolve_name("cutie_node", "/camera/image"), "/camera/image");
        assert_eq!(resolve_name("cutie_node", "~"), "/cutie_node");
    }

    #[test]
    fn test_parse_assignments() {
        let args = NodeArgs::parse(
            "cutie_node",
            [
                "__name:=tracker",
                "_with_bbox:=true",
                "_device:=cpu",
                "_init_timeout:=2.5",
                "~input_image:=/camera/rgb",
            ],
        )
        .unwrap();

        assert_eq!(args.node_name(), "tracker");
        assert_eq!(args.private_params().len(), 3);
        assert_eq!(args.private_params()[0], ("with_bbox".to_string(), Value::Bool(true)));
        assert_eq!(args.private_params()[1].1, Value::String("cpu".to_string()));
        assert_eq!(args.private_params()[2].1.as_f64(), Some(2.5));

        // Remap key resolved against the overridden name
        assert_eq!(args.resolve("~input_image"), "/camera/rgb");
        assert_eq!(args.resolve("~output/segmentation"), "/tracker/output/segmentation");
    }

    #[test]
    fn test_rejects_plain_flags() {
        let err = NodeArgs::parse("cutie_node", ["--verbose"]).unwrap_err();
        assert!(matches!(err, TrackingError::Config(_)));
    }

    #[test]
    fn test_parse_scalar_falls_back_to_string() {
        assert_eq!(parse_scalar("cup; bottle"), Value::String("cup; bottle".to_string()));
        assert_eq!(parse_scalar("0.3").as_f64(), Some(0.3));
        assert_eq!(parse_scalar("~"), Value::String("~".to_string()));
    }
}
