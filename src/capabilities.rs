//! Server-reported capabilities, recorded verbatim from `initialize`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A capability flag that may itself report sub-features (e.g. `listChanged`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCapability {
    #[serde(default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub tools: Option<SubCapability>,
    pub resources: Option<SubCapability>,
    pub prompts: Option<SubCapability>,
    pub roots: Option<SubCapability>,
    pub sampling: Option<SubCapability>,
}

impl Capabilities {
    /// Parse from the `capabilities` object of an `initialize` result.
    /// Each key may be present as `{}`, `{"listChanged": bool}`, or absent.
    pub fn from_value(value: &Value) -> Self {
        let get = |key: &str| -> Option<SubCapability> {
            value.get(key).map(|v| SubCapability {
                list_changed: v
                    .get("listChanged")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            })
        };
        Self {
            tools: get("tools"),
            resources: get("resources"),
            prompts: get("prompts"),
            roots: get("roots"),
            sampling: get("sampling"),
        }
    }

    pub fn has_tools(&self) -> bool {
        self.tools.is_some()
    }
    pub fn has_resources(&self) -> bool {
        self.resources.is_some()
    }
    pub fn has_prompts(&self) -> bool {
        self.prompts.is_some()
    }
    pub fn has_roots(&self) -> bool {
        self.roots.is_some()
    }
    pub fn has_sampling(&self) -> bool {
        self.sampling.is_some()
    }
}

/// The client's own capabilities, sent in `initialize`. The core always
/// advertises an empty set plus whatever the host registered a handler for.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<SubCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SubCapability>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sub_capability_flags() {
        let v = serde_json::json!({"tools": {"listChanged": true}, "resources": {}});
        let caps = Capabilities::from_value(&v);
        assert!(caps.has_tools());
        assert!(caps.tools.unwrap().list_changed);
        assert!(caps.has_resources());
        assert!(!caps.has_prompts());
    }
}
