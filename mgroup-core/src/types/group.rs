//! Marathon service group envelope.

use super::app::App;
use crate::error::{GroupError, Result};
use serde::{Deserialize, Serialize};

/// A named collection of apps deployed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Group id (e.g. "g1")
    pub id: String,

    /// Apps in declaration order
    pub apps: Vec<App>,
}

impl Group {
    /// Create a group, enforcing a non-empty id and at least one app.
    pub fn new(id: impl Into<String>, apps: Vec<App>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(GroupError::MalformedInput {
                reason: "group name must not be empty".to_string(),
            });
        }
        if apps.is_empty() {
            return Err(GroupError::MalformedInput {
                reason: "group must contain at least one app".to_string(),
            });
        }
        Ok(Self { id, apps })
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GroupError::Other(anyhow::anyhow!("failed to serialize group: {}", e)))
    }

    /// Parse a previously serialized group.
    pub fn from_json(content: &str) -> Result<Self> {
        let group: Group = serde_json::from_str(content).map_err(|e| {
            GroupError::MalformedInput { reason: format!("invalid group document: {}", e) }
        })?;
        let apps = group
            .apps
            .into_iter()
            .map(|app| App::from_value(app.into_value()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(group.id, apps)
    }

    pub fn app(&self, id: &str) -> Option<&App> {
        self.apps.iter().find(|a| a.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn app(id: &str) -> App {
        App::from_value(json!({ "id": id })).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_name() {
        assert!(Group::new("", vec![app("web")]).is_err());
        assert!(Group::new("  ", vec![app("web")]).is_err());
    }

    #[test]
    fn test_new_rejects_empty_apps() {
        assert!(matches!(Group::new("g1", vec![]), Err(GroupError::MalformedInput { .. })));
    }

    #[test]
    fn test_json_round_trip() {
        let group = Group::new("g1", vec![app("web"), app("db")]).unwrap();
        let parsed = Group::from_json(&group.to_json().unwrap()).unwrap();
        assert_eq!(parsed, group);
        assert!(parsed.app("db").is_some());
    }

    #[test]
    fn test_from_json_rejects_bad_app() {
        let doc = r#"{"id": "g1", "apps": [{"image": "nginx"}]}"#;
        assert!(Group::from_json(doc).is_err());
    }
}
