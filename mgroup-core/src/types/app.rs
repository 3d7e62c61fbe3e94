//! Marathon app definitions.
//!
//! An app is kept as an opaque JSON object. Only the handful of fields this
//! tool rewrites get typed accessors; everything else passes through untouched.

use crate::error::{GroupError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Label the edge load balancer watches for.
pub const HAPROXY_GROUP_LABEL: &str = "HAPROXY_GROUP";

/// Value of [`HAPROXY_GROUP_LABEL`] for apps exposed outside the cluster.
pub const HAPROXY_GROUP_EXTERNAL: &str = "external";

/// Port mapping label carrying the cluster VIP.
pub const VIP_LABEL: &str = "VIP_0";

/// One Marathon app definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct App(Map<String, Value>);

impl App {
    /// Build an app from a JSON value.
    ///
    /// The value must be an object with a non-empty string `id`.
    pub fn from_value(value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(GroupError::MalformedInput {
                    reason: format!("app definition must be an object, got {}", kind(&other)),
                })
            }
        };

        match map.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(Self(map)),
            Some(_) => Err(GroupError::MalformedInput {
                reason: "app id must be a non-empty string".to_string(),
            }),
            None => Err(GroupError::MalformedInput { reason: "app is missing an id".to_string() }),
        }
    }

    /// The app id.
    pub fn id(&self) -> &str {
        self.0.get("id").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn set_accepted_resource_roles(&mut self, roles: &[&str]) {
        let roles = roles.iter().map(|r| Value::String(r.to_string())).collect();
        self.0.insert("acceptedResourceRoles".to_string(), Value::Array(roles));
    }

    /// Set an app-level label, creating the `labels` object if needed.
    pub fn set_label(&mut self, key: &str, value: &str) {
        labels_mut(&mut self.0).insert(key.to_string(), Value::String(value.to_string()));
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.0.get("labels").and_then(|l| l.get(key)).and_then(Value::as_str)
    }

    /// Append a fetch URI, creating the `uris` array if needed.
    pub fn push_uri(&mut self, uri: String) {
        let uris = self.0.entry("uris").or_insert_with(|| Value::Array(Vec::new()));
        if !uris.is_array() {
            *uris = Value::Array(Vec::new());
        }
        if let Value::Array(list) = uris {
            list.push(Value::String(uri));
        }
    }

    pub fn uris(&self) -> Vec<&str> {
        self.0
            .get("uris")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// All port mappings, from both `container.docker.portMappings` and
    /// `container.portMappings`. Entries that are not objects are skipped.
    pub fn port_mappings_mut(&mut self) -> Vec<&mut Map<String, Value>> {
        let Some(Value::Object(container)) = self.0.get_mut("container") else {
            return Vec::new();
        };

        let mut mappings = Vec::new();
        for (key, value) in container.iter_mut() {
            let list = match (key.as_str(), value) {
                ("portMappings", Value::Array(list)) => Some(list),
                ("docker", Value::Object(docker)) => {
                    match docker.get_mut("portMappings") {
                        Some(Value::Array(list)) => Some(list),
                        _ => None,
                    }
                }
                _ => None,
            };
            if let Some(list) = list {
                mappings.extend(list.iter_mut().filter_map(Value::as_object_mut));
            }
        }
        mappings
    }

    /// The `container.volumes` array, if present.
    pub fn volumes_mut(&mut self) -> Option<&mut Vec<Value>> {
        self.0.get_mut("container")?.get_mut("volumes")?.as_array_mut()
    }

    pub fn volumes(&self) -> &[Value] {
        self.0
            .get("container")
            .and_then(|c| c.get("volumes"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Get the `labels` object of a JSON object, creating or replacing it if it
/// is missing or not an object.
pub(crate) fn labels_mut(map: &mut Map<String, Value>) -> &mut Map<String, Value> {
    let labels = map.entry("labels").or_insert_with(|| Value::Object(Map::new()));
    if !labels.is_object() {
        *labels = Value::Object(Map::new());
    }
    match labels {
        Value::Object(labels) => labels,
        _ => unreachable!("labels was just replaced with an object"),
    }
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_requires_object_with_id() {
        assert!(App::from_value(json!({"id": "web"})).is_ok());
        assert!(App::from_value(json!({"image": "nginx"})).is_err());
        assert!(App::from_value(json!({"id": ""})).is_err());
        assert!(App::from_value(json!({"id": 3})).is_err());
        assert!(App::from_value(json!(["web"])).is_err());
    }

    #[test]
    fn test_set_label_replaces_non_object_labels() {
        let mut app = App::from_value(json!({"id": "web", "labels": null})).unwrap();
        app.set_label(HAPROXY_GROUP_LABEL, HAPROXY_GROUP_EXTERNAL);
        assert_eq!(app.label(HAPROXY_GROUP_LABEL), Some("external"));
    }

    #[test]
    fn test_set_label_keeps_existing_labels() {
        let mut app =
            App::from_value(json!({"id": "web", "labels": {"team": "payments"}})).unwrap();
        app.set_label(HAPROXY_GROUP_LABEL, HAPROXY_GROUP_EXTERNAL);
        assert_eq!(app.label("team"), Some("payments"));
        assert_eq!(app.label(HAPROXY_GROUP_LABEL), Some("external"));
    }

    #[test]
    fn test_push_uri_appends() {
        let mut app =
            App::from_value(json!({"id": "web", "uris": ["http://a/b.tgz"]})).unwrap();
        app.push_uri("http://c/d.tgz".to_string());
        assert_eq!(app.uris(), vec!["http://a/b.tgz", "http://c/d.tgz"]);
    }

    #[test]
    fn test_port_mappings_from_both_locations() {
        let mut app = App::from_value(json!({
            "id": "web",
            "container": {
                "docker": {"portMappings": [{"hostPort": 80}]},
                "portMappings": [{"hostPort": 443}, "bogus"]
            }
        }))
        .unwrap();
        assert_eq!(app.port_mappings_mut().len(), 2);
    }

    #[test]
    fn test_no_container_means_no_mappings_or_volumes() {
        let mut app = App::from_value(json!({"id": "web"})).unwrap();
        assert!(app.port_mappings_mut().is_empty());
        assert!(app.volumes_mut().is_none());
        assert!(app.volumes().is_empty());
    }
}
