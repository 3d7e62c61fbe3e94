//! Volume domain types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix marking a host path as a local bind mount.
pub const LOCAL_BIND_PREFIX: &str = "./";

/// Docker volume driver provider understood by Marathon.
pub const DVDI_PROVIDER: &str = "dvdi";

/// Storage driver used for external volumes.
pub const REXRAY_DRIVER: &str = "rexray";

/// Reference to an externally provisioned volume, as embedded in a
/// Marathon volume entry under `external`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalVolumeRef {
    pub name: String,
    pub provider: String,
    pub options: BTreeMap<String, String>,
}

impl ExternalVolumeRef {
    /// A REX-Ray backed volume managed through dvdi.
    pub fn rexray(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: DVDI_PROVIDER.to_string(),
            options: BTreeMap::from([("dvdi/driver".to_string(), REXRAY_DRIVER.to_string())]),
        }
    }
}

/// Whether a host path denotes a local bind mount.
pub fn is_local_bind(host_path: &str) -> bool {
    host_path.starts_with(LOCAL_BIND_PREFIX)
}

/// Turn a `./`-prefixed host path into a name fragment: strip the prefix and
/// trailing separators, then replace remaining separators with underscores.
pub fn sanitize_host_path(host_path: &str) -> String {
    host_path
        .strip_prefix(LOCAL_BIND_PREFIX)
        .unwrap_or(host_path)
        .trim_end_matches('/')
        .replace('/', "_")
}

/// Unique volume name for a bind mount of one app in one group.
///
/// Marathon ids may be hierarchical (`/web`, `api/web`); outer separators are
/// trimmed and inner ones become underscores so the name stays a single path
/// segment.
pub fn derive_volume_name(group_id: &str, app_id: &str, host_path: &str) -> String {
    format!("{}-{}-{}", name_part(group_id), name_part(app_id), sanitize_host_path(host_path))
}

fn name_part(id: &str) -> String {
    id.trim_matches('/').replace('/', "_")
}

/// Whether a `/`-separated path contains a `.` or `..` segment.
pub fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment == "." || segment == "..")
}

/// Split a container path into its first segment and the remainder.
///
/// `"/src/app/lib"` gives `("src", "app/lib")`; `"/data"` gives `("data", "")`.
pub fn split_container_path(container_path: &str) -> (String, String) {
    let trimmed = container_path.strip_prefix('/').unwrap_or(container_path);
    match trimmed.split_once('/') {
        Some((first, rest)) => (first.to_string(), rest.to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_local_bind() {
        assert!(is_local_bind("./app"));
        assert!(!is_local_bind("/var/lib/app"));
        assert!(!is_local_bind("../app"));
        assert!(!is_local_bind("app"));
    }

    #[test]
    fn test_sanitize_host_path() {
        assert_eq!(sanitize_host_path("./app"), "app");
        assert_eq!(sanitize_host_path("./data/db"), "data_db");
        assert_eq!(sanitize_host_path("./conf/"), "conf");
    }

    #[test]
    fn test_derive_volume_name() {
        assert_eq!(derive_volume_name("g1", "web", "./static/css"), "g1-web-static_css");
    }

    #[test]
    fn test_derive_volume_name_flattens_hierarchical_ids() {
        assert_eq!(derive_volume_name("g1", "/web", "./app"), "g1-web-app");
        assert_eq!(derive_volume_name("g1", "api/web/", "./app"), "g1-api_web-app");
        assert_eq!(derive_volume_name("/prod/g1", "web", "./app"), "prod_g1-web-app");
    }

    #[test]
    fn test_has_dot_segment() {
        assert!(has_dot_segment("/src/../../escaped"));
        assert!(has_dot_segment("./../outside"));
        assert!(has_dot_segment("/./src"));
        assert!(has_dot_segment(".."));
        assert!(!has_dot_segment("/src/app"));
        assert!(!has_dot_segment("/src/.hidden/..x"));
    }

    #[test]
    fn test_split_container_path() {
        assert_eq!(split_container_path("/src/app"), ("src".to_string(), "app".to_string()));
        assert_eq!(
            split_container_path("/var/lib/mysql"),
            ("var".to_string(), "lib/mysql".to_string())
        );
        assert_eq!(split_container_path("/data"), ("data".to_string(), String::new()));
        assert_eq!(split_container_path("data/x"), ("data".to_string(), "x".to_string()));
    }

    #[test]
    fn test_external_ref_serializes_like_marathon() {
        let value = serde_json::to_value(ExternalVolumeRef::rexray("g1-web-app")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "name": "g1-web-app",
                "provider": "dvdi",
                "options": {"dvdi/driver": "rexray"}
            })
        );
    }
}
