//! Group assembly.
//!
//! Wraps a list of container definitions (one app object or an array of
//! them) into a named Marathon service group.

use crate::error::{GroupError, Result};
use crate::types::app::kind;
use crate::types::{App, Group};
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, instrument};

/// Assembler for Marathon service groups.
pub struct GroupAssembler;

impl GroupAssembler {
    /// Assemble a group from already-parsed app definitions.
    #[instrument(skip(apps), fields(apps = apps.len()))]
    pub fn assemble(name: &str, apps: Vec<Value>) -> Result<Group> {
        let apps = apps.into_iter().map(App::from_value).collect::<Result<Vec<_>>>()?;
        let group = Group::new(name, apps)?;
        info!("Assembled group {} with {} app(s)", group.id, group.apps.len());
        Ok(group)
    }

    /// Assemble a group from JSON text holding one app object or an array
    /// of app objects.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if:
    /// - The text is not valid JSON
    /// - The document is neither an object nor an array
    /// - Any app is not an object with a string id
    pub fn assemble_str(name: &str, content: &str) -> Result<Group> {
        let apps = match content.trim_start().chars().next() {
            Some('{') => vec![parse_json(content)?],
            Some('[') => match parse_json(content)? {
                Value::Array(apps) => apps,
                other => {
                    return Err(GroupError::MalformedInput {
                        reason: format!("expected an array of apps, got {}", kind(&other)),
                    })
                }
            },
            Some(c) => {
                return Err(GroupError::MalformedInput {
                    reason: format!("expected an app object or array of apps, found '{}'", c),
                })
            }
            None => {
                return Err(GroupError::MalformedInput {
                    reason: "container list is empty".to_string(),
                })
            }
        };

        Self::assemble(name, apps)
    }

    /// Read a container list file and assemble it into a group.
    #[instrument]
    pub fn assemble_file<P: AsRef<Path> + std::fmt::Debug>(name: &str, path: P) -> Result<Group> {
        let content = read_container_list(path)?;
        Self::assemble_str(name, &content)
    }
}

/// Read a container list file, stripping trailing whitespace from every line
/// and joining the lines.
pub fn read_container_list(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    info!("Reading container list from {:?}", path);

    let file = std::fs::File::open(path)
        .map_err(|e| GroupError::Io { path: path.to_path_buf(), source: e })?;

    let mut content = String::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| GroupError::Io { path: path.to_path_buf(), source: e })?;
        content.push_str(line.trim_end());
    }
    Ok(content)
}

fn parse_json(content: &str) -> Result<Value> {
    serde_json::from_str(content)
        .map_err(|e| GroupError::MalformedInput { reason: format!("invalid JSON: {}", e) })
}
