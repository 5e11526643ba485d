//! Resource registry: the insertion-ordered list of storage resources known to this worker.
//! Populated once at session start; lookups never reorder it because first match wins.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{GridError, GridResult};

use super::host::ServerHost;

/// A storage resource: a vault path on a hosting server, inside a zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub vault_path: String,
    pub host: ServerHost,
    pub zone: String,
}

impl Resource {
    pub fn new(name: &str, vault_path: &str, host: ServerHost, zone: &str) -> Self {
        Self { name: name.to_string(), vault_path: vault_path.to_string(), host, zone: zone.to_string() }
    }

    /// Address used to run commands on the resource's own host.
    #[inline]
    pub fn location(&self) -> &str { &self.host.name }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ResourceRegistry {
    resources: Vec<Resource>,
}

impl ResourceRegistry {
    pub fn new() -> Self { Self::default() }

    /// Build a registry from resources in traversal order, validating each entry.
    pub fn from_resources(resources: Vec<Resource>) -> GridResult<Self> {
        let mut reg = Self::new();
        for r in resources { reg.register(r)?; }
        Ok(reg)
    }

    /// Append a resource. Vault paths must be non-empty and free of "/../".
    pub fn register(&mut self, resource: Resource) -> GridResult<()> {
        if resource.vault_path.is_empty() {
            return Err(GridError::input(format!("resource '{}' has an empty vault path", resource.name)));
        }
        if resource.vault_path.contains("/../") {
            return Err(GridError::security(resource.vault_path.clone(), "vault path contains /../".to_string()));
        }
        if self.resources.iter().any(|r| r.name == resource.name) {
            return Err(GridError::input(format!("resource '{}' already registered", resource.name)));
        }
        debug!(target: "gridvault::registry", "register: resource='{}' vault='{}' host={}", resource.name, resource.vault_path, resource.host);
        self.resources.push(resource);
        Ok(())
    }

    /// Load a JSON array of resources.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading resource registry '{}'", path.display()))?;
        let entries: Vec<Resource> = serde_json::from_str(&text)
            .with_context(|| format!("parsing resource registry '{}'", path.display()))?;
        let reg = Self::from_resources(entries)?;
        Ok(reg)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> { self.resources.iter() }

    pub fn by_name(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize { self.resources.len() }

    pub fn is_empty(&self) -> bool { self.resources.is_empty() }
}
