//! Per-session state of one worker: its handle table, the resource registry view and the
//! settings it was started with. Every operation takes the context by reference.

use anyhow::{Context, Result};
use tracing::info;

use crate::catalog::{Condition, QueryCursor};
use crate::config::GridConfig;
use crate::error::GridResult;
use crate::handles::{DriverType, HandleTable};
use crate::resources::{AllowListPermission, PermissionResult, ResourceRegistry, ServerHost, VaultPathResolver};

#[derive(Debug)]
pub struct SessionContext {
    config: GridConfig,
    handles: HandleTable,
    registry: ResourceRegistry,
    local_host: ServerHost,
    permission: AllowListPermission,
}

impl SessionContext {
    pub fn new(config: GridConfig, registry: ResourceRegistry) -> GridResult<Self> {
        let handles = HandleTable::new(config.handle_capacity)?;
        let local_host = ServerHost::local(&config.local_host, &config.local_zone);
        let permission = AllowListPermission::new(config.non_vault_allowlist.clone());
        info!(
            target: "gridvault::session",
            "session: user='{}' host={} resources={} handles={}",
            config.client_user, local_host, registry.len(), handles.capacity()
        );
        Ok(Self { config, handles, registry, local_host, permission })
    }

    /// Build a session from configuration, loading the registry file when one is configured.
    pub fn from_config(config: GridConfig) -> Result<Self> {
        config.validate()?;
        let registry = match &config.registry_file {
            Some(p) => ResourceRegistry::from_json_file(p)?,
            None => ResourceRegistry::new(),
        };
        Self::new(config, registry).context("initializing session")
    }

    pub fn config(&self) -> &GridConfig { &self.config }
    pub fn registry(&self) -> &ResourceRegistry { &self.registry }
    pub fn local_host(&self) -> &ServerHost { &self.local_host }
    pub fn client_user(&self) -> &str { &self.config.client_user }
    pub fn handles(&self) -> &HandleTable { &self.handles }
    pub fn handles_mut(&mut self) -> &mut HandleTable { &mut self.handles }

    /// Replace the non-vault fallback, e.g. to add per-host allowlists.
    pub fn set_permission(&mut self, permission: AllowListPermission) { self.permission = permission; }

    pub fn resolver(&self) -> VaultPathResolver<'_> { VaultPathResolver::new(&self.registry) }

    /// Permission check for `path` on `host` on behalf of the session's client user.
    pub fn check_path_permission(&self, path: &str, host: &ServerHost) -> GridResult<PermissionResult> {
        self.resolver().check_path_permission(path, host, &self.config.client_user, &self.permission)
    }

    /// Record a file opened on `host` and return its handle.
    pub fn register_open_file(&mut self, host: &ServerHost, file_name: &str, driver: DriverType, fd: i32, mode: i32) -> GridResult<i32> {
        self.handles.alloc_and_fill(host, file_name, driver, fd, mode)
    }

    pub fn release_file(&mut self, handle: i32) -> GridResult<()> { self.handles.free(handle) }

    /// A fresh cursor using the configured page size.
    pub fn query(&self, select: Vec<String>, conditions: Vec<Condition>) -> QueryCursor {
        QueryCursor::new(select, conditions, self.config.max_rows_per_page)
    }
}
