//! Process-level settings for a grid worker. Defaults match the historical server constants;
//! a JSON file and `GRIDVAULT_*` environment variables may override them.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of handle slots including the three reserved stdio-equivalent slots.
pub const DEFAULT_HANDLE_CAPACITY: usize = 1026;
/// Rows per page requested from the catalog.
pub const DEFAULT_MAX_ROWS: i32 = 256;
pub const DEFAULT_DIR_MODE: u32 = 0o750;
pub const DEFAULT_MISMATCH_ATTRIBUTE: &str = "CHECKSUM_MISMATCH";
pub const DEFAULT_ZONE: &str = "tempZone";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    pub handle_capacity: usize,
    pub max_rows_per_page: i32,
    /// Mode for directories and collections created on demand (traverse bits are always added)
    pub dir_mode: u32,
    /// AVU attribute attached to copies whose checksum differs from the master copy
    pub checksum_mismatch_attribute: String,
    pub client_user: String,
    pub local_host: String,
    /// Zone of the local host
    pub local_zone: String,
    /// Optional ';' or ',' separated absolute prefixes readable outside any vault
    pub non_vault_allowlist: Option<String>,
    pub registry_file: Option<PathBuf>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            handle_capacity: DEFAULT_HANDLE_CAPACITY,
            max_rows_per_page: DEFAULT_MAX_ROWS,
            dir_mode: DEFAULT_DIR_MODE,
            checksum_mismatch_attribute: DEFAULT_MISMATCH_ATTRIBUTE.to_string(),
            client_user: whoami::username(),
            local_host: "localhost".to_string(),
            local_zone: DEFAULT_ZONE.to_string(),
            non_vault_allowlist: None,
            registry_file: None,
        }
    }
}

impl GridConfig {
    /// Load from a JSON file; fields missing from the file keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file '{}'", path.display()))?;
        let cfg: GridConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env(|k| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Overlay `GRIDVAULT_*` variables using the supplied lookup.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) -> Result<()> {
        if let Some(v) = lookup("GRIDVAULT_HANDLE_CAPACITY") {
            self.handle_capacity = v.trim().parse().with_context(|| format!("GRIDVAULT_HANDLE_CAPACITY='{}'", v))?;
        }
        if let Some(v) = lookup("GRIDVAULT_MAX_ROWS") {
            self.max_rows_per_page = v.trim().parse().with_context(|| format!("GRIDVAULT_MAX_ROWS='{}'", v))?;
        }
        if let Some(v) = lookup("GRIDVAULT_DIR_MODE") {
            let digits = v.trim().trim_start_matches("0o");
            self.dir_mode = u32::from_str_radix(digits, 8).with_context(|| format!("GRIDVAULT_DIR_MODE='{}' is not octal", v))?;
        }
        if let Some(v) = lookup("GRIDVAULT_MISMATCH_ATTR") { self.checksum_mismatch_attribute = v; }
        if let Some(v) = lookup("GRIDVAULT_CLIENT_USER") { self.client_user = v; }
        if let Some(v) = lookup("GRIDVAULT_LOCAL_HOST") { self.local_host = v; }
        if let Some(v) = lookup("GRIDVAULT_ZONE") { self.local_zone = v; }
        if let Some(v) = lookup("GRIDVAULT_NV_ALLOWLIST") { self.non_vault_allowlist = Some(v); }
        if let Some(v) = lookup("GRIDVAULT_REGISTRY") { self.registry_file = Some(PathBuf::from(v)); }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.handle_capacity <= crate::handles::RESERVED_HANDLES {
            bail!("handle_capacity must exceed {} reserved slots, got {}", crate::handles::RESERVED_HANDLES, self.handle_capacity);
        }
        if self.max_rows_per_page <= 0 {
            bail!("max_rows_per_page must be positive, got {}", self.max_rows_per_page);
        }
        if self.checksum_mismatch_attribute.trim().is_empty() {
            bail!("checksum_mismatch_attribute cannot be empty");
        }
        Ok(())
    }
}
