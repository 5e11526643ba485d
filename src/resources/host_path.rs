use anyhow::Result;
use path_absolutize::Absolutize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::host::ServerHost;
use super::vault::{HostPermissionCheck, PermissionResult};

/// Normalize a host path to an absolute, canonical-like string without resolving symlinks.
pub fn normalize_abs_path(p: &str) -> Result<String> {
    let pb = PathBuf::from(p);
    let abs = pb.absolutize()?.to_path_buf();
    Ok(abs.to_string_lossy().to_string())
}

/// Check a physical path against a semicolon- or comma-separated allowlist of absolute
/// prefixes. Symlinks are denied.
pub fn is_host_path_allowed(candidate: &str, allowlist: &str) -> Result<bool> {
    let cand_abs = normalize_abs_path(candidate)?;
    if is_symlink(candidate) {
        return Ok(false);
    }
    for prefix in split_allowlist(allowlist) {
        let pref_abs = normalize_abs_path(prefix)?;
        if is_prefix_path(&cand_abs, &pref_abs) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn split_allowlist(allowlist: &str) -> impl Iterator<Item = &str> {
    allowlist
        .split(|c| c == ';' || c == ',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

pub(crate) fn is_symlink(p: &str) -> bool {
    match fs::symlink_metadata(p) {
        Ok(m) => m.file_type().is_symlink(),
        Err(_) => false,
    }
}

pub(crate) fn is_prefix_path(path: &str, prefix: &str) -> bool {
    // component-wise so that /data/x does not match /data2
    Path::new(path).starts_with(Path::new(prefix))
}

/// Per-host allowlists for paths outside the vault area. Hosts without their own entry use
/// the default list; with no list at all every non-vault path is denied.
#[derive(Debug, Clone, Default)]
pub struct AllowListPermission {
    default_list: Option<String>,
    per_host: HashMap<String, String>,
}

impl AllowListPermission {
    pub fn new(default_list: Option<String>) -> Self {
        Self { default_list, per_host: HashMap::new() }
    }

    pub fn with_host(mut self, host: &str, allowlist: &str) -> Self {
        self.per_host.insert(host.to_string(), allowlist.to_string());
        self
    }
}

impl HostPermissionCheck for AllowListPermission {
    fn check_non_vault_path(&self, path: &str, host: &ServerHost, _user: &str) -> PermissionResult {
        let list = match self.per_host.get(&host.name).or(self.default_list.as_ref()) {
            Some(l) => l,
            None => return PermissionResult::Denied { reason: format!("no allowlist for {}", host) },
        };
        match is_host_path_allowed(path, list) {
            Ok(true) => PermissionResult::Granted,
            Ok(false) => PermissionResult::Denied { reason: format!("'{}' not in allowlist for {}", path, host) },
            Err(e) => PermissionResult::Denied { reason: e.to_string() },
        }
    }
}
