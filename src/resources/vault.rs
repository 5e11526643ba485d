//! Vault path resolution: which resource vault a physical path falls in, whether it sits in
//! the requesting user's own namespace, and the combined permission check used before any
//! file is opened on a host.
//!
//! Owned-path layout is `<vault>/<zone>/home/<user>[/...]`: after the vault prefix exactly
//! two segments are skipped before the user name is compared. Deployments with a different
//! layout are not recognised as owned and fall through to the per-host check.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{GridError, GridResult};

use super::host::ServerHost;
use super::registry::{Resource, ResourceRegistry};

/// Sequence that is rejected in any physical path.
pub const TRAVERSAL: &str = "/../";

/// A vault prefix match, derived per lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultMatch<'a> {
    pub prefix_len: usize,
    pub vault_path: &'a str,
    pub resource: &'a Resource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PermissionResult {
    /// Path is inside a vault on the host and under the requesting user's home
    OwnedVaultPath,
    /// Allowed by the per-host check for paths outside the user's vault area
    Granted,
    Denied { reason: String },
}

impl PermissionResult {
    pub fn is_allowed(&self) -> bool { !matches!(self, PermissionResult::Denied { .. }) }
}

/// Per-host permission check for paths that are not in the user's own vault area.
pub trait HostPermissionCheck {
    fn check_non_vault_path(&self, path: &str, host: &ServerHost, user: &str) -> PermissionResult;
}

/// Fallback that refuses every non-vault path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyNonVault;

impl HostPermissionCheck for DenyNonVault {
    fn check_non_vault_path(&self, _path: &str, host: &ServerHost, _user: &str) -> PermissionResult {
        PermissionResult::Denied { reason: format!("path outside any vault on {}", host) }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VaultPathResolver<'a> {
    registry: &'a ResourceRegistry,
}

impl<'a> VaultPathResolver<'a> {
    pub fn new(registry: &'a ResourceRegistry) -> Self { Self { registry } }

    /// First resource (in registry order) on `host` whose vault path is a literal prefix of `path`.
    pub fn match_vault(&self, path: &str, host: &ServerHost) -> Option<VaultMatch<'a>> {
        if path.contains(TRAVERSAL) {
            return None;
        }
        self.registry
            .iter()
            .filter(|r| r.host.same_host(host))
            .find(|r| path.starts_with(r.vault_path.as_str()))
            .map(|r| VaultMatch { prefix_len: r.vault_path.len(), vault_path: r.vault_path.as_str(), resource: r })
    }

    /// True when `path` is under a vault on `host` and, after the vault prefix plus two
    /// segments, continues with `user` followed by '/' or the end of the path.
    pub fn match_owned_path(&self, path: &str, host: &ServerHost, user: &str) -> bool {
        if user.is_empty() {
            return false;
        }
        let Some(m) = self.match_vault(path, host) else { return false };
        // skip the vault prefix and the separator that follows it
        let after_vault = &path[m.prefix_len..];
        let mut chars = after_vault.chars();
        if chars.next().is_none() {
            return false;
        }
        let rest = chars.as_str();

        let mut count = 0;
        let mut user_start = None;
        for (i, c) in rest.char_indices() {
            if c == '/' {
                count += 1;
                if count == 2 {
                    user_start = Some(i + 1);
                    break;
                }
            }
        }
        let Some(start) = user_start else { return false };
        let tail = &rest[start..];
        match tail.strip_prefix(user) {
            Some(after) => after.is_empty() || after.starts_with('/'),
            None => false,
        }
    }

    /// Gate for opening `path` on `host`: traversal is refused before any matching, then the
    /// user's own vault area is accepted, and anything else is decided by `fallback`.
    pub fn check_path_permission(
        &self,
        path: &str,
        host: &ServerHost,
        user: &str,
        fallback: &dyn HostPermissionCheck,
    ) -> GridResult<PermissionResult> {
        if path.contains(TRAVERSAL) {
            error!(target: "gridvault::vault", "check_path_permission: path '{}' contains {}", path, TRAVERSAL);
            return Err(GridError::security(path.to_string(), format!("path contains {}", TRAVERSAL)));
        }
        if self.match_owned_path(path, host, user) {
            debug!(target: "gridvault::vault", "check_path_permission: '{}' owned by '{}' on {}", path, user, host);
            return Ok(PermissionResult::OwnedVaultPath);
        }
        let res = fallback.check_non_vault_path(path, host, user);
        debug!(target: "gridvault::vault", "check_path_permission: '{}' on {} -> {:?}", path, host, res);
        Ok(res)
    }
}

#[cfg(test)]
#[path = "vault_tests.rs"]
mod vault_tests;
