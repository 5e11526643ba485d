//! Resource metadata and physical path rules: hosts, the resource registry, vault
//! resolution and the non-vault permission fallback.

pub mod host;
pub mod registry;
pub mod vault;
pub mod host_path;

pub use host::{Locality, ServerHost};
pub use registry::{Resource, ResourceRegistry};
pub use vault::{DenyNonVault, HostPermissionCheck, PermissionResult, VaultMatch, VaultPathResolver, TRAVERSAL};
pub use host_path::{is_host_path_allowed, normalize_abs_path, AllowListPermission};
