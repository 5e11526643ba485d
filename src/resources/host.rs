use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Whether a server host is this process's own host or must be reached over the network.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locality {
    #[default]
    Local,
    Remote,
}

/// A server host in the grid. Use `same_host` to match hosts seen with different locality.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ServerHost {
    pub name: String,
    pub zone: String,
    #[serde(default)]
    pub locality: Locality,
}

impl ServerHost {
    pub fn local(name: &str, zone: &str) -> Self {
        Self { name: name.to_string(), zone: zone.to_string(), locality: Locality::Local }
    }

    pub fn remote(name: &str, zone: &str) -> Self {
        Self { name: name.to_string(), zone: zone.to_string(), locality: Locality::Remote }
    }

    #[inline]
    pub fn is_remote(&self) -> bool { self.locality == Locality::Remote }

    /// Same physical host, regardless of how this process sees it.
    #[inline]
    pub fn same_host(&self, other: &ServerHost) -> bool {
        self.name == other.name && self.zone == other.zone
    }
}

impl Display for ServerHost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.zone)
    }
}
