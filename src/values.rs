//! Value objects shared between definitions and create-request payloads.
//!
//! Each type is immutable, compares structurally, and renders its wire-textual
//! form through `Display` — the exact shape the container runtime expects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A link from one container to another, exposed under a host alias.
///
/// Textual form: `"container_name:host_alias"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Name of the container being linked to
    pub container_name: String,
    /// Hostname the linked container is reachable under
    pub host_alias: String,
}

impl Link {
    /// Create a new link.
    pub fn new<C: Into<String>, H: Into<String>>(container_name: C, host_alias: H) -> Self {
        Self {
            container_name: container_name.into(),
            host_alias: host_alias.into(),
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.container_name, self.host_alias)
    }
}

/// A port a container exposes, together with its protocol.
///
/// Textual form: `"port/protocol"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExposedPort {
    /// Port number, kept textual as the runtime wire format expects
    pub port: String,
    /// Protocol, usually `tcp` or `udp`
    pub protocol: String,
}

impl ExposedPort {
    /// Create a new exposed port.
    pub fn new<P: Into<String>, R: Into<String>>(port: P, protocol: R) -> Self {
        Self {
            port: port.into(),
            protocol: protocol.into(),
        }
    }

    /// Whether this port speaks TCP. Only TCP ports take part in readiness probing.
    pub fn is_tcp(&self) -> bool {
        self.protocol.eq_ignore_ascii_case("tcp")
    }
}

impl fmt::Display for ExposedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// A bind mount from a host path into a container path.
///
/// Textual form: `"host_path:container_path"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Volume {
    /// Path on the host
    pub host_path: String,
    /// Mount point inside the container
    pub container_path: String,
}

impl Volume {
    /// Create a new volume bind.
    pub fn new<H: Into<String>, C: Into<String>>(host_path: H, container_path: C) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
        }
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_path, self.container_path)
    }
}
