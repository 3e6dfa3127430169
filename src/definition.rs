//! Hierarchical container definitions.
//!
//! A [`ContainerSpec`] is a mutable configuration node. Scalar attributes left
//! unset fall back to the parent node; the map attributes `env`, `links`, and
//! `volumes` inherit entry by entry; `expose` is strictly local. Freezing a
//! spec resolves every attribute through the parent chain once and produces an
//! immutable [`ContainerDefinition`] snapshot with no setters, so a container
//! built from it cannot be reconfigured afterwards.

use crate::values::{ExposedPort, Link, Volume};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// What kind of workload a container runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// Long-running container whose readiness is network reachability
    Service,
    /// Run-to-completion container with no readiness protocol
    Task,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Service => write!(f, "service"),
            ContainerKind::Task => write!(f, "task"),
        }
    }
}

impl FromStr for ContainerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "service" => Ok(ContainerKind::Service),
            "task" => Ok(ContainerKind::Task),
            other => Err(Error::Config(format!("invalid container type: {other}"))),
        }
    }
}

/// A mutable definition node with an optional parent to inherit from.
///
/// Reads resolve through the parent chain; writes always land on this node.
/// Parents are shared via `Arc`, which also makes them immutable once linked,
/// so a frozen child can never observe a parent changing underneath it.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    parent: Option<Arc<ContainerSpec>>,
    name: Option<String>,
    kind: Option<ContainerKind>,
    image: Option<String>,
    command: Option<Vec<String>>,
    working_dir: Option<String>,
    detach: Option<bool>,
    remove_on_exit: Option<bool>,
    term_signal: Option<String>,
    ready_timeout: Option<Duration>,
    env: BTreeMap<String, String>,
    links: BTreeMap<String, String>,
    volumes: BTreeMap<String, String>,
    expose: BTreeMap<String, String>,
}

impl ContainerSpec {
    /// Create an empty definition node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Link this node to a parent definition to inherit from.
    pub fn set_parent(&mut self, parent: Arc<ContainerSpec>) {
        self.parent = Some(parent);
    }

    /// Set the local name segment.
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = Some(name.into());
    }

    /// The effective name: the parent's effective name and the local segment
    /// joined with `"."`. A missing segment contributes nothing; a name that
    /// ends up empty resolves to `None`.
    pub fn name(&self) -> Option<String> {
        let parent = self.parent.as_deref().and_then(|p| p.name());
        let local = self.name.as_deref().filter(|s| !s.is_empty());
        match (parent, local) {
            (Some(parent), Some(local)) => Some(format!("{parent}.{local}")),
            (Some(parent), None) => Some(parent),
            (None, Some(local)) => Some(local.to_string()),
            (None, None) => None,
        }
    }

    /// The local name segment, ignoring the parent chain.
    pub fn local_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the container kind.
    pub fn set_kind(&mut self, kind: ContainerKind) {
        self.kind = Some(kind);
    }

    /// The container kind, falling back to the parent.
    pub fn kind(&self) -> Option<ContainerKind> {
        self.kind
            .or_else(|| self.parent.as_deref().and_then(|p| p.kind()))
    }

    /// Set the image.
    pub fn set_image<S: Into<String>>(&mut self, image: S) {
        self.image = Some(image.into());
    }

    /// The image, falling back to the parent.
    pub fn image(&self) -> Option<&str> {
        match self.image.as_deref() {
            Some(image) => Some(image),
            None => self.parent.as_deref().and_then(|p| p.image()),
        }
    }

    /// Set the command to run.
    pub fn set_command<I, S>(&mut self, command: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = Some(command.into_iter().map(Into::into).collect());
    }

    /// The command, falling back to the parent.
    pub fn command(&self) -> Option<&[String]> {
        match self.command.as_deref() {
            Some(command) => Some(command),
            None => self.parent.as_deref().and_then(|p| p.command()),
        }
    }

    /// Set the working directory.
    pub fn set_working_dir<S: Into<String>>(&mut self, dir: S) {
        self.working_dir = Some(dir.into());
    }

    /// The working directory, falling back to the parent.
    pub fn working_dir(&self) -> Option<&str> {
        match self.working_dir.as_deref() {
            Some(dir) => Some(dir),
            None => self.parent.as_deref().and_then(|p| p.working_dir()),
        }
    }

    /// Set whether the container detaches.
    pub fn set_detach(&mut self, detach: bool) {
        self.detach = Some(detach);
    }

    /// The detach flag, falling back to the parent.
    pub fn detach(&self) -> Option<bool> {
        self.detach
            .or_else(|| self.parent.as_deref().and_then(|p| p.detach()))
    }

    /// Set whether the container is removed when it exits.
    pub fn set_remove_on_exit(&mut self, remove: bool) {
        self.remove_on_exit = Some(remove);
    }

    /// The remove-on-exit flag, falling back to the parent.
    pub fn remove_on_exit(&self) -> Option<bool> {
        self.remove_on_exit
            .or_else(|| self.parent.as_deref().and_then(|p| p.remove_on_exit()))
    }

    /// Set the signal used to terminate the container instead of a graceful stop.
    pub fn set_term_signal<S: Into<String>>(&mut self, signal: S) {
        self.term_signal = Some(signal.into());
    }

    /// The termination signal, falling back to the parent.
    pub fn term_signal(&self) -> Option<&str> {
        match self.term_signal.as_deref() {
            Some(signal) => Some(signal),
            None => self.parent.as_deref().and_then(|p| p.term_signal()),
        }
    }

    /// Request a readiness wait on start, bounded by the given timeout.
    pub fn set_ready_timeout(&mut self, timeout: Duration) {
        self.ready_timeout = Some(timeout);
    }

    /// The readiness timeout, falling back to the parent.
    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout
            .or_else(|| self.parent.as_deref().and_then(|p| p.ready_timeout()))
    }

    /// Merge environment variables into the local map.
    pub fn set_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.env.insert(key.into(), value.into());
        }
    }

    /// Look up one environment variable through the parent chain.
    pub fn env(&self, key: &str) -> Option<&str> {
        match self.env.get(key) {
            Some(value) => Some(value),
            None => self.parent.as_deref().and_then(|p| p.env(key)),
        }
    }

    /// Merge link declarations (container name → host alias) into the local map.
    pub fn set_links<I, K, V>(&mut self, links: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (container, alias) in links {
            self.links.insert(container.into(), alias.into());
        }
    }

    /// Look up one link alias through the parent chain.
    pub fn links(&self, container: &str) -> Option<&str> {
        match self.links.get(container) {
            Some(alias) => Some(alias),
            None => self.parent.as_deref().and_then(|p| p.links(container)),
        }
    }

    /// Merge volume binds (host path → container path) into the local map.
    pub fn set_volumes<I, K, V>(&mut self, volumes: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (host, container) in volumes {
            self.volumes.insert(host.into(), container.into());
        }
    }

    /// Look up one volume bind through the parent chain.
    pub fn volumes(&self, host_path: &str) -> Option<&str> {
        match self.volumes.get(host_path) {
            Some(container) => Some(container),
            None => self.parent.as_deref().and_then(|p| p.volumes(host_path)),
        }
    }

    /// Replace the exposed ports (port → protocol) wholesale.
    ///
    /// Unlike the other map attributes this clears first and never inherits.
    pub fn set_expose<I, K, V>(&mut self, ports: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.expose.clear();
        for (port, protocol) in ports {
            self.expose.insert(port.into(), protocol.into());
        }
    }

    /// Look up one exposed port's protocol. Strictly local, never inherited.
    pub fn expose(&self, port: &str) -> Option<&str> {
        self.expose.get(port).map(String::as_str)
    }

    /// Whether the definition resolves both a name and an image.
    pub fn is_valid(&self) -> bool {
        self.name().is_some() && self.image().is_some_and(|i| !i.is_empty())
    }

    /// Check the required attributes, reporting the first one missing.
    pub fn validate(&self) -> Result<()> {
        if self.name().is_none() {
            return Err(Error::Config("no name specified".to_string()));
        }
        if self.image().is_none_or(str::is_empty) {
            return Err(Error::Config("no image specified".to_string()));
        }
        Ok(())
    }

    /// Resolve every attribute through the parent chain and produce an
    /// immutable snapshot.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if name, kind, or image do not resolve.
    pub fn freeze(&self) -> Result<ContainerDefinition> {
        let name = self
            .name()
            .ok_or_else(|| Error::Config("no name specified".to_string()))?;
        let kind = self
            .kind()
            .ok_or_else(|| Error::Config("no container type specified".to_string()))?;
        let image = self
            .image()
            .filter(|i| !i.is_empty())
            .ok_or_else(|| Error::Config("no image specified".to_string()))?
            .to_string();

        let links = self
            .resolved_links()
            .into_iter()
            .map(|(container, alias)| Link::new(container, alias))
            .collect();
        let volumes = self
            .resolved_volumes()
            .into_iter()
            .map(|(host, container)| Volume::new(host, container))
            .collect();
        let exposed_ports = self
            .expose
            .iter()
            .map(|(port, protocol)| ExposedPort::new(port.clone(), protocol.clone()))
            .collect();

        Ok(ContainerDefinition {
            name,
            kind,
            image,
            command: self.command().map(<[String]>::to_vec),
            working_dir: self.working_dir().map(str::to_string),
            detach: self.detach().unwrap_or(false),
            remove_on_exit: self.remove_on_exit().unwrap_or(false),
            term_signal: self.term_signal().map(str::to_string),
            ready_timeout: self.ready_timeout(),
            env: self.resolved_env(),
            links,
            volumes,
            exposed_ports,
        })
    }

    fn resolved_env(&self) -> BTreeMap<String, String> {
        let mut map = self
            .parent
            .as_deref()
            .map(|p| p.resolved_env())
            .unwrap_or_default();
        map.extend(self.env.clone());
        map
    }

    fn resolved_links(&self) -> BTreeMap<String, String> {
        let mut map = self
            .parent
            .as_deref()
            .map(|p| p.resolved_links())
            .unwrap_or_default();
        map.extend(self.links.clone());
        map
    }

    fn resolved_volumes(&self) -> BTreeMap<String, String> {
        let mut map = self
            .parent
            .as_deref()
            .map(|p| p.resolved_volumes())
            .unwrap_or_default();
        map.extend(self.volumes.clone());
        map
    }
}

/// A fully resolved, immutable definition snapshot.
///
/// Produced by [`ContainerSpec::freeze`]; has no setters, so a container's
/// configuration cannot change after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDefinition {
    /// Effective dotted name
    pub name: String,
    /// Service or task
    pub kind: ContainerKind,
    /// Image reference
    pub image: String,
    /// Command to run
    pub command: Option<Vec<String>>,
    /// Working directory inside the container
    pub working_dir: Option<String>,
    /// Detach flag
    pub detach: bool,
    /// Remove the container when it exits
    pub remove_on_exit: bool,
    /// Signal to terminate with instead of a graceful stop
    pub term_signal: Option<String>,
    /// Readiness wait deadline; present iff a readiness wait was requested
    pub ready_timeout: Option<Duration>,
    /// Resolved environment, parent entries overlaid by local ones
    pub env: BTreeMap<String, String>,
    /// Resolved links, sorted by container name
    pub links: Vec<Link>,
    /// Resolved volume binds, sorted by host path
    pub volumes: Vec<Volume>,
    /// Exposed ports, local definition only
    pub exposed_ports: Vec<ExposedPort>,
}

impl ContainerDefinition {
    /// The exposed ports that take part in readiness probing.
    pub fn exposed_tcp_ports(&self) -> impl Iterator<Item = &ExposedPort> {
        self.exposed_ports.iter().filter(|ep| ep.is_tcp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent_spec() -> ContainerSpec {
        let mut parent = ContainerSpec::new();
        parent.set_name("parent");
        parent.set_command(["/bin/echo", "foo"]);
        parent.set_image("parent_image");
        parent.set_env([("bar", "baz")]);
        parent.set_links([("other", "other")]);
        parent.set_expose([("80", "tcp")]);
        parent.set_volumes([("parent", "/usr/local/src/parent")]);
        parent.set_working_dir("parent");
        parent.set_detach(false);
        parent.set_remove_on_exit(false);
        parent
    }

    fn child_spec() -> ContainerSpec {
        let mut child = ContainerSpec::new();
        child.set_parent(Arc::new(parent_spec()));
        child.set_name("name");
        child.set_command(["/bin/bash"]);
        child.set_image("image");
        child.set_env([("foo", "bar")]);
        child.set_links([("parent", "parent")]);
        child.set_expose([("443", "tcp")]);
        child.set_volumes([(".", "/usr/local/src")]);
        child.set_working_dir(".");
        child.set_detach(true);
        child.set_remove_on_exit(true);
        child
    }

    #[test]
    fn test_name_composes_through_parent() {
        let child = child_spec();
        assert_eq!(child.name().as_deref(), Some("parent.name"));
    }

    #[test]
    fn test_name_without_parent_segment() {
        let mut child = ContainerSpec::new();
        child.set_parent(Arc::new(ContainerSpec::new()));
        child.set_name("name");
        assert_eq!(child.name().as_deref(), Some("name"));
    }

    #[test]
    fn test_root_name() {
        let mut root = ContainerSpec::new();
        root.set_name("x");
        assert_eq!(root.name().as_deref(), Some("x"));
    }

    #[test]
    fn test_empty_name_resolves_to_none() {
        assert_eq!(ContainerSpec::new().name(), None);
        let mut spec = ContainerSpec::new();
        spec.set_name("");
        assert_eq!(spec.name(), None);
    }

    #[test]
    fn test_scalar_local_value_shadows_parent() {
        let child = child_spec();
        assert_eq!(child.image(), Some("image"));
        assert_eq!(child.command(), Some(&["/bin/bash".to_string()][..]));
        assert_eq!(child.working_dir(), Some("."));
        assert_eq!(child.detach(), Some(true));
        assert_eq!(child.remove_on_exit(), Some(true));
    }

    #[test]
    fn test_scalar_inherited_when_unset() {
        let mut child = ContainerSpec::new();
        child.set_parent(Arc::new(parent_spec()));
        child.set_name("name");
        assert_eq!(child.image(), Some("parent_image"));
        assert_eq!(
            child.command(),
            Some(&["/bin/echo".to_string(), "foo".to_string()][..])
        );
        assert_eq!(child.working_dir(), Some("parent"));
        assert_eq!(child.detach(), Some(false));
    }

    #[test]
    fn test_env_merges_and_inherits() {
        let mut child = child_spec();
        assert_eq!(child.env("foo"), Some("bar"));
        // inherited from the parent
        assert_eq!(child.env("bar"), Some("baz"));
        // set-many merges, does not clear
        child.set_env([("a", "a"), ("b", "b")]);
        assert_eq!(child.env("a"), Some("a"));
        assert_eq!(child.env("foo"), Some("bar"));
    }

    #[test]
    fn test_links_merge_and_inherit() {
        let mut child = child_spec();
        assert_eq!(child.links("parent"), Some("parent"));
        assert_eq!(child.links("other"), Some("other"));
        child.set_links([("container3", "c3"), ("container4", "c4")]);
        assert_eq!(child.links("container3"), Some("c3"));
        assert_eq!(child.links("parent"), Some("parent"));
    }

    #[test]
    fn test_volumes_inherit() {
        let child = child_spec();
        assert_eq!(child.volumes("."), Some("/usr/local/src"));
        assert_eq!(child.volumes("parent"), Some("/usr/local/src/parent"));
    }

    #[test]
    fn test_expose_never_inherits() {
        let child = child_spec();
        assert_eq!(child.expose("443"), Some("tcp"));
        // the parent exposes 80, the child must not see it
        assert_eq!(child.expose("80"), None);
    }

    #[test]
    fn test_expose_replaces_wholesale() {
        let mut child = child_spec();
        child.set_expose([("8080", "tcp")]);
        assert_eq!(child.expose("8080"), Some("tcp"));
        assert_eq!(child.expose("443"), None);
    }

    #[test]
    fn test_validity() {
        let mut spec = ContainerSpec::new();
        assert!(!spec.is_valid());
        spec.set_name("name");
        assert!(!spec.is_valid());
        spec.set_image("image");
        assert!(spec.is_valid());
    }

    #[test]
    fn test_validate_reports_missing_attribute() {
        let mut spec = ContainerSpec::new();
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("no name specified"));

        spec.set_name("name");
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("no image specified"));

        spec.set_image("image");
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_freeze_resolves_parent_chain() {
        let mut child = child_spec();
        child.set_kind(ContainerKind::Service);
        let definition = child.freeze().unwrap();

        assert_eq!(definition.name, "parent.name");
        assert_eq!(definition.kind, ContainerKind::Service);
        assert_eq!(definition.image, "image");
        // merged env: parent entry plus local entry
        assert_eq!(definition.env.get("foo").map(String::as_str), Some("bar"));
        assert_eq!(definition.env.get("bar").map(String::as_str), Some("baz"));
        // merged links and volumes
        assert!(definition.links.contains(&Link::new("parent", "parent")));
        assert!(definition.links.contains(&Link::new("other", "other")));
        assert!(
            definition
                .volumes
                .contains(&Volume::new("parent", "/usr/local/src/parent"))
        );
        // expose stays local
        assert_eq!(definition.exposed_ports, vec![ExposedPort::new("443", "tcp")]);
    }

    #[test]
    fn test_freeze_local_env_wins_over_parent() {
        let mut parent = ContainerSpec::new();
        parent.set_env([("key", "parent")]);
        let mut child = ContainerSpec::new();
        child.set_parent(Arc::new(parent));
        child.set_name("c");
        child.set_kind(ContainerKind::Task);
        child.set_image("i");
        child.set_env([("key", "child")]);

        let definition = child.freeze().unwrap();
        assert_eq!(definition.env.get("key").map(String::as_str), Some("child"));
    }

    #[test]
    fn test_freeze_requires_kind() {
        let mut spec = ContainerSpec::new();
        spec.set_name("name");
        spec.set_image("image");
        let err = spec.freeze().unwrap_err();
        assert!(err.to_string().contains("no container type specified"));
    }

    #[test]
    fn test_exposed_tcp_ports_filter() {
        let mut spec = ContainerSpec::new();
        spec.set_name("svc");
        spec.set_kind(ContainerKind::Service);
        spec.set_image("alpine");
        spec.set_expose([("8080", "tcp"), ("53", "udp")]);
        let definition = spec.freeze().unwrap();
        let tcp: Vec<_> = definition.exposed_tcp_ports().collect();
        assert_eq!(tcp, vec![&ExposedPort::new("8080", "tcp")]);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("service".parse::<ContainerKind>().unwrap(), ContainerKind::Service);
        assert_eq!("task".parse::<ContainerKind>().unwrap(), ContainerKind::Task);
        assert!("daemon".parse::<ContainerKind>().is_err());
        assert_eq!(ContainerKind::Service.to_string(), "service");
    }
}
