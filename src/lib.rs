//! Ephemeral Docker/Podman containers as test fixtures.
//!
//! `corral` drives disposable containers through their lifecycle so integration
//! tests can declare the services they need, wait until those services actually
//! accept connections, and tear everything down afterwards. It talks to
//! Docker or Podman via the bollard API.
//!
//! ## Architecture
//!
//! - [`definition`]: hierarchical container definitions with parent fallback
//! - [`container`]: the guarded lifecycle state machine
//! - [`readiness`]: TCP readiness probing via disposable observer containers
//! - [`client`]: Docker/Podman API wrapper with connection fallback
//! - [`payload`]: create-request construction from a resolved definition
//! - [`validate`]: definition validation strategy
//! - [`values`]: link, exposed-port, and volume value objects
//!
//! ## Usage
//!
//! ```rust,no_run
//! use corral::{Container, ContainerClient, ContainerKind};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ContainerClient::new().await?;
//!
//!     let mut db = Container::new(client, |spec| {
//!         spec.set_name("it.postgres");
//!         spec.set_kind(ContainerKind::Service);
//!         spec.set_image("postgres:16-alpine");
//!         spec.set_env([("POSTGRES_PASSWORD", "secret")]);
//!         spec.set_expose([("5432", "tcp")]);
//!         spec.set_ready_timeout(Duration::from_secs(30));
//!     })?;
//!
//!     db.create().await?;
//!     db.start().await?; // blocks until port 5432 accepts connections
//!
//!     // ... run tests against the database ...
//!
//!     db.stop().await?;
//!     db.destroy().await?;
//!     Ok(())
//! }
//! ```

/// Docker/Podman API client wrapper with connection fallback.
pub mod client;

/// Container lifecycle state machine.
pub mod container;

/// Hierarchical container definitions with parent-chain resolution.
pub mod definition;

/// Create-request payload construction.
pub mod payload;

/// Service readiness probing via observer containers.
pub mod readiness;

/// Definition validation strategy.
pub mod validate;

/// Wire-textual value objects.
pub mod values;

/// Cancellable output polling for attached callbacks.
pub mod watch;

pub use client::{ContainerClient, ContainerClientConfig};
pub use container::{Container, ContainerState};
pub use definition::{ContainerDefinition, ContainerKind, ContainerSpec};
pub use payload::{BuildCreateRequest, CreateRequestBuilder};
pub use readiness::{
    DEFAULT_WAIT_TIMEOUT, ReadinessWaiter, ServiceObservation, ServicesNotReadyError,
};
pub use validate::{DefinitionValidator, ValidateDefinition};
pub use values::{ExposedPort, Link, Volume};
pub use watch::OutputWatcher;

/// Container fixture errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Docker/Podman API error, surfaced verbatim
    #[error("container API error: {0}")]
    Api(#[from] bollard::errors::Error),

    /// Container not found by name or id
    #[error("container not found: {0}")]
    NotFound(String),

    /// Definition construction or validation error
    #[error("invalid definition: {0}")]
    Config(String),

    /// Lifecycle method invoked in the wrong state
    #[error("{0}")]
    State(String),

    /// One or more service ports never became reachable
    #[error(transparent)]
    ServicesNotReady(#[from] readiness::ServicesNotReadyError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// General error
    #[error("container error: {0}")]
    Other(String),
}

/// Result type for container fixture operations.
pub type Result<T> = std::result::Result<T, Error>;
