//! TCP readiness probing for service containers.
//!
//! A service is ready when every exposed TCP port accepts connections. The
//! probe runs from inside the container network: for each TCP port a
//! disposable observer container is launched, linked to the service, running
//! netcat against the port. An observer that exits zero saw the port open.
//! Observers are destroyed on both the success and the failure path.

use crate::client::ContainerClient;
use crate::container::Container;
use crate::definition::{ContainerDefinition, ContainerKind};
use crate::values::ExposedPort;
use crate::{Error, Result};
use bollard::models::ContainerStateStatusEnum;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default wait deadline when a definition requests readiness without one.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed delay between probe rounds.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Image the observer containers run.
const PROBE_IMAGE: &str = "alpine";

/// One observer's verdict on one exposed port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceObservation {
    /// Service container name
    pub service: String,
    /// The probed port
    pub exposed_port: ExposedPort,
    /// Runtime status of the observer container
    pub status: String,
    /// Observer exit code, absent while it is still running
    pub exit_code: Option<i64>,
    /// Observer output
    pub output: String,
}

impl ServiceObservation {
    /// Whether the observer saw the port accept a connection.
    pub fn ready(&self) -> bool {
        self.status == "exited" && self.exit_code == Some(0)
    }
}

impl fmt::Display for ServiceObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self.exit_code {
            Some(code) => code.to_string(),
            None => "none".to_string(),
        };
        write!(
            f,
            "{} not listening on {} (probe exit {}): {}",
            self.service,
            self.exposed_port,
            code,
            self.output.trim()
        )
    }
}

/// The readiness wait deadline passed with ports still unreachable.
///
/// Carries the final observation for each port that never came up, so the
/// error message names every port and what the probe saw.
#[derive(Debug, Clone)]
pub struct ServicesNotReadyError {
    /// Final not-ready observations, one per unreachable port
    pub observations: Vec<ServiceObservation>,
}

impl fmt::Display for ServicesNotReadyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // one line per port that never came up
        for (i, observation) in self.observations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{observation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ServicesNotReadyError {}

/// Waits until every exposed TCP port of one service accepts connections.
///
/// Built from a started service's definition; consumed by [`ReadinessWaiter::wait`].
pub struct ReadinessWaiter {
    service: String,
    timeout: Duration,
    observers: Vec<(ExposedPort, Container)>,
}

impl ReadinessWaiter {
    /// Set up one observer per exposed TCP port of the definition.
    ///
    /// Nothing is created in the runtime yet; that happens in `wait()`.
    ///
    /// # Errors
    ///
    /// Fails only if an observer definition cannot be constructed.
    pub fn new(client: &ContainerClient, definition: &ContainerDefinition) -> Result<Self> {
        let service = definition.name.clone();
        let tcp_ports: Vec<ExposedPort> = definition.exposed_tcp_ports().cloned().collect();
        // Port suffix only when it is needed to keep observer names unique
        let suffix_ports = tcp_ports.len() > 1;

        let mut observers = Vec::with_capacity(tcp_ports.len());
        for port in tcp_ports {
            let observer = Self::observer(client, &service, &port, suffix_ports)?;
            observers.push((port, observer));
        }

        Ok(Self {
            service,
            timeout: definition.ready_timeout.unwrap_or(DEFAULT_WAIT_TIMEOUT),
            observers,
        })
    }

    fn observer(
        client: &ContainerClient,
        service: &str,
        port: &ExposedPort,
        suffix_port: bool,
    ) -> Result<Container> {
        let name = if suffix_port {
            format!("{service}.observer.{}", port.port)
        } else {
            format!("{service}.observer")
        };
        let command = [
            "/usr/bin/nc".to_string(),
            "-vv".to_string(),
            service.to_string(),
            port.port.clone(),
            "-e".to_string(),
            "/bin/hostname".to_string(),
        ];
        let links = [(service.to_string(), service.to_string())];

        Container::new(client.clone(), move |spec| {
            spec.set_name(name);
            spec.set_kind(ContainerKind::Task);
            spec.set_image(PROBE_IMAGE);
            spec.set_command(command);
            spec.set_links(links);
            // netcat ignores the default stop signal
            spec.set_term_signal("SIGKILL");
        })
    }

    /// Block until every port is reachable or the deadline passes.
    ///
    /// Observers are torn down before this returns, on both paths. Teardown
    /// failures are logged and do not mask the wait outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ServicesNotReadyError`] past the deadline, or the underlying
    /// API error if an observer cannot be launched.
    pub async fn wait(mut self) -> Result<()> {
        if self.observers.is_empty() {
            debug!("Service {} exposes no TCP ports, ready by definition", self.service);
            return Ok(());
        }

        let outcome = self.observe().await;
        self.destroy_observers().await;
        outcome
    }

    async fn observe(&mut self) -> Result<()> {
        info!(
            "Waiting up to {:?} for {} port(s) of {}",
            self.timeout,
            self.observers.len(),
            self.service
        );

        for (port, observer) in &mut self.observers {
            debug!("Launching observer for {}:{}", self.service, port);
            observer.create().await?;
            observer.start().await?;
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let mut pending = Vec::new();
            for (port, observer) in &self.observers {
                let observation = Self::observation(&self.service, port, observer).await?;
                if !observation.ready() {
                    pending.push(observation);
                }
            }

            if pending.is_empty() {
                info!("Service {} is ready", self.service);
                return Ok(());
            }
            if Instant::now() >= deadline {
                for observation in &pending {
                    warn!("Readiness wait failed: {}", observation);
                }
                return Err(Error::ServicesNotReady(ServicesNotReadyError {
                    observations: pending,
                }));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn observation(
        service: &str,
        port: &ExposedPort,
        observer: &Container,
    ) -> Result<ServiceObservation> {
        let response = observer.inspect().await?;
        let (status, exit_code) = match response.state {
            Some(state) => (
                state
                    .status
                    .unwrap_or(ContainerStateStatusEnum::EMPTY)
                    .to_string(),
                state.exit_code,
            ),
            None => (String::new(), None),
        };
        let output = observer.output().await.unwrap_or_default();

        Ok(ServiceObservation {
            service: service.to_string(),
            exposed_port: port.clone(),
            status,
            exit_code,
            output,
        })
    }

    async fn destroy_observers(&mut self) {
        for (port, observer) in &mut self.observers {
            if observer.id().is_none() {
                continue;
            }
            if let Err(err) = observer.destroy().await {
                warn!("Failed to destroy observer for port {}: {}", port, err);
            }
        }
    }
}
