//! Docker/Podman client wrapper.
//!
//! Provides the container-runtime operations the lifecycle layer needs, with
//! automatic connection fallback between Docker and Podman sockets. Runtime
//! failures surface verbatim as [`Error::Api`]; retry policy belongs to the
//! caller.

use crate::{Error, Result};
use bollard::Docker;
use futures::stream::StreamExt;
use std::sync::Arc;
use tracing::{debug, info};

/// Container client configuration.
#[derive(Debug, Clone)]
pub struct ContainerClientConfig {
    /// Pull images automatically before creating containers
    pub auto_pull: bool,
    /// Grace period for a graceful stop, in seconds
    pub stop_timeout: i64,
}

impl Default for ContainerClientConfig {
    fn default() -> Self {
        Self {
            auto_pull: true,
            stop_timeout: 10,
        }
    }
}

/// Docker/Podman API client wrapper.
///
/// Cheap to clone; every clone shares the same underlying connection.
#[derive(Clone)]
pub struct ContainerClient {
    docker: Arc<Docker>,
    config: ContainerClientConfig,
}

impl ContainerClient {
    /// Create a new container client with default configuration.
    ///
    /// Attempts to connect to Docker first, then falls back to Podman if available.
    ///
    /// # Errors
    ///
    /// Returns error if neither Docker nor Podman are available or connection fails.
    pub async fn new() -> Result<Self> {
        Self::with_config(ContainerClientConfig::default()).await
    }

    /// Create a new container client with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns error if connection to container runtime fails.
    pub async fn with_config(config: ContainerClientConfig) -> Result<Self> {
        let docker = Self::connect().await?;

        let client = Self {
            docker: Arc::new(docker),
            config,
        };

        // Verify connection works
        client.ping().await?;

        Ok(client)
    }

    /// Wrap an existing bollard handle without pinging it.
    ///
    /// Useful in tests that exercise guard behavior without a running daemon.
    pub fn from_docker(docker: Docker) -> Self {
        Self {
            docker: Arc::new(docker),
            config: ContainerClientConfig::default(),
        }
    }

    /// Connect to Docker or Podman daemon.
    ///
    /// Tries multiple connection strategies in order:
    /// 1. Local defaults (Unix socket or Windows named pipe)
    /// 2. DOCKER_HOST environment variable
    /// 3. Podman socket (if Docker fails)
    async fn connect() -> Result<Docker> {
        debug!("Attempting to connect to container runtime...");

        match Docker::connect_with_local_defaults() {
            Ok(docker) => {
                info!("Connected to container runtime via local defaults");
                return Ok(docker);
            }
            Err(e) => {
                debug!("Local defaults failed: {}", e);
            }
        }

        #[cfg(unix)]
        {
            // Try rootless Podman socket
            if let Ok(home) = std::env::var("HOME") {
                let podman_socket = format!("unix://{}/run/podman/podman.sock", home);
                debug!("Trying Podman socket: {}", podman_socket);

                match Docker::connect_with_socket(&podman_socket, 120, bollard::API_DEFAULT_VERSION)
                {
                    Ok(docker) => {
                        info!("Connected to Podman via rootless socket");
                        return Ok(docker);
                    }
                    Err(e) => {
                        debug!("Podman rootless socket failed: {}", e);
                    }
                }
            }

            // Try system Podman socket
            let system_socket = "unix:///run/podman/podman.sock";
            debug!("Trying system Podman socket: {}", system_socket);

            match Docker::connect_with_socket(system_socket, 120, bollard::API_DEFAULT_VERSION) {
                Ok(docker) => {
                    info!("Connected to Podman via system socket");
                    return Ok(docker);
                }
                Err(e) => {
                    debug!("Podman system socket failed: {}", e);
                }
            }
        }

        Err(Error::Other(
            "Failed to connect to Docker or Podman. Please ensure Docker or Podman is installed and running.".to_string()
        ))
    }

    /// Ping the container runtime to verify connectivity.
    ///
    /// # Errors
    ///
    /// Returns error if ping fails.
    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| Error::Other(format!("Failed to ping container runtime: {}", e)))?;
        debug!("Container runtime ping successful");
        Ok(())
    }

    /// Check if an image exists locally.
    ///
    /// # Errors
    ///
    /// Returns error if image inspection fails.
    pub async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(Error::Api(e)),
        }
    }

    /// Pull an image if not present locally.
    ///
    /// # Errors
    ///
    /// Returns error if the pull fails.
    pub async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.image_exists(image).await? {
            debug!("Image {} already exists locally", image);
            return Ok(());
        }

        info!("Pulling image: {}", image);
        self.pull_image(image).await
    }

    /// Pull an image from the registry.
    ///
    /// # Errors
    ///
    /// Returns error if the pull fails.
    pub async fn pull_image(&self, image: &str) -> Result<()> {
        let mut stream = self.docker.create_image(
            Some(bollard::image::CreateImageOptions {
                from_image: image,
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(result) = stream.next().await {
            match result {
                Ok(pull) => {
                    if let Some(status) = pull.status {
                        debug!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    return Err(Error::Api(e));
                }
            }
        }

        info!("Successfully pulled image: {}", image);
        Ok(())
    }

    /// Create a container and return its runtime id.
    ///
    /// Pulls the image first when auto-pull is enabled.
    ///
    /// # Errors
    ///
    /// Returns error if creation fails.
    pub async fn create_container(
        &self,
        name: &str,
        body: bollard::container::Config<String>,
    ) -> Result<String> {
        if self.config.auto_pull {
            if let Some(image) = body.image.as_deref() {
                self.ensure_image(image).await?;
            }
        }

        debug!("Creating container: {}", name);

        let options = bollard::container::CreateContainerOptions {
            name,
            ..Default::default()
        };

        let response = self.docker.create_container(Some(options), body).await?;

        info!("Created container: {} ({})", name, response.id);

        Ok(response.id)
    }

    /// Start a container.
    ///
    /// # Errors
    ///
    /// Returns error if the start fails.
    pub async fn start_container(&self, container_id: &str) -> Result<()> {
        debug!("Starting container: {}", container_id);

        self.docker
            .start_container(
                container_id,
                None::<bollard::container::StartContainerOptions<String>>,
            )
            .await?;

        info!("Started container: {}", container_id);
        Ok(())
    }

    /// Stop a container gracefully, within the configured grace period.
    ///
    /// # Errors
    ///
    /// Returns error if the stop fails.
    pub async fn stop_container(&self, container_id: &str) -> Result<()> {
        debug!("Stopping container: {}", container_id);

        self.docker
            .stop_container(
                container_id,
                Some(bollard::container::StopContainerOptions {
                    t: self.config.stop_timeout,
                }),
            )
            .await?;

        info!("Stopped container: {}", container_id);
        Ok(())
    }

    /// Kill a container with the given signal.
    ///
    /// # Errors
    ///
    /// Returns error if the kill fails.
    pub async fn kill_container(&self, container_id: &str, signal: &str) -> Result<()> {
        debug!("Killing container {} with {}", container_id, signal);

        self.docker
            .kill_container(
                container_id,
                Some(bollard::container::KillContainerOptions { signal }),
            )
            .await?;

        info!("Killed container: {}", container_id);
        Ok(())
    }

    /// Remove a container, along with its anonymous volumes.
    ///
    /// # Errors
    ///
    /// Returns error if the removal fails.
    pub async fn remove_container(&self, container_id: &str, force: bool) -> Result<()> {
        debug!("Removing container: {}", container_id);

        self.docker
            .remove_container(
                container_id,
                Some(bollard::container::RemoveContainerOptions {
                    force,
                    v: true,
                    ..Default::default()
                }),
            )
            .await?;

        info!("Removed container: {}", container_id);
        Ok(())
    }

    /// Inspect a container, mapping an unknown id to [`Error::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns error if the container is not found or inspection fails.
    pub async fn inspect_container(
        &self,
        container_id: &str,
    ) -> Result<bollard::models::ContainerInspectResponse> {
        self.docker
            .inspect_container(
                container_id,
                None::<bollard::query_parameters::InspectContainerOptions>,
            )
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => Error::NotFound(container_id.to_string()),
                e => Error::Api(e),
            })
    }

    /// Collect a snapshot of a container's stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns error if log retrieval fails.
    pub async fn logs(&self, container_id: &str, tail: Option<&str>) -> Result<String> {
        let mut stream = self.docker.logs(
            container_id,
            Some(bollard::container::LogsOptions {
                stdout: true,
                stderr: true,
                tail: tail.unwrap_or("all").to_string(),
                ..Default::default()
            }),
        );
        let mut output = String::new();

        while let Some(result) = stream.next().await {
            match result {
                Ok(log) => {
                    output.push_str(&log.to_string());
                }
                Err(e) => {
                    return Err(Error::Api(e));
                }
            }
        }

        Ok(output)
    }

    /// Get the underlying Docker client for advanced operations.
    pub fn docker(&self) -> &Docker {
        &self.docker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ContainerClientConfig::default();
        assert!(config.auto_pull);
        assert_eq!(config.stop_timeout, 10);
    }

    #[tokio::test]
    #[ignore] // Requires Docker/Podman to be running
    async fn test_client_connection() {
        let client = ContainerClient::new().await.unwrap();
        client.ping().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_image_roundtrip() {
        let client = ContainerClient::new().await.unwrap();
        client.ensure_image("alpine").await.unwrap();
        assert!(client.image_exists("alpine").await.unwrap());
    }
}
