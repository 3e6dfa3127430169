//! Container lifecycle state machine.
//!
//! A [`Container`] owns a frozen definition and drives it through
//! `defined → created → started → {ready | working} → stopped → destroyed`.
//! Every transition checks the current state before any runtime call is made,
//! so a guard failure never leaves partial side effects behind.

use crate::client::ContainerClient;
use crate::definition::{ContainerDefinition, ContainerKind, ContainerSpec};
use crate::payload::{BuildCreateRequest, CreateRequestBuilder};
use crate::readiness::ReadinessWaiter;
use crate::validate::{DefinitionValidator, ValidateDefinition};
use crate::watch::{DEFAULT_POLL_INTERVAL, OutputWatcher};
use crate::{Error, Result};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Definition frozen, nothing created in the runtime yet
    Defined,
    /// Created in the runtime, not running
    Created,
    /// Running, readiness not yet settled
    Started,
    /// Running service with all exposed TCP ports reachable
    Ready,
    /// Running task
    Working,
    /// Stopped by `stop()`
    Stopped,
    /// Destroyed; terminal, the container cannot be reused
    Destroyed,
}

impl ContainerState {
    /// Whether the container is running in some form.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ContainerState::Started | ContainerState::Ready | ContainerState::Working
        )
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Defined => "defined",
            ContainerState::Created => "created",
            ContainerState::Started => "started",
            ContainerState::Ready => "ready",
            ContainerState::Working => "working",
            ContainerState::Stopped => "stopped",
            ContainerState::Destroyed => "destroyed",
        };
        write!(f, "{s}")
    }
}

/// An ephemeral container bound to one frozen definition.
///
/// Holds a shared runtime client handle and its own mutable state. Lifecycle
/// methods take `&mut self`, so calls on one instance are serialized by the
/// borrow checker.
pub struct Container {
    client: ContainerClient,
    definition: ContainerDefinition,
    builder: Box<dyn BuildCreateRequest>,
    state: ContainerState,
    id: Option<String>,
    watcher: Option<OutputWatcher>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("definition", &self.definition)
            .field("state", &self.state)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Container {
    /// Build a container from a configuration closure over a fresh spec.
    ///
    /// The spec is validated and frozen before this returns; an incomplete
    /// definition fails here, never later.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first missing attribute.
    pub fn new<F>(client: ContainerClient, configure: F) -> Result<Self>
    where
        F: FnOnce(&mut ContainerSpec),
    {
        Self::with_strategies(client, DefinitionValidator, CreateRequestBuilder, configure)
    }

    /// Build a container with injected validation and payload strategies.
    ///
    /// Tests substitute fakes here instead of mutating global state.
    ///
    /// # Errors
    ///
    /// Returns whatever the injected validator reports, or a configuration
    /// error if the definition cannot be frozen.
    pub fn with_strategies<V, B, F>(
        client: ContainerClient,
        validator: V,
        builder: B,
        configure: F,
    ) -> Result<Self>
    where
        V: ValidateDefinition,
        B: BuildCreateRequest + 'static,
        F: FnOnce(&mut ContainerSpec),
    {
        let mut spec = ContainerSpec::new();
        configure(&mut spec);
        validator.validate(&spec)?;
        let definition = spec.freeze()?;

        Ok(Self {
            client,
            definition,
            builder: Box::new(builder),
            state: ContainerState::Defined,
            id: None,
            watcher: None,
        })
    }

    /// The frozen definition.
    pub fn definition(&self) -> &ContainerDefinition {
        &self.definition
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ContainerState {
        self.state
    }

    /// Runtime-assigned id, present between `create()` and `destroy()`.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The shared runtime client handle.
    pub fn client(&self) -> &ContainerClient {
        &self.client
    }

    /// Whether this is a service container.
    pub fn is_service(&self) -> bool {
        self.definition.kind == ContainerKind::Service
    }

    /// Whether this is a task container.
    pub fn is_task(&self) -> bool {
        self.definition.kind == ContainerKind::Task
    }

    /// Whether the container is running in some form.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Create the container in the runtime.
    ///
    /// # Errors
    ///
    /// Fails if the container was already created, or if the runtime call fails.
    pub async fn create(&mut self) -> Result<()> {
        if self.id.is_some() {
            return Err(Error::State("container already created".to_string()));
        }

        let body = self.builder.build(&self.definition);
        let id = self.client.create_container(&self.definition.name, body).await?;

        self.id = Some(id);
        self.state = ContainerState::Created;
        Ok(())
    }

    /// Start the container.
    ///
    /// For a service whose definition requests a readiness wait, this blocks
    /// until every exposed TCP port accepts connections or the wait deadline
    /// passes. On a failed wait the error propagates and the container stays
    /// `Started`; callers decide whether to retry or tear down.
    ///
    /// # Errors
    ///
    /// Fails if the container is not created, already started or stopped,
    /// the runtime call fails, or the readiness wait times out.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_active() {
            return Err(Error::State("container already started".to_string()));
        }
        // no restart from stopped, a fixture runs once
        if self.state == ContainerState::Stopped {
            return Err(Error::State("container already stopped".to_string()));
        }
        let Some(id) = self.id.clone() else {
            return Err(Error::State("container not created".to_string()));
        };

        self.client.start_container(&id).await?;
        self.state = ContainerState::Started;

        if self.is_service() {
            if self.definition.ready_timeout.is_some() {
                // boxed: the waiter starts observer containers, which makes
                // this future recursive
                let wait = ReadinessWaiter::new(&self.client, &self.definition)?.wait();
                Box::pin(wait).await?;
            }
            self.state = ContainerState::Ready;
        } else {
            self.state = ContainerState::Working;
        }

        debug!("Container {} is {}", self.definition.name, self.state);
        Ok(())
    }

    /// Stop the container.
    ///
    /// With a termination signal in the definition, kills with that signal
    /// instead of a graceful stop; some command-line processes ignore the
    /// default stop signal. Known limitation: a command that traps the
    /// configured signal will hang the runtime call.
    ///
    /// # Errors
    ///
    /// Fails if the container is not running, or if the runtime call fails.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_active() {
            return Err(Error::State("container not started".to_string()));
        }
        let Some(id) = self.id.clone() else {
            return Err(Error::State("container not created".to_string()));
        };

        self.stop_watcher().await;

        match self.definition.term_signal.as_deref() {
            Some(signal) => self.client.kill_container(&id, signal).await?,
            None => self.client.stop_container(&id).await?,
        }

        self.state = ContainerState::Stopped;
        Ok(())
    }

    /// Force-remove the container from the runtime.
    ///
    /// Terminal: a destroyed container cannot be created again.
    ///
    /// # Errors
    ///
    /// Fails if the container was never created, or if the runtime call fails.
    pub async fn destroy(&mut self) -> Result<()> {
        let Some(id) = self.id.clone() else {
            return Err(Error::State("container not created".to_string()));
        };

        self.stop_watcher().await;
        self.client.remove_container(&id, true).await?;

        info!("Destroyed container {}", self.definition.name);
        self.id = None;
        self.state = ContainerState::Destroyed;
        Ok(())
    }

    /// Inspect the container, returning the runtime's structured response.
    ///
    /// # Errors
    ///
    /// Fails if the container was never created, or if inspection fails.
    pub async fn inspect(&self) -> Result<bollard::models::ContainerInspectResponse> {
        let Some(id) = self.id.as_deref() else {
            return Err(Error::State("container not created".to_string()));
        };
        self.client.inspect_container(id).await
    }

    /// Snapshot the container's output so far.
    ///
    /// # Errors
    ///
    /// Fails if the container is not running, or if log retrieval fails.
    pub async fn output(&self) -> Result<String> {
        if !self.is_active() {
            return Err(Error::State("container not started".to_string()));
        }
        let Some(id) = self.id.as_deref() else {
            return Err(Error::State("container not created".to_string()));
        };
        self.client.logs(id, None).await
    }

    /// Attach a background watcher that feeds output deltas to the callback.
    ///
    /// Polls every `interval` (100 ms when `None`). Per-cycle errors are
    /// logged and swallowed so a transient hiccup does not kill the watcher.
    /// The watcher stops on [`Container::detach`], `stop()`, or `destroy()`.
    ///
    /// # Errors
    ///
    /// Fails if the container is not running.
    pub async fn attach<F>(&mut self, interval: Option<Duration>, callback: F) -> Result<()>
    where
        F: FnMut(&str) + Send + 'static,
    {
        if !self.is_active() {
            return Err(Error::State("container not started".to_string()));
        }
        let Some(id) = self.id.clone() else {
            return Err(Error::State("container not created".to_string()));
        };

        // Replace any previous watcher rather than stacking them
        self.stop_watcher().await;

        self.watcher = Some(OutputWatcher::spawn(
            self.client.clone(),
            id,
            interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            callback,
        ));
        Ok(())
    }

    /// Stop the attached output watcher, if any.
    pub async fn detach(&mut self) {
        self.stop_watcher().await;
    }

    async fn stop_watcher(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.stop().await;
        }
    }

    #[cfg(test)]
    pub(crate) fn force_runtime_state(&mut self, state: ContainerState, id: Option<String>) {
        self.state = state;
        self.id = id;
    }
}
