//! Create-request payload construction.
//!
//! Flattens a resolved [`ContainerDefinition`] into the runtime's
//! create-container body: environment as `k=v` strings, exposed ports keyed by
//! their `port/protocol` form, links and binds in the host config using the
//! value objects' textual forms. Empty sections are omitted entirely.
//!
//! Like validation, the builder is a strategy trait injected at container
//! construction so tests can substitute a fake.

use crate::definition::ContainerDefinition;
use bollard::container::Config;
use bollard::service::HostConfig;
use std::collections::HashMap;

/// Builds a runtime create-request from a resolved definition.
pub trait BuildCreateRequest: Send + Sync {
    /// Map the definition into the runtime's create-container body.
    fn build(&self, definition: &ContainerDefinition) -> Config<String>;
}

/// Default create-request builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateRequestBuilder;

impl BuildCreateRequest for CreateRequestBuilder {
    fn build(&self, definition: &ContainerDefinition) -> Config<String> {
        let env: Vec<String> = definition
            .env
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();

        let exposed_ports: HashMap<String, HashMap<(), ()>> = definition
            .exposed_ports
            .iter()
            .map(|port| (port.to_string(), HashMap::new()))
            .collect();

        let links: Vec<String> = definition.links.iter().map(ToString::to_string).collect();
        let binds: Vec<String> = definition.volumes.iter().map(ToString::to_string).collect();

        let host_config = if links.is_empty() && binds.is_empty() {
            None
        } else {
            Some(HostConfig {
                links: (!links.is_empty()).then_some(links),
                binds: (!binds.is_empty()).then_some(binds),
                ..Default::default()
            })
        };

        Config {
            image: Some(definition.image.clone()),
            cmd: definition.command.clone(),
            working_dir: definition.working_dir.clone(),
            env: (!env.is_empty()).then_some(env),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            host_config,
            ..Default::default()
        }
    }
}
