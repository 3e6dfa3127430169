//! Definition validation.
//!
//! Validation is a strategy trait injected at container construction, so tests
//! can substitute a fake without touching global state.

use crate::definition::ContainerSpec;
use crate::{Error, Result};

/// Validates a definition before a container freezes it.
pub trait ValidateDefinition: Send + Sync {
    /// Check the definition, reporting the first problem found.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the missing or invalid attribute.
    fn validate(&self, spec: &ContainerSpec) -> Result<()>;
}

/// Default validator: requires a name, a kind, and an image.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionValidator;

impl ValidateDefinition for DefinitionValidator {
    fn validate(&self, spec: &ContainerSpec) -> Result<()> {
        if spec.name().is_none() {
            return Err(Error::Config("no name specified".to_string()));
        }
        if spec.kind().is_none() {
            return Err(Error::Config("no container type specified".to_string()));
        }
        if spec.image().is_none_or(str::is_empty) {
            return Err(Error::Config("no image specified".to_string()));
        }
        Ok(())
    }
}
