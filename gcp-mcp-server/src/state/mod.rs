//! Process-wide project state
//!
//! Holds the project id tool calls operate against and whether credential
//! resolution has completed. Constructed once at bootstrap and shared via
//! `Arc`; nothing here is global.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

use crate::error::ServiceError;

/// Environment variable the provider client libraries read the project from.
pub const PROJECT_ENV_VAR: &str = "GOOGLE_CLOUD_PROJECT";

/// Publishes the startup project to [`PROJECT_ENV_VAR`] for child processes
/// and client libraries.
///
/// Must run before any other thread exists: the environment is process-wide
/// and libc readers (DNS resolution among them) do not take std's env lock.
/// Later project changes stay in [`ProjectState`] and are never exported.
pub fn export_project_env(project_id: &str) {
    std::env::set_var(PROJECT_ENV_VAR, project_id);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessState {
    pub current_project_id: Option<String>,
    pub auth_initialized: bool,
}

pub struct ProjectState {
    state: Mutex<ProcessState>,
}

impl ProjectState {
    pub fn new(initial_project_id: Option<String>) -> Self {
        let current_project_id = initial_project_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        Self {
            state: Mutex::new(ProcessState {
                current_project_id,
                auth_initialized: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProcessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ProcessState {
        self.lock().clone()
    }

    pub fn current_project_id(&self) -> Option<String> {
        self.lock().current_project_id.clone()
    }

    /// Stores `id` exactly as given. Empty ids and ids with surrounding
    /// whitespace are rejected.
    pub fn set_current_project_id(&self, id: &str) -> Result<(), ServiceError> {
        if id.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "Project ID cannot be empty".to_string(),
            ));
        }
        if id.trim() != id {
            return Err(ServiceError::InvalidArgument(format!(
                "Project ID has surrounding whitespace: {:?}",
                id
            )));
        }

        self.lock().current_project_id = Some(id.to_string());

        info!("Current project set to {}", id);
        Ok(())
    }

    pub fn is_auth_initialized(&self) -> bool {
        self.lock().auth_initialized
    }

    pub fn set_auth_initialized(&self, initialized: bool) {
        self.lock().auth_initialized = initialized;
    }
}

impl Default for ProjectState {
    fn default() -> Self {
        Self::new(None)
    }
}
