//! Collaborators shared by every editing session

use std::sync::Arc;

use crate::channel::RealtimeChannel;
use crate::config::CollabConfig;
use crate::models::UserProfile;
use crate::store::DocumentStore;
use crate::Result;

/// Built once at startup and handed to each session
#[derive(Clone)]
pub struct AppContext {
    pub identity: UserProfile,
    pub store: Arc<dyn DocumentStore>,
    pub channel: Arc<dyn RealtimeChannel>,
    pub config: CollabConfig,
}

impl AppContext {
    /// Validates `config` before accepting it
    pub fn new(
        identity: UserProfile,
        store: Arc<dyn DocumentStore>,
        channel: Arc<dyn RealtimeChannel>,
        config: CollabConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            identity,
            store,
            channel,
            config,
        })
    }

    /// Same collaborators acting as another user, as when several clients
    /// share one process
    #[must_use]
    pub fn for_user(&self, identity: UserProfile) -> Self {
        Self {
            identity,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
