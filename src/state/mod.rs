pub mod assign;
pub mod content;
pub mod game;
pub mod rules;
pub mod state_machine;
pub mod timer;

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{repository::SessionRepository, session_store::SessionStore},
    state::game::{SeatIndex, SessionCode},
};

pub use self::state_machine::{Plan, PlanError};

pub type SharedState = Arc<AppState>;

/// Device currently attached through an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedDevice {
    pub code: SessionCode,
    pub seat: Option<SeatIndex>,
    pub host: bool,
}

/// Central application state: the session store, runtime configuration and attached devices.
pub struct AppState {
    repository: SessionRepository,
    config: Arc<AppConfig>,
    devices: DashMap<Uuid, ConnectedDevice>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(store: Arc<dyn SessionStore>, config: AppConfig) -> SharedState {
        Arc::new(Self {
            repository: SessionRepository::new(store),
            config: Arc::new(config),
            devices: DashMap::new(),
        })
    }

    /// Typed access to sessions and seats.
    pub fn repository(&self) -> &SessionRepository {
        &self.repository
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    /// Registry of devices attached through an event stream, keyed by connection id.
    pub fn devices(&self) -> &DashMap<Uuid, ConnectedDevice> {
        &self.devices
    }
}
