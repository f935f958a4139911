//! Shared Application State
//!
//! Holds the immutable resources every room attachment shares: the loaded
//! configuration, the engine bindings, and the persona this worker serves.

use crate::{config::Config, session::SessionConfig};
use parley_core::persona::Persona;
use std::sync::Arc;

/// Created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session_config: SessionConfig,
    pub persona: Arc<Persona>,
}
