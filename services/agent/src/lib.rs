//! Parley Agent Worker Library
//!
//! This library contains all the logic for the voice-assistant worker:
//! configuration, logging, the room transport, the engine bindings, the
//! session loop, and routing. The `agent` binary is a thin wrapper.

pub mod audio;
pub mod config;
pub mod engines;
pub mod entrypoint;
pub mod handlers;
pub mod logging;
pub mod personas;
pub mod room;
pub mod router;
pub mod session;
pub mod state;
pub mod token;
