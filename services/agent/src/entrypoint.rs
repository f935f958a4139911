//! Per-connection entry: wires one room into one session and drives it.

use crate::{
    room::Room,
    session::{GREETING_INSTRUCTIONS, RoomInputOptions, Session, SessionError},
    state::AppState,
};
use std::sync::Arc;
use tracing::{Instrument, error, info, warn};

/// Runs one full session lifecycle against a freshly attached room.
///
/// Every error class is caught at this boundary: a failed session ends the
/// conversation, never the worker process. Teardown only emits a diagnostic
/// warning about the vendor transports; no explicit release is attempted.
pub async fn run_session(state: Arc<AppState>, room: Room) {
    let mut session = Session::new(state.session_config.clone(), state.persona.clone());
    let session_id = session.id();
    let span = tracing::info_span!("session", %session_id, persona = state.persona.name());

    async move {
        match drive(&state, &mut session, room).await {
            Ok(()) => info!("session finished"),
            Err(e) => {
                match &e {
                    SessionError::Room(_) => {
                        error!(error = %e, "session failed: room connection error");
                    }
                    SessionError::Engine(_) => {
                        error!(error = %e, "session failed: vendor stream error");
                    }
                    SessionError::Model(_) => {
                        error!(error = %e, "session failed: language model error");
                    }
                    _ => error!(error = %e, "session failed"),
                }
                eprintln!("session {session_id} terminated: {e}");
            }
        }
        // TODO: confirm whether the vendor SDK clients release their
        // connections on drop; until then this teardown is best effort.
        warn!("vendor transport clients may still hold open connections at teardown");
    }
    .instrument(span)
    .await
}

async fn drive(
    state: &Arc<AppState>,
    session: &mut Session,
    room: Room,
) -> Result<(), SessionError> {
    session.start(room, RoomInputOptions::default()).await?;
    session
        .connect(state.config.room_api_secret.as_deref())
        .await?;

    // Exactly one of the two greeting paths fires: personas that greet on
    // enter handle it inside the run loop.
    if !state.persona.greets_on_enter() {
        session.generate_reply(GREETING_INSTRUCTIONS).await?;
    }

    session.run().await
}
