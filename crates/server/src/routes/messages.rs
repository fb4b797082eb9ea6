//! Message history route
//!
//! Out-of-band REST access to recent messages, for clients not yet connected
//! to the live channel. Same payload shape as the WebSocket `getMessages`
//! response.

use axum::{extract::State, Json};

use parley_shared::MessageView;

use crate::{auth::AuthUser, error::ApiResult, messages, state::AppState};

/// Fetch recent messages in chronological order
pub async fn get_messages(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<MessageView>>> {
    tracing::debug!(user_id = %user.user_id, "Fetching message history over REST");
    let messages = messages::list_recent(&state.pool, state.config.message_history_limit).await?;
    Ok(Json(messages))
}
