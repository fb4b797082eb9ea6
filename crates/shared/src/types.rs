//! Common types used across Parley
//!
//! These are the wire-level views shared by the WebSocket broadcast path and
//! the REST history endpoint, so both surfaces emit identical payloads.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Public view of a user (never carries credentials)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
}

/// Denormalized summary of the message a reply points at
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyView {
    pub id: Uuid,
    pub content: String,
    pub username: String,
    pub user_id: Uuid,
}

/// Fully resolved message as delivered to clients
///
/// `reply_to` is `None` when the message is not a reply, or when the reply
/// target could not be resolved (soft-fail - the stored `reply_to_id` is
/// retained so later history fetches can retry resolution).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub content: String,
    pub username: String,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub read_by: Vec<Uuid>,
    pub reply_to: Option<ReplyView>,
}
