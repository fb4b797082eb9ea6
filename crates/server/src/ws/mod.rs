//! WebSocket support for the real-time chat core
//!
//! Provides the session and messaging hub:
//! - Connection lifecycle (authenticate, join, leave)
//! - Presence tracking (who is online, in registration order)
//! - Debounced typing indicators with automatic expiry
//! - Message broadcast with reply resolution and read receipts
//!
//! # Architecture
//!
//! - **Connection**: An authenticated WebSocket connection with its outbound queue
//! - **Presence**: Registration-ordered index of live connections
//! - **Typing**: Per-user debounced typing state with generation-tagged timers
//! - **State**: Hub state shared across all connections, owning fan-out
//! - **Handler**: Axum WebSocket route handler and inbound event routing
//! - **Events**: Type-safe event definitions for client/server communication

pub mod connection;
pub mod events;
pub mod handler;
pub mod presence;
pub mod state;
pub mod typing;

pub use connection::Connection;
pub use events::{ClientEvent, ClientRequest, ServerEvent};
pub use presence::PresenceRegistry;
pub use state::HubState;
pub use typing::{TypingExpired, TypingTracker};
