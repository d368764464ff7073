//! Types library for the leaderboard relay
//!
//! This library provides the core type definitions shared between the store
//! clients, the live synchronization core and the HTTP/WebSocket surface.
//!
//! # Modules
//! - `document`: Store documents and change-feed events
//! - `numeric`: JSON-preserving numeric values (balances, scores, prices)
//! - `leaderboard`: Client-facing views (team ranking, items, hangman scores)
//! - `errors`: Store error taxonomy

// Public modules
pub mod document;
pub mod numeric;
pub mod leaderboard;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::document::*;
    pub use crate::numeric::*;
    pub use crate::leaderboard::*;
    pub use crate::errors::*;
}
