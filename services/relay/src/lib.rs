//! Leaderboard Relay
//!
//! Watches remote document stores and serves leaderboards:
//! - Mirrors the team balance collection through its change feed
//! - Ranks the mirror and pushes every new ranking over WebSocket
//! - Answers item and hangman score snapshots from fresh store queries
//!
//! # Architecture
//!
//! ```text
//!  Primary store            Hangman store
//!   │        │                    │
//!   │ feed   │ query_all          │ query_all
//!   │        │                    │
//! ┌─▼─────┐  │                    │
//! │Mirror │  │                    │
//! └─┬─────┘  │                    │
//! ┌─▼─────┐  │                    │
//! │Ranking│  │                    │
//! └─┬─────┘  └──────┬─────────────┘
//! ┌─▼──────────┐ ┌──▼──────────┐
//! │Broadcaster │ │QueryService │
//! └─┬──────────┘ └──┬──────────┘
//!   │  WebSocket    │  HTTP
//! ```

pub mod app;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod mirror;
pub mod query;
pub mod ranking;
pub mod router;
pub mod state;
pub mod store;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
