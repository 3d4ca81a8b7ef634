#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::unused_async)]
#![allow(clippy::redundant_closure_for_method_calls)]

//! # autofish
//!
//! Unattended fishing client for a game server. Keeps one session connected,
//! recasts on every catch, falls back to a recast when nothing bites for a
//! while, and reconnects after disconnects and idle requests.
//!
//! ## Architecture
//!
//! ```text
//! main.rs            — entry point, CLI, tracing init, exit codes
//! config.rs          — TOML + env-var configuration
//! error.rs           — error taxonomy
//! control.rs         — stop / idle-request channel, OS signal wiring
//! events.rs          — typed inbound / outbound events
//! chat.rs            — sender + body extraction from chat payloads
//! transport/
//!   mod.rs           — Transport trait
//!   bridge.rs        — WebSocket link to a protocol bridge
//! resolve.rs         — direct host or realm lookup
//! auth.rs            — offline username or token-based credentials
//! gamedata.rs        — per-version splash sound id (table, cache, download)
//! session/
//!   state.rs         — SessionState
//!   policy.rs        — TimeoutPolicy, SessionPolicy
//!   handlers.rs      — pure event handlers
//!   mod.rs           — Session state machine + idle/timeout supervisor
//! offline.rs         — enforced offline window after an idle request
//! reconnect.rs       — outer reconnect loop
//! report.rs          — SessionReport accumulator + renderer
//! ```

pub mod auth;
pub mod chat;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod gamedata;
pub mod offline;
pub mod reconnect;
pub mod report;
pub mod resolve;
pub mod session;
pub mod transport;
