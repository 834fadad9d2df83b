//! Reference x402 facilitator HTTP server.
//!
//! Serves the facilitator API (`/supported`, `/verify`, `/settle`) over the
//! EVM exact scheme, with per-chain signer and RPC configuration loaded from
//! a TOML file.
//!
//! # Modules
//!
//! - [`handlers`] — Axum route handlers and router builder
//! - [`error`] — Facilitator service error types
//! - [`config`] — Server configuration with environment variable expansion

pub mod config;
pub mod error;
pub mod handlers;

pub use handlers::{FacilitatorState, facilitator_router};
