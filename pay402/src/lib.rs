//! Core traits, wire types, and payment flow for the x402 payment protocol.
//!
//! The x402 protocol lets an origin server demand a cryptographically
//! authorized token transfer in exchange for access to a protected resource,
//! over plain HTTP status 402. This crate is chain-agnostic: it defines the
//! wire format, the scheme extension points, and the three roles of the
//! exchange, while chain-specific crates (e.g. `pay402-evm`) provide the
//! actual payment mechanisms.
//!
//! # Architecture
//!
//! - [`proto`] — Wire format types for protocol versions 1 and 2
//! - [`scheme`] — Traits for client, server, and facilitator scheme implementations
//! - [`client`] — Client-side registration, policies, and payment creation
//! - [`server`] — Resource-server state machine (challenge / verify / settle)
//! - [`facilitator`] — Facilitator router with V1/V2 coexistence
//! - [`hooks`] — Before/after/failure lifecycle hooks for every stage
//! - [`encoding`] — Base64 header encoding
//! - [`config`] / [`error`] — Route policy and error types

pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod facilitator;
pub mod hooks;
pub mod proto;
pub mod scheme;
pub mod server;

pub use proto::{
    PaymentPayload, PaymentRequired, PaymentRequirements, ProtocolError, SettleResponse,
    SupportedKind, SupportedResponse, VerifyResponse,
};
