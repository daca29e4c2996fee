//! # Backend Gateway Traits
//!
//! Abstract RPC boundary between the identity session core and the remote
//! identity backend.
//!
//! ## Overview
//!
//! This crate defines the contract a transport implementation must fulfil:
//! a single [`BackendGateway::invoke`](gateway::BackendGateway::invoke)
//! operation covering every remote call the core issues (sign-in variants,
//! link/unlink, refresh, password reset, profile update, verification
//! send/confirm, user fetch, delete). All HTTP, TLS and wire-body concerns
//! live behind this boundary; the core only sees opaque JSON payloads and a
//! three-way error outcome (transport failure, explicit backend rejection,
//! cancellation).
//!
//! ## Contract
//!
//! - Exactly one network exchange per `invoke` call. No retry, batching or
//!   queueing inside an implementation; re-issuing a call is a caller
//!   decision, since the gateway cannot know whether an operation such as
//!   account creation is safe to repeat.
//! - Cancellation is cooperative: implementations must observe the
//!   [`CancellationToken`](tokio_util::sync::CancellationToken) and resolve
//!   to [`GatewayError::Cancelled`](error::GatewayError::Cancelled) without
//!   producing a partial success payload.
//! - Backend rejections carry the backend's stable error code string
//!   unmodified so the core can classify them.
//!
//! ## Thread Safety
//!
//! [`BackendGateway`](gateway::BackendGateway) requires `Send + Sync`;
//! implementations are shared across async tasks behind an `Arc`.

pub mod error;
pub mod gateway;

pub use error::{GatewayError, Result};
pub use gateway::{BackendGateway, Operation};
