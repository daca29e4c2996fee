//! REST transport for the identity backend.
//!
//! Implements [`gateway_traits::BackendGateway`] over reqwest: routes each
//! operation to its backend endpoint, attaches the project API key, and
//! translates HTTP failures into the gateway error taxonomy. Hosts that
//! need a different transport (test doubles, proxies, offline emulators)
//! implement the trait themselves and skip this crate entirely.

pub mod rest;

pub use rest::{GatewayConfig, RestBackendGateway};
