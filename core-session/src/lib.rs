//! Client-side session management for a hosted identity backend.
//!
//! The core owns the full credential lifecycle: establishing a session by
//! email/password, anonymously, by OAuth assertion, custom token or phone
//! SMS; keeping it alive by refresh token exchange; mutating the account
//! behind it; and attaching or detaching additional sign-in providers. It
//! performs no I/O itself. Every network exchange goes through the
//! [`BackendGateway`] trait from `gateway-traits`, which keeps the core
//! testable against scripted gateways and lets hosts swap transports.
//!
//! Three orchestrators partition the surface:
//!
//! * [`SessionLifecycleManager`]: sign-up, every sign-in variant, refresh,
//!   password/profile mutation, lookup, deletion.
//! * [`ProviderLinkCoordinator`]: linking, unlinking, provider discovery.
//! * [`PhoneVerificationFlow`]: the two-step SMS code exchange.
//!
//! All of them publish [`SessionEvent`]s on a shared [`EventBus`] so hosts
//! can observe session transitions without polling. Sessions themselves are
//! plain [`SessionState`] values: immutable snapshots replaced wholesale by
//! each operation, never mutated behind the caller's back.

pub mod error;
pub mod events;
pub mod lifecycle;
pub mod linking;
pub mod phone;
pub mod types;

mod wire;

pub use error::{AuthError, RejectionCode, Result};
pub use events::{EventBus, SessionEvent, DEFAULT_EVENT_BUFFER_SIZE};
pub use lifecycle::SessionLifecycleManager;
pub use linking::ProviderLinkCoordinator;
pub use phone::PhoneVerificationFlow;
pub use types::{
    AuthKind, LinkedProviderSet, OAuthProvider, SessionState, UserRecord, VerificationSession,
};

pub use gateway_traits::BackendGateway;
