//! Bearer-token authentication.
//!
//! # Responsibilities
//!
//! - Parse `Authorization: Bearer <token>` and hand the token to the identity
//!   provider with revocation checking on.
//! - Turn the provider's answer into exactly one [`AuthOutcome`].
//! - Expose the result to handlers as a typed [`VerifiedCaller`].
//!
//! # Module invariants
//!
//! - Raw tokens and provider error detail never reach the caller or the logs
//!   at info level or above.
//! - Nothing outside this module can construct a [`VerifiedCaller`].

pub mod extractor;
pub mod gate;
pub mod introspection;
pub mod verifier;

pub use gate::{AuthGate, VerifiedCaller};
pub use introspection::IntrospectionVerifier;
