//! Authentication for the RPC gateway.
//!
//! Bearer tokens are verified against keys published by the identity
//! provider's JWKS endpoint.
//!
//! # Components
//!
//! - `jwks` - Fetches and caches the published key set
//! - `keys` - Converts JWKs into verification keys
//! - `claims` - Claim extraction and the authenticated principal
//! - `authenticator` - Verifies a token and builds a principal
//! - `guard` - Per-request guard used by the HTTP and gRPC adapters

pub mod authenticator;
pub mod claims;
pub mod guard;
pub mod jwks;
pub mod keys;

pub use authenticator::{AuthFailure, TokenAuthenticator};
pub use claims::Principal;
pub use guard::{current_principal, GuardError, RequestGuard};
pub use jwks::{KeySetError, KeySetProvider, KeySetProviderOptions, KeySetSource};
pub use keys::{KeySet, VerificationKey};
