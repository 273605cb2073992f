//! # Gateway Test Utilities
//!
//! Shared test utilities for the RPC gateway.
//!
//! This crate provides:
//! - Deterministic Ed25519 signing keys and JWK rendering (`crypto_fixtures`)
//! - Claim builders for test tokens (`token_builders`)
//! - A wiremock-backed JWKS endpoint (`jwks_server`)
//! - Server test harness (`TestGatewayServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let keypair = TestKeypair::new(1, "1");
//!     let jwks = MockJwksServer::start(&[&keypair]).await;
//!     let server = TestGatewayServer::spawn(&jwks.url()).await?;
//!
//!     let token = keypair.sign_token(&TestTokenBuilder::new().build());
//!     let response = reqwest::Client::new()
//!         .post(format!("{}/api.v1.GreetService/Greet", server.url()))
//!         .bearer_auth(token)
//!         .json(&serde_json::json!({"greet": {"id": "1", "name": "Ada"}}))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use server_harness::*;
pub use token_builders::*;
