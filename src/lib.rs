//! Hemmer provider for ArangoDB.
//!
//! Manages databases, users and user permissions of an ArangoDB server
//! through its HTTP API. The engine spawns the provider binary and talks to it
//! over the `hemmer.provider.v1` gRPC protocol.
//!
//! # Resources
//!
//! | Type                       | Attributes                               | Import id            |
//! |----------------------------|------------------------------------------|----------------------|
//! | `arangodb_database`        | `name`                                   | `<name>`             |
//! | `arangodb_user`            | `user`, `password` (sensitive), `active` | `<user>`             |
//! | `arangodb_user_permission` | `user`, `database`, `permission`         | `<user>/<database>`  |
//!
//! # Provider configuration
//!
//! ```hcl
//! provider "arangodb" {
//!   endpoint = "http://localhost:8529"
//!   username = "root"
//!   password = "secret"
//!   tls      = false
//! }
//! ```
//!
//! `tls` defaults to `true`, and with TLS enabled server certificates are
//! **not verified**. See [`config`] for the environment variable fallbacks.
//!
//! # Handshake
//!
//! Once listening, the binary prints a single line to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arango;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use arango::{ArangoApi, ArangoClient, ArangoError, Grant};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default};
pub use provider::ArangoProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
