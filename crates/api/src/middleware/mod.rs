//! HTTP middleware and extractors for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (frontend origin)
//! 5. Session layer (OAuth handshake state only)
//!
//! Authentication is per-handler through the [`Principal`] extractor.

pub mod auth;
pub mod client_ip;
pub mod cors;
pub mod request_id;
pub mod session;

pub use auth::{Principal, principal_from_headers};
pub use client_ip::ClientIp;
pub use cors::cors_layer;
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
