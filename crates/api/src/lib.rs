//! Barestore API library.
//!
//! Authentication, refresh sessions and store memberships for the Barestore
//! point-of-sale backend. The binary in `main.rs` wires these modules into an
//! Axum server; the library form lets the integration tests drive the
//! services directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
