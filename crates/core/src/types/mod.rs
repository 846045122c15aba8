//! Core types for Barestore.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod provider;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use provider::OAuthProvider;
pub use status::*;
