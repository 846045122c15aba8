//! Domain models.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`]. Types that cross the HTTP boundary derive `Serialize`
//! with `camelCase` field names.

pub mod member;
pub mod session;
pub mod store;
pub mod user;
pub mod verification;

pub use member::{Member, StoreMember, StoreMembership};
pub use session::{NewSession, Session};
pub use store::{NewStore, Store, StoreUpdate};
pub use user::{NewUser, User, UserAccount};
pub use verification::VerificationToken;
