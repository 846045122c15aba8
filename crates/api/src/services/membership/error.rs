//! Membership and tenancy error types.

use axum::http::StatusCode;
use thiserror::Error;

use crate::db::RepositoryError;

/// Errors from store membership checks and tenancy operations.
#[derive(Debug, Error)]
pub enum MembershipError {
    /// Caller has no active membership in the addressed store.
    #[error("you do not have access to this store")]
    NotAMember,

    /// Caller is a member, but their role is not allowed here.
    #[error("insufficient permissions")]
    InsufficientPermissions,

    #[error("user not found")]
    UserNotFound,

    /// Target user already has a member row (any status) in the store.
    #[error("user is already a member of this store")]
    UserAlreadyMember,

    #[error("store not found")]
    StoreNotFound,

    #[error("invitation not found")]
    InvitationNotFound,

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] barestore_core::EmailError),

    /// Invitations cannot hand out the owner role.
    #[error("the OWNER role cannot be assigned by invitation")]
    OwnerRoleNotAssignable,

    #[error("store name must not be empty")]
    InvalidStoreName,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl MembershipError {
    /// Stable machine-readable code for clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotAMember => "FORBIDDEN_RESOURCE",
            Self::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::UserAlreadyMember => "USER_ALREADY_MEMBER",
            Self::StoreNotFound => "STORE_NOT_FOUND",
            Self::InvitationNotFound => "INVITATION_NOT_FOUND",
            Self::InvalidEmail(_) | Self::OwnerRoleNotAssignable | Self::InvalidStoreName => {
                "VALIDATION_ERROR"
            }
            Self::Repository(_) => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotAMember | Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::UserNotFound | Self::StoreNotFound | Self::InvitationNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::UserAlreadyMember => StatusCode::CONFLICT,
            Self::InvalidEmail(_) | Self::OwnerRoleNotAssignable | Self::InvalidStoreName => {
                StatusCode::BAD_REQUEST
            }
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
