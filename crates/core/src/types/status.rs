//! Role and status enums for users and store memberships.
//!
//! Database enums use `SCREAMING_SNAKE_CASE` labels (`PENDING`, `OWNER`, ...)
//! and so does the JSON wire format.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// Signed up but has not set a password yet.
    #[default]
    Pending,
    /// Verified, or created through an OAuth provider.
    Active,
}

/// Global (cross-store) role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Platform operator.
    Admin,
    /// Regular account.
    #[default]
    User,
}

/// Role of a user within a single store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "member_role", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    /// Creator of the store. Exactly one per store.
    Owner,
    /// May change store settings and manage invitations.
    Manager,
    /// Day-to-day operator (sales, products).
    Staff,
}

impl MemberRole {
    /// Roles allowed to change store settings, invite links and invitations.
    pub const MANAGERS: &'static [Self] = &[Self::Owner, Self::Manager];

    /// Roles allowed to delete a store.
    pub const OWNERS: &'static [Self] = &[Self::Owner];
}

/// State of a membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "member_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberStatus {
    /// Invited, waiting for the invitee to respond.
    Pending,
    /// Accepted invitation or store creator.
    Active,
    /// Declined invitation.
    Inactive,
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owner => write!(f, "OWNER"),
            Self::Manager => write!(f, "MANAGER"),
            Self::Staff => write!(f, "STAFF"),
        }
    }
}

impl std::str::FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OWNER" => Ok(Self::Owner),
            "MANAGER" => Ok(Self::Manager),
            "STAFF" => Ok(Self::Staff),
            _ => Err(format!("invalid member role: {s}")),
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Active => write!(f, "ACTIVE"),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "ADMIN"),
            Self::User => write!(f, "USER"),
        }
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Inactive => write!(f, "INACTIVE"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_member_role_parse_is_case_insensitive() {
        assert_eq!("manager".parse::<MemberRole>().unwrap(), MemberRole::Manager);
        assert_eq!("OWNER".parse::<MemberRole>().unwrap(), MemberRole::Owner);
        assert!("cashier".parse::<MemberRole>().is_err());
    }

    #[test]
    fn test_wire_format_is_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&MemberStatus::Inactive).unwrap(),
            "\"INACTIVE\""
        );
        assert_eq!(serde_json::to_string(&UserRole::Admin).unwrap(), "\"ADMIN\"");
        let status: UserStatus = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(status, UserStatus::Active);
    }

    #[test]
    fn test_manager_roles() {
        assert!(MemberRole::MANAGERS.contains(&MemberRole::Owner));
        assert!(MemberRole::MANAGERS.contains(&MemberRole::Manager));
        assert!(!MemberRole::MANAGERS.contains(&MemberRole::Staff));
        assert_eq!(MemberRole::OWNERS, &[MemberRole::Owner]);
    }
}
