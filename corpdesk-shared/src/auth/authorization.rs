/// Permission evaluator
///
/// All access decisions reduce to the caller's [`Level`] (derived from the
/// role) plus two role-specific rules:
///
/// 1. **Level check**: `has_permission(level, required)` holds when
///    `level <= required`. Level 1 dominates 2, which dominates 3.
/// 2. **User management**: levels 1 and 2 manage users. A non-executive may
///    only manage users of strictly lower privilege.
/// 3. **Financial data**: only superadmins and accountants see salaries and
///    payroll, independent of level.
///
/// The functions here are pure. Handlers reach them through
/// [`AuthContext`](super::middleware::AuthContext).
///
/// # Example
///
/// ```
/// use corpdesk_shared::auth::authorization::{has_permission, Capabilities};
/// use corpdesk_shared::models::role::{Level, Role};
///
/// assert!(has_permission(Level::Executive, Level::Management));
/// assert!(!has_permission(Level::Staff, Level::Management));
///
/// let caps = Capabilities::for_role(Role::Accountant);
/// assert!(caps.can_view_financial_data);
/// ```

use serde::Serialize;
use uuid::Uuid;

use crate::models::role::{Level, Role};

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Caller's level is below what the action needs
    #[error("Insufficient permissions: requires level {required} or higher, has level {actual}")]
    InsufficientLevel { required: Level, actual: Level },

    /// Salary and payroll data need a financial role
    #[error("Access to financial data requires the superadmin or accountant role")]
    FinancialAccessRequired,

    /// Caller may not act on this record
    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

/// `true` when `level` is at least as privileged as `required`
pub fn has_permission(level: Level, required: Level) -> bool {
    level <= required
}

/// Levels 1 and 2 manage users
pub fn can_manage_users(level: Level) -> bool {
    has_permission(level, Level::Management)
}

/// Superadmins and accountants see salaries and payroll
pub fn can_view_financial_data(role: Role) -> bool {
    matches!(role, Role::Superadmin | Role::Accountant)
}

/// Whether an actor may create, edit or delete a user holding `target_role`
///
/// Executives manage anyone. Managers only manage strictly less privileged
/// users. Staff manage nobody.
pub fn can_manage_target(actor: Level, target_role: Role) -> bool {
    match actor {
        Level::Executive => true,
        Level::Management => target_role.level() > actor,
        Level::Staff => false,
    }
}

/// Requires `level <= required`
pub fn require_level(level: Level, required: Level) -> Result<(), AuthzError> {
    if !has_permission(level, required) {
        return Err(AuthzError::InsufficientLevel {
            required,
            actual: level,
        });
    }
    Ok(())
}

/// Requires a level that may manage user accounts
pub fn require_user_management(level: Level) -> Result<(), AuthzError> {
    require_level(level, Level::Management)
}

pub fn require_financial_access(role: Role) -> Result<(), AuthzError> {
    if !can_view_financial_data(role) {
        return Err(AuthzError::FinancialAccessRequired);
    }
    Ok(())
}

/// Passes for the record's owner, or for anyone at `required` or above
pub fn require_owner_or_level(
    user_id: Uuid,
    level: Level,
    owner_id: Uuid,
    required: Level,
) -> Result<(), AuthzError> {
    if user_id == owner_id || has_permission(level, required) {
        return Ok(());
    }
    Err(AuthzError::NotAuthorized)
}

/// Which records of a collection a caller may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Every record (level 1 and 2)
    All,
    /// Only records owned by, assigned to or shared with this user (level 3)
    Own(Uuid),
}

impl Visibility {
    pub fn for_user(user_id: Uuid, level: Level) -> Self {
        if has_permission(level, Level::Management) {
            Visibility::All
        } else {
            Visibility::Own(user_id)
        }
    }

    /// The owner restriction to pass to model queries
    pub fn owner(&self) -> Option<Uuid> {
        match self {
            Visibility::All => None,
            Visibility::Own(id) => Some(*id),
        }
    }
}

/// Evaluator results sent to clients so they can adapt their UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub level: Level,
    pub can_manage_users: bool,
    pub can_view_financial_data: bool,
    pub can_approve_requests: bool,
    pub can_manage_projects: bool,
}

impl Capabilities {
    pub fn for_role(role: Role) -> Self {
        let level = role.level();

        Self {
            level,
            can_manage_users: can_manage_users(level),
            can_view_financial_data: can_view_financial_data(role),
            can_approve_requests: has_permission(level, Level::Management),
            can_manage_projects: has_permission(level, Level::Management),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVELS: [Level; 3] = [Level::Executive, Level::Management, Level::Staff];

    #[test]
    fn test_has_permission_matches_level_order() {
        for level in LEVELS {
            for required in LEVELS {
                assert_eq!(
                    has_permission(level, required),
                    level.as_u8() <= required.as_u8(),
                    "level {level} vs required {required}"
                );
            }
        }
    }

    #[test]
    fn test_can_manage_users() {
        assert!(can_manage_users(Level::Executive));
        assert!(can_manage_users(Level::Management));
        assert!(!can_manage_users(Level::Staff));
    }

    #[test]
    fn test_financial_roles() {
        for role in Role::ALL {
            let expected = matches!(role, Role::Superadmin | Role::Accountant);
            assert_eq!(can_view_financial_data(role), expected, "{role}");
        }
        assert!(can_view_financial_data(Role::Accountant));
        assert!(!can_view_financial_data(Role::Admin));
    }

    #[test]
    fn test_can_manage_target() {
        assert!(can_manage_target(Level::Executive, Role::Superadmin));
        assert!(can_manage_target(Level::Management, Role::Employee));
        assert!(can_manage_target(Level::Management, Role::Customer));
        assert!(!can_manage_target(Level::Management, Role::Accountant));
        assert!(!can_manage_target(Level::Management, Role::Superadmin));
        assert!(!can_manage_target(Level::Staff, Role::Customer));
    }

    #[test]
    fn test_require_level() {
        assert!(require_level(Level::Management, Level::Management).is_ok());
        assert_eq!(
            require_level(Level::Staff, Level::Management),
            Err(AuthzError::InsufficientLevel {
                required: Level::Management,
                actual: Level::Staff,
            })
        );
    }

    #[test]
    fn test_require_owner_or_level() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(require_owner_or_level(me, Level::Staff, me, Level::Management).is_ok());
        assert!(require_owner_or_level(me, Level::Management, other, Level::Management).is_ok());
        assert_eq!(
            require_owner_or_level(me, Level::Staff, other, Level::Management),
            Err(AuthzError::NotAuthorized)
        );
    }

    #[test]
    fn test_visibility() {
        let id = Uuid::new_v4();

        assert_eq!(Visibility::for_user(id, Level::Executive).owner(), None);
        assert_eq!(Visibility::for_user(id, Level::Management).owner(), None);
        assert_eq!(Visibility::for_user(id, Level::Staff).owner(), Some(id));
    }

    #[test]
    fn test_capabilities() {
        let caps = Capabilities::for_role(Role::Admin);
        assert!(caps.can_manage_users);
        assert!(!caps.can_view_financial_data);
        assert!(caps.can_approve_requests);

        let caps = Capabilities::for_role(Role::Employee);
        assert_eq!(caps.level, Level::Staff);
        assert!(!caps.can_manage_users);
        assert!(!caps.can_manage_projects);

        let json = serde_json::to_value(Capabilities::for_role(Role::Superadmin)).unwrap();
        assert_eq!(json["level"], 1);
        assert_eq!(json["can_view_financial_data"], true);
    }
}
