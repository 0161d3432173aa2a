/// Roles and privilege levels
///
/// Every user has exactly one [`Role`]. The privilege [`Level`] is never stored
/// independently: it is derived from the role by [`Role::level`], and the
/// `users.level` column is a generated column that mirrors the same table.
///
/// # Levels
///
/// | Level | Roles |
/// |---|---|
/// | 1 (Executive) | superadmin |
/// | 2 (Management) | admin, administrator, accountant |
/// | 3 (Staff) | employee, customer |
///
/// A lower number dominates a higher one, so `Level::Executive < Level::Staff`.
///
/// # Example
///
/// ```
/// use corpdesk_shared::models::role::{Level, Role};
///
/// assert_eq!(Role::Accountant.level(), Level::Management);
/// assert!(Role::Superadmin.level() < Role::Employee.level());
/// ```

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Closed set of user roles
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full control over the system
    Superadmin,

    /// Administrative staff
    Admin,

    /// Office administrator
    Administrator,

    /// Finance staff, the only level-2 role with financial access
    Accountant,

    /// Regular employee
    #[default]
    Employee,

    /// External customer, usually the client of a project
    Customer,
}

impl Role {
    /// All roles, ordered from most to least privileged
    pub const ALL: [Role; 6] = [
        Role::Superadmin,
        Role::Admin,
        Role::Administrator,
        Role::Accountant,
        Role::Employee,
        Role::Customer,
    ];

    /// Converts role to its wire/database name
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::Administrator => "administrator",
            Role::Accountant => "accountant",
            Role::Employee => "employee",
            Role::Customer => "customer",
        }
    }

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Superadmin => "Super Admin",
            Role::Admin => "Admin",
            Role::Administrator => "Administrator",
            Role::Accountant => "Accountant",
            Role::Employee => "Employee",
            Role::Customer => "Customer",
        }
    }

    /// The single role to level table.
    ///
    /// Keep in sync with the `users.level` generated column.
    pub fn level(&self) -> Level {
        match self {
            Role::Superadmin => Level::Executive,
            Role::Admin | Role::Administrator | Role::Accountant => Level::Management,
            Role::Employee | Role::Customer => Level::Staff,
        }
    }

    /// Whether accounts with this role must carry an `employee_id`
    pub fn requires_employee_id(&self) -> bool {
        matches!(
            self,
            Role::Employee | Role::Administrator | Role::Accountant
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Privilege level derived from a role
///
/// Serialized as its number (1, 2 or 3). Levels are never accepted as input,
/// so there is no `Deserialize` impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Level 1
    Executive = 1,

    /// Level 2
    Management = 2,

    /// Level 3
    Staff = 3,
}

impl Level {
    /// Numeric value (1-3)
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Label used by the frontend
    pub fn label(&self) -> &'static str {
        match self {
            Level::Executive => "Level 1 - Executive",
            Level::Management => "Level 2 - Management",
            Level::Staff => "Level 3 - Staff",
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_level_table() {
        assert_eq!(Role::Superadmin.level(), Level::Executive);
        assert_eq!(Role::Admin.level(), Level::Management);
        assert_eq!(Role::Administrator.level(), Level::Management);
        assert_eq!(Role::Accountant.level(), Level::Management);
        assert_eq!(Role::Employee.level(), Level::Staff);
        assert_eq!(Role::Customer.level(), Level::Staff);
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Executive < Level::Management);
        assert!(Level::Management < Level::Staff);
        assert_eq!(Level::Staff.as_u8(), 3);
    }

    #[test]
    fn test_level_serializes_as_number() {
        let json = serde_json::to_string(&Level::Management).unwrap();
        assert_eq!(json, "2");
    }

    #[test]
    fn test_role_serde_names_match_as_str() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }

    #[test]
    fn test_requires_employee_id() {
        assert!(Role::Employee.requires_employee_id());
        assert!(Role::Administrator.requires_employee_id());
        assert!(Role::Accountant.requires_employee_id());
        assert!(!Role::Superadmin.requires_employee_id());
        assert!(!Role::Admin.requires_employee_id());
        assert!(!Role::Customer.requires_employee_id());
    }
}
