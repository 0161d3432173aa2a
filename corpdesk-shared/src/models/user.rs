/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     username VARCHAR(150) NOT NULL,          -- unique on LOWER(username)
///     email VARCHAR(255) NOT NULL DEFAULT '',
///     password_hash VARCHAR(255) NOT NULL,
///     first_name VARCHAR(150) NOT NULL DEFAULT '',
///     last_name VARCHAR(150) NOT NULL DEFAULT '',
///     role user_role NOT NULL DEFAULT 'employee',
///     level SMALLINT GENERATED ALWAYS AS (...) STORED,
///     phone_number VARCHAR(15),
///     address TEXT,
///     date_of_birth DATE,
///     employee_id VARCHAR(20) UNIQUE,
///     department VARCHAR(100),
///     hire_date DATE,
///     salary_cents BIGINT,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_active_employee BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// The `level` column exists only for filtering in SQL. Rust code always
/// derives the level from the role through [`User::level`].
///
/// # Example
///
/// ```no_run
/// use corpdesk_shared::models::role::Role;
/// use corpdesk_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     username: "jdoe".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role: Role::Customer,
///     ..Default::default()
/// }).await?;
///
/// let found = User::find_by_username(&pool, "JDOE").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::pagination::{contains_pattern, search_term, PageParams};
use super::role::{Level, Role};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, role, \
    phone_number, address, date_of_birth, employee_id, department, hire_date, salary_cents, \
    is_active, is_active_employee, created_at, updated_at, last_login_at";

/// User account
///
/// Not `Serialize`: responses go through [`UserView`], which drops the
/// password hash and applies the salary restriction.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Login name, unique ignoring case
    pub username: String,

    pub email: String,

    /// Argon2id PHC string
    pub password_hash: String,

    pub first_name: String,
    pub last_name: String,

    pub role: Role,

    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,

    /// Staff number, required for employee/administrator/accountant
    pub employee_id: Option<String>,

    /// Department name (matches `departments.name`)
    pub department: Option<String>,

    pub hire_date: Option<NaiveDate>,

    /// Monthly salary in cents. Only visible to the user and financial viewers.
    pub salary_cents: Option<i64>,

    /// Inactive accounts cannot authenticate
    pub is_active: bool,

    pub is_active_employee: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Default)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub employee_id: Option<String>,
    pub department: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub salary_cents: Option<i64>,
}

/// Input for updating an existing user
///
/// All fields are optional. Only non-None fields will be updated. Nullable
/// columns use `Some(None)` to clear.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub phone_number: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub employee_id: Option<Option<String>>,
    pub department: Option<Option<String>>,
    pub hire_date: Option<Option<NaiveDate>>,
    pub salary_cents: Option<Option<i64>>,
    pub is_active: Option<bool>,
    pub is_active_employee: Option<bool>,
}

impl UpdateUser {
    /// Whether the update touches anything beyond the caller's own profile
    /// (role, employment data, salary or activation)
    pub fn touches_restricted_fields(&self) -> bool {
        self.role.is_some()
            || self.employee_id.is_some()
            || self.department.is_some()
            || self.hire_date.is_some()
            || self.salary_cents.is_some()
            || self.is_active.is_some()
            || self.is_active_employee.is_some()
    }
}

/// Which users a list query may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserScope {
    /// Every user
    All,

    /// Only users strictly below the given level (higher level number)
    Below(Level),
}

/// Filters for listing and searching users
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    /// Case-insensitive match on username, names, email and employee id
    #[serde(alias = "q")]
    pub search: Option<String>,
    pub role: Option<Role>,
    /// Case-insensitive substring match
    pub department: Option<String>,
    pub is_active: Option<bool>,
}

/// Aggregate user statistics
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserStats {
    pub total_users: i64,
    pub active_users: i64,
    pub level_1_users: i64,
    pub level_2_users: i64,
    pub level_3_users: i64,
    /// Logins in the last 7 days
    pub recent_logins: i64,
}

/// Serialized form of a user
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub role: Role,
    pub role_display: &'static str,
    pub level: Level,
    pub level_display: &'static str,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub employee_id: Option<String>,
    pub department: Option<String>,
    pub hire_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_cents: Option<i64>,
    pub is_active: bool,
    pub is_active_employee: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Checks the employee id rule for a role
///
/// Returns false when the role requires an employee id and none (or a blank
/// one) is given.
pub fn employee_id_satisfied(role: Role, employee_id: Option<&str>) -> bool {
    !role.requires_employee_id() || employee_id.is_some_and(|id| !id.trim().is_empty())
}

impl User {
    /// Privilege level, derived from the role
    pub fn level(&self) -> Level {
        self.role.level()
    }

    /// "First Last", falling back to the username
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    /// Builds the response view
    ///
    /// `include_salary` must only be true when the viewer is this user or a
    /// financial viewer.
    pub fn view(&self, include_salary: bool) -> UserView {
        let level = self.level();
        UserView {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            full_name: self.full_name(),
            role: self.role,
            role_display: self.role.display_name(),
            level,
            level_display: level.label(),
            phone_number: self.phone_number.clone(),
            address: self.address.clone(),
            date_of_birth: self.date_of_birth,
            employee_id: self.employee_id.clone(),
            department: self.department.clone(),
            hire_date: self.hire_date,
            salary_cents: if include_salary { self.salary_cents } else { None },
            is_active: self.is_active,
            is_active_employee: self.is_active_employee,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login_at: self.last_login_at,
        }
    }

    /// Creates a new user in the database
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The username (ignoring case) or employee id already exists
    /// - Database connection fails
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (
                username, email, password_hash, first_name, last_name, role,
                phone_number, address, date_of_birth, employee_id, department,
                hire_date, salary_cents
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(data.username)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.role)
            .bind(data.phone_number)
            .bind(data.address)
            .bind(data.date_of_birth)
            .bind(data.employee_id)
            .bind(data.department)
            .bind(data.hire_date)
            .bind(data.salary_cents)
            .fetch_one(pool)
            .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by username, ignoring case
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)");

        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Updates an existing user
    ///
    /// Only non-None fields in `data` are written. `updated_at` is always
    /// refreshed.
    ///
    /// # Returns
    ///
    /// The updated user if found, None if the user doesn't exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");

        if let Some(email) = data.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(first_name) = data.first_name {
            qb.push(", first_name = ").push_bind(first_name);
        }
        if let Some(last_name) = data.last_name {
            qb.push(", last_name = ").push_bind(last_name);
        }
        if let Some(role) = data.role {
            qb.push(", role = ").push_bind(role);
        }
        if let Some(phone_number) = data.phone_number {
            qb.push(", phone_number = ").push_bind(phone_number);
        }
        if let Some(address) = data.address {
            qb.push(", address = ").push_bind(address);
        }
        if let Some(date_of_birth) = data.date_of_birth {
            qb.push(", date_of_birth = ").push_bind(date_of_birth);
        }
        if let Some(employee_id) = data.employee_id {
            qb.push(", employee_id = ").push_bind(employee_id);
        }
        if let Some(department) = data.department {
            qb.push(", department = ").push_bind(department);
        }
        if let Some(hire_date) = data.hire_date {
            qb.push(", hire_date = ").push_bind(hire_date);
        }
        if let Some(salary_cents) = data.salary_cents {
            qb.push(", salary_cents = ").push_bind(salary_cents);
        }
        if let Some(is_active) = data.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }
        if let Some(is_active_employee) = data.is_active_employee {
            qb.push(", is_active_employee = ").push_bind(is_active_employee);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(USER_COLUMNS);

        qb.build_query_as::<User>().fetch_optional(pool).await
    }

    /// Replaces the password hash
    pub async fn set_password_hash(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a user by ID
    ///
    /// Owned records (tasks, attendance, leave, expenses, payroll,
    /// notifications) cascade.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Updates the last login timestamp for a user
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter, scope: UserScope) {
        qb.push(" WHERE TRUE");

        if let UserScope::Below(level) = scope {
            qb.push(" AND level > ").push_bind(i16::from(level.as_u8()));
        }
        if let Some(search) = search_term(&filter.search) {
            let pattern = contains_pattern(search);
            qb.push(" AND (username ILIKE ").push_bind(pattern.clone());
            qb.push(" OR first_name ILIKE ").push_bind(pattern.clone());
            qb.push(" OR last_name ILIKE ").push_bind(pattern.clone());
            qb.push(" OR email ILIKE ").push_bind(pattern.clone());
            qb.push(" OR employee_id ILIKE ").push_bind(pattern);
            qb.push(")");
        }
        if let Some(role) = filter.role {
            qb.push(" AND role = ").push_bind(role);
        }
        if let Some(department) = search_term(&filter.department) {
            qb.push(" AND department ILIKE ")
                .push_bind(contains_pattern(department));
        }
        if let Some(is_active) = filter.is_active {
            qb.push(" AND is_active = ").push_bind(is_active);
        }
    }

    /// Lists users visible under `scope`, ordered by level then username
    ///
    /// # Returns
    ///
    /// The requested page and the total number of matching users
    pub async fn list(
        pool: &PgPool,
        filter: &UserFilter,
        scope: UserScope,
        page: &PageParams,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        Self::push_filters(&mut count, filter, scope);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(USER_COLUMNS).push(" FROM users");
        Self::push_filters(&mut qb, filter, scope);
        qb.push(" ORDER BY level, username LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let users = qb.build_query_as::<User>().fetch_all(pool).await?;

        Ok((users, total))
    }

    /// Counts total number of users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Counts users strictly below `level`, in total and active
    pub async fn count_below(pool: &PgPool, level: Level) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active)
            FROM users
            WHERE level > $1
            "#,
        )
        .bind(i16::from(level.as_u8()))
        .fetch_one(pool)
        .await
    }

    /// Computes user statistics for dashboards
    pub async fn stats(pool: &PgPool) -> Result<UserStats, sqlx::Error> {
        sqlx::query_as::<_, UserStats>(
            r#"
            SELECT
                COUNT(*) AS total_users,
                COUNT(*) FILTER (WHERE is_active) AS active_users,
                COUNT(*) FILTER (WHERE level = 1) AS level_1_users,
                COUNT(*) FILTER (WHERE level = 2) AS level_2_users,
                COUNT(*) FILTER (WHERE level = 3) AS level_3_users,
                (
                    SELECT COUNT(*) FROM login_history
                    WHERE login_time >= NOW() - INTERVAL '7 days'
                ) AS recent_logins
            FROM users
            "#,
        )
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            password_hash: "hash".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            role,
            phone_number: None,
            address: None,
            date_of_birth: None,
            employee_id: Some("EMP001".to_string()),
            department: Some("Engineering".to_string()),
            hire_date: None,
            salary_cents: Some(500_000),
            is_active: true,
            is_active_employee: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn test_level_follows_role() {
        for role in Role::ALL {
            assert_eq!(sample_user(role).level(), role.level());
        }
    }

    #[test]
    fn test_view_hides_salary_and_hash() {
        let user = sample_user(Role::Employee);

        let hidden = serde_json::to_value(user.view(false)).unwrap();
        assert!(hidden.get("salary_cents").is_none());
        assert!(hidden.get("password_hash").is_none());
        assert_eq!(hidden["level"], 3);
        assert_eq!(hidden["role"], "employee");

        let shown = serde_json::to_value(user.view(true)).unwrap();
        assert_eq!(shown["salary_cents"], 500_000);
    }

    #[test]
    fn test_full_name_fallback() {
        let mut user = sample_user(Role::Customer);
        assert_eq!(user.full_name(), "Jane Doe");

        user.first_name.clear();
        user.last_name.clear();
        assert_eq!(user.full_name(), "jdoe");
    }

    #[test]
    fn test_employee_id_rule() {
        assert!(!employee_id_satisfied(Role::Employee, None));
        assert!(!employee_id_satisfied(Role::Accountant, Some("  ")));
        assert!(employee_id_satisfied(Role::Administrator, Some("ADM1")));
        assert!(employee_id_satisfied(Role::Customer, None));
        assert!(employee_id_satisfied(Role::Superadmin, None));
    }

    #[test]
    fn test_update_user_restricted_fields() {
        let profile_only = UpdateUser {
            first_name: Some("Ann".to_string()),
            phone_number: Some(None),
            ..Default::default()
        };
        assert!(!profile_only.touches_restricted_fields());

        let role_change = UpdateUser {
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert!(role_change.touches_restricted_fields());

        assert!(!UpdateUser::default().touches_restricted_fields());
    }
}
