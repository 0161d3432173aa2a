/// Dashboard and user statistics
///
/// `GET /v1/stats/dashboard` answers with a shape that depends on the
/// caller's level, tagged by `view`:
///
/// ```json
/// { "view": "staff", "my_tasks": 4, "pending_tasks": 2, ... }
/// ```

use crate::{
    app::AppState,
    error::ApiResult,
    routes::today,
};
use axum::{extract::State, Json};
use corpdesk_shared::{
    auth::middleware::AuthContext,
    models::{
        attendance::Attendance,
        expense::Expense,
        leave_request::LeaveRequest,
        payroll::Payroll,
        project::Project,
        role::Level,
        task::Task,
        user::{User, UserStats},
    },
};
use serde::Serialize;

/// Figures only financial viewers receive
#[derive(Debug, Clone, Serialize)]
pub struct FinancialSummary {
    pub unpaid_payroll: i64,
    pub approved_expenses_this_month_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Dashboard {
    Executive {
        users: UserStats,
        total_projects: i64,
        active_projects: i64,
        pending_leaves: i64,
        pending_expenses: i64,
        present_today: i64,
        financial: FinancialSummary,
    },
    Management {
        /// Level-3 users
        team_members: i64,
        active_team_members: i64,
        my_projects: i64,
        pending_tasks: i64,
        pending_leaves: i64,
        pending_expenses: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        financial: Option<FinancialSummary>,
    },
    Staff {
        my_tasks: i64,
        pending_tasks: i64,
        my_projects: i64,
        my_pending_leaves: i64,
        my_pending_expenses: i64,
    },
}

async fn financial_summary(state: &AppState) -> Result<FinancialSummary, sqlx::Error> {
    let (unpaid_payroll, approved_expenses_this_month_cents) = tokio::try_join!(
        Payroll::count_unpaid(&state.db),
        Expense::approved_total_for_month(&state.db, today()),
    )?;

    Ok(FinancialSummary {
        unpaid_payroll,
        approved_expenses_this_month_cents,
    })
}

/// Dashboard figures for the caller's level
pub async fn dashboard(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Dashboard>> {
    let db = &state.db;

    let dashboard = match auth.level() {
        Level::Executive => {
            let (users, (total_projects, active_projects), pending_leaves, pending_expenses, present_today) =
                tokio::try_join!(
                    User::stats(db),
                    Project::count_by_activity(db),
                    LeaveRequest::count_pending(db, None),
                    Expense::count_pending(db, None),
                    Attendance::count_present_on(db, today()),
                )?;

            Dashboard::Executive {
                users,
                total_projects,
                active_projects,
                pending_leaves,
                pending_expenses,
                present_today,
                financial: financial_summary(&state).await?,
            }
        }
        Level::Management => {
            let ((team_members, active_team_members), my_projects, pending_tasks, pending_leaves, pending_expenses) =
                tokio::try_join!(
                    User::count_below(db, Level::Management),
                    Project::count_managed_by(db, auth.user_id),
                    Task::count_pending_for_staff(db),
                    LeaveRequest::count_pending_for_staff(db),
                    Expense::count_pending(db, None),
                )?;

            let financial = if auth.can_view_financial_data() {
                Some(financial_summary(&state).await?)
            } else {
                None
            };

            Dashboard::Management {
                team_members,
                active_team_members,
                my_projects,
                pending_tasks,
                pending_leaves,
                pending_expenses,
                financial,
            }
        }
        Level::Staff => {
            let ((my_tasks, pending_tasks), my_projects, my_pending_leaves, my_pending_expenses) =
                tokio::try_join!(
                    Task::count_assigned(db, auth.user_id),
                    Project::count_with_member(db, auth.user_id),
                    LeaveRequest::count_pending(db, Some(auth.user_id)),
                    Expense::count_pending(db, Some(auth.user_id)),
                )?;

            Dashboard::Staff {
                my_tasks,
                pending_tasks,
                my_projects,
                my_pending_leaves,
                my_pending_expenses,
            }
        }
    };

    Ok(Json(dashboard))
}

/// User counts by level and activity, level 2 and above
pub async fn user_stats(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<UserStats>> {
    auth.require_level(Level::Management)?;

    Ok(Json(User::stats(&state.db).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_is_tagged_by_view() {
        let dashboard = Dashboard::Staff {
            my_tasks: 4,
            pending_tasks: 2,
            my_projects: 1,
            my_pending_leaves: 0,
            my_pending_expenses: 3,
        };
        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["view"], "staff");
        assert_eq!(json["my_tasks"], 4);
    }

    #[test]
    fn test_management_omits_financial_for_non_accountants() {
        let dashboard = Dashboard::Management {
            team_members: 10,
            active_team_members: 9,
            my_projects: 2,
            pending_tasks: 5,
            pending_leaves: 1,
            pending_expenses: 0,
            financial: None,
        };
        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["view"], "management");
        assert!(json.get("financial").is_none());
    }
}
