/// Navigation sections visible to a role
///
/// Returned by `GET /v1/auth/me` as a UI hint. The server never trusts it:
/// every endpoint re-checks permissions.

use serde::Serialize;

use super::authorization::{can_manage_users, can_view_financial_data, has_permission};
use crate::models::role::{Level, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavSection {
    pub key: &'static str,
    pub label: &'static str,
    pub path: &'static str,
}

const fn section(key: &'static str, label: &'static str, path: &'static str) -> NavSection {
    NavSection { key, label, path }
}

const DASHBOARD: NavSection = section("dashboard", "Dashboard", "/dashboard");
const PROJECTS: NavSection = section("projects", "Projects", "/projects");
const TASKS: NavSection = section("tasks", "Tasks", "/tasks");
const ATTENDANCE: NavSection = section("attendance", "Attendance", "/attendance");
const LEAVE: NavSection = section("leave", "Leave Requests", "/leave-requests");
const EXPENSES: NavSection = section("expenses", "Expenses", "/expenses");
const MY_PAYSLIPS: NavSection = section("my_payslips", "My Payslips", "/payroll/my");
const USERS: NavSection = section("users", "Users", "/users");
const DEPARTMENTS: NavSection = section("departments", "Departments", "/departments");
const APPROVALS: NavSection = section("approvals", "Approvals", "/approvals");
const PAYROLL: NavSection = section("payroll", "Payroll", "/payroll");
const REPORTS: NavSection = section("reports", "Reports", "/stats");
const NOTIFICATIONS: NavSection = section("notifications", "Notifications", "/notifications");

/// Sections for `role`, in menu order
pub fn sections_for(role: Role) -> Vec<NavSection> {
    let level = role.level();
    let mut sections = vec![DASHBOARD, PROJECTS, TASKS, ATTENDANCE, LEAVE, EXPENSES];

    if role != Role::Customer {
        sections.push(MY_PAYSLIPS);
    }
    if can_manage_users(level) {
        sections.extend([USERS, DEPARTMENTS, APPROVALS]);
    }
    if can_view_financial_data(role) {
        sections.push(PAYROLL);
    }
    if has_permission(level, Level::Management) {
        sections.push(REPORTS);
    }
    sections.push(NOTIFICATIONS);

    sections
}
