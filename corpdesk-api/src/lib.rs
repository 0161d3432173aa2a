//! # Corpdesk API Server Library
//!
//! REST/JSON API for users, projects, tasks, attendance, leave, expenses,
//! payroll and notifications, guarded by a three-level role hierarchy.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from environment variables
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
