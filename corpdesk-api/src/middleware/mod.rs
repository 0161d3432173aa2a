/// Tower middleware for the API server
///
/// - `security`: Security response headers
///
/// Authentication is an axum `from_fn` layer in [`crate::app`].

pub mod security;
