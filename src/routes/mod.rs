//! Router Module Index
//!
//! Organizes the routing into access-segregated modules. Access control is
//! applied per module with Axum layers, so an endpoint cannot end up exposed
//! by forgetting a check inside a handler.

/// Routes open to anonymous clients: health, account entry points, public profiles.
pub mod public;

/// Routes behind the `AuthUser` extractor middleware. Handlers add their own
/// role and ownership checks on top.
pub mod authenticated;

/// Routes restricted to the 'admin' role by the `require_admin` route layer.
pub mod admin;
