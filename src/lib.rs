//! OAuth implicit-grant login flow for Plotly-protected Dash apps.
//!
//! Guides a user through the one fixed flow such apps use: open a centered
//! popup at the authorization URL, exchange the access token returned in the
//! redirect fragment for a session cookie, confirm authorization, close the
//! popup, and let the opener reload. Not a general OAuth library — no token
//! refresh, scope negotiation, or PKCE.
//!
//! - [`auth::login`] builds the authorization URL and owns the popup
//!   lifecycle on the opener side.
//! - [`auth::redirect`] runs the handshake inside the popup: session
//!   exchange, then authorization check, strictly in that order.
//! - [`auth::api`] talks to the hosting app's `_dash-login` and
//!   `_is-authorized` endpoints with CSRF cookie handling.
//! - [`popup`] computes centered popup geometry and abstracts the platform
//!   window system.

pub mod auth;
pub mod config;
pub mod error;
pub mod popup;
