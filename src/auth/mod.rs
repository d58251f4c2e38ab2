pub mod api;
pub mod login;
pub mod redirect;

pub use api::{ApiClient, CompletedRequest};
pub use login::{LoginFlow, PopupOutcome};
pub use redirect::{fragment_access_token, RedirectFlow, RedirectPhase, RequestState};

/// Fixed path segment of the OAuth redirect endpoint.
pub const REDIRECT_URI_PATHNAME: &str = "_oauth-redirect";
/// Session-exchange endpoint pathname.
pub const LOGIN_PATHNAME: &str = "_dash-login";
/// Authorization-check endpoint pathname.
pub const IS_AUTHORIZED_PATHNAME: &str = "_is-authorized";
/// Cookie the backend seeds for CSRF protection. Read, never written, here.
pub const CSRF_COOKIE_NAME: &str = "_csrf_token";
/// Cookie the backend sets as a side effect of a successful session
/// exchange. Never manipulated by this crate.
pub const OAUTH_COOKIE_NAME: &str = "plotly_oauth_token";
