//! The redirect leg of the flow, running inside the popup window.
//!
//! One pass per mount: extract the access token from the URL fragment,
//! exchange it for a session, then confirm authorization. Two independent
//! request states feed a derived display phase; on `Authorized` the popup
//! closes itself, which is the success signal the login side polls for.

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::api::{ApiClient, CompletedRequest};
use crate::error::AuthFlowError;
use crate::popup::WindowHandle;

/// State of one backend request, owned by the flow that issued it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestState {
    #[default]
    Unstarted,
    Loading,
    Completed { status: u16, body: Option<Value> },
}

/// Display phase, derived purely from the two request states.
#[derive(Debug, Clone, PartialEq)]
pub enum RedirectPhase {
    /// Session exchange not yet settled.
    Pending,
    /// Logged in; authorization check not yet conclusive.
    LoggedInPendingAuth,
    /// Authorization check returned 403. Not an error state.
    Denied,
    /// Authorization check returned 200. Terminal; the popup closes itself.
    Authorized,
    /// Session exchange settled with a non-200 status.
    LoginFailed { status: u16, body: Option<Value> },
}

impl RedirectPhase {
    pub fn derive(login: &RequestState, authorization: &RequestState) -> Self {
        match login {
            RequestState::Unstarted | RequestState::Loading => Self::Pending,
            RequestState::Completed { status: 200, .. } => match authorization {
                RequestState::Completed { status: 403, .. } => Self::Denied,
                RequestState::Completed { status: 200, .. } => Self::Authorized,
                _ => Self::LoggedInPendingAuth,
            },
            RequestState::Completed { status, body } => Self::LoginFailed {
                status: *status,
                body: body.clone(),
            },
        }
    }

    /// What the redirect page shows for this phase.
    pub fn describe(&self) -> String {
        match self {
            Self::Pending | Self::LoggedInPendingAuth => "Loading...".to_string(),
            Self::Denied => "You are not authorized to view this app".to_string(),
            Self::Authorized => "Authorized".to_string(),
            Self::LoginFailed { body, .. } => {
                let mut message = "Yikes! An error occurred trying to log in.".to_string();
                if let Some(body) = body {
                    message.push('\n');
                    message.push_str(&body.to_string());
                }
                message
            }
        }
    }
}

/// Extract the `access_token` parameter from a redirect URL fragment.
///
/// The authorization server appends the token after `#`, sometimes with a
/// leading `/` or `?` depending on the redirect shape.
pub fn fragment_access_token(url: &Url) -> Option<String> {
    let fragment = url.fragment()?;
    let fragment = fragment.trim_start_matches(['/', '?']);
    url::form_urlencoded::parse(fragment.as_bytes())
        .find(|(key, _)| key == "access_token")
        .map(|(_, value)| value.into_owned())
}

/// Drives the redirect handshake. Construct one per mount; `run` is a
/// single pass with no re-entry, so two mounts issue exactly two request
/// pairs and never share state.
pub struct RedirectFlow {
    api: ApiClient,
    login_request: RequestState,
    authorization_request: RequestState,
}

impl RedirectFlow {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            login_request: RequestState::Unstarted,
            authorization_request: RequestState::Unstarted,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Current display phase.
    pub fn phase(&self) -> RedirectPhase {
        RedirectPhase::derive(&self.login_request, &self.authorization_request)
    }

    /// Run the handshake against the redirect URL the popup landed on.
    ///
    /// The session exchange must settle before the authorization check is
    /// issued — strict ordering, not merely causal. A network-level exchange
    /// failure records a generic 500 with the error text as content and
    /// suppresses the check. `cancel` is tied to the view's lifetime: once
    /// it fires, no further state updates happen.
    pub async fn run(
        &mut self,
        redirect_url: &Url,
        window: &dyn WindowHandle,
        cancel: &CancellationToken,
    ) -> Result<RedirectPhase, AuthFlowError> {
        let access_token = fragment_access_token(redirect_url);
        if access_token.is_none() {
            tracing::warn!("no access_token in redirect fragment");
        }
        self.login_request = RequestState::Loading;

        let exchange = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AuthFlowError::Cancelled),
            result = self.api.exchange_session(access_token.as_deref()) => result,
        };

        match exchange {
            Ok(CompletedRequest { status, body }) => {
                tracing::debug!(status, "session exchange settled");
                self.login_request = RequestState::Completed { status, body };
                if status == 200 {
                    let check = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(AuthFlowError::Cancelled),
                        result = self.api.check_authorization() => result,
                    };
                    match check {
                        Ok(status) => {
                            tracing::debug!(status, "authorization check settled");
                            self.authorization_request =
                                RequestState::Completed { status, body: None };
                        }
                        Err(err) => {
                            // A failed check surfaces through the same error
                            // panel as a failed login.
                            tracing::warn!(error = %err, "authorization check failed");
                            self.login_request = RequestState::Completed {
                                status: 500,
                                body: Some(Value::String(err.to_string())),
                            };
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "session exchange failed at the network level");
                self.login_request = RequestState::Completed {
                    status: 500,
                    body: Some(Value::String(err.to_string())),
                };
            }
        }

        let phase = self.phase();
        if phase == RedirectPhase::Authorized {
            tracing::info!("authorized; closing popup");
            window.close();
        }
        Ok(phase)
    }
}
