//! The opener side of the flow: build the authorization URL, launch the
//! popup, and wait for it to close.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::REDIRECT_URI_PATHNAME;
use crate::config::{AuthConfig, Location};
use crate::error::AuthFlowError;
use crate::popup::{PopupGeometry, WindowHandle, WindowSystem};

/// Popup size the login page requests.
pub const POPUP_WIDTH: i32 = 500;
pub const POPUP_HEIGHT: i32 = 500;
/// Fixed interval for the recurring popup-closed check.
pub const CLOSED_POLL_INTERVAL: Duration = Duration::from_millis(100);

const POPUP_TITLE: &str = "Authorization";

/// Why [`LoginFlow::wait_closed`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupOutcome {
    /// The recurring check observed the popup closed.
    Closed,
    /// The redirect side acknowledged completion before closure was
    /// observed; the timer served only as a watchdog.
    Completed,
}

/// Owns the popup lifecycle on the opener side.
///
/// Configuration and location are passed in at construction; nothing is
/// read from process-wide state, and the launcher hands its window handle
/// straight back to the caller.
pub struct LoginFlow<W: WindowSystem> {
    auth: AuthConfig,
    location: Location,
    windows: W,
    poll_interval: Duration,
}

impl<W: WindowSystem> LoginFlow<W> {
    pub fn new(auth: AuthConfig, location: Location, windows: W) -> Self {
        Self {
            auth,
            location,
            windows,
            poll_interval: CLOSED_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The authorization URL the popup navigates to.
    ///
    /// The redirect URI is origin + pathname prefix + the fixed redirect
    /// segment. It is never derived from the current pathname: app pages can
    /// live under arbitrary sub-paths (`/page-1/another-page`) that have
    /// nothing to do with the redirect endpoint, and deployments behind
    /// path-based routing prepend a prefix that a bare origin would skip.
    pub fn authorization_url(&self) -> String {
        format!(
            "{}/o/authorize/?response_type=token&client_id={}&redirect_uri={}{}{}",
            self.auth.plotly_domain,
            self.auth.oauth_client_id,
            self.location.origin,
            self.auth.requests_pathname_prefix,
            REDIRECT_URI_PATHNAME,
        )
    }

    /// Open the authorization popup centered on the opener's screen and try
    /// to focus it.
    ///
    /// A blocked popup is a terminal error: the flow never started and there
    /// is nothing to focus or poll.
    pub fn open_popup(&self) -> Result<W::Handle, AuthFlowError> {
        let geometry = PopupGeometry::centered(self.windows.screen(), POPUP_WIDTH, POPUP_HEIGHT);
        let url = self.authorization_url();
        tracing::info!(%url, "opening authorization popup");
        let handle = self.windows.open_popup(&url, POPUP_TITLE, geometry)?;
        handle.focus();
        Ok(handle)
    }

    /// Wait until the popup goes away.
    ///
    /// Runs the recurring closed check on a fixed interval, independent of
    /// any network activity in the popup, and stops it exactly once when
    /// closure is first observed. `completion` is the acknowledgement
    /// channel from the redirect side; when it fires first the wait ends
    /// immediately and the timer was only a watchdog. Either way the caller
    /// then reloads, i.e. re-evaluates authorization server-side — no other
    /// result is propagated back from the popup.
    pub async fn wait_closed(
        &self,
        handle: &W::Handle,
        completion: Option<oneshot::Receiver<()>>,
        cancel: &CancellationToken,
    ) -> Result<PopupOutcome, AuthFlowError> {
        let mut completion = completion;
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            if let Some(mut ack) = completion.take() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(AuthFlowError::Cancelled),
                    result = &mut ack => match result {
                        Ok(()) => {
                            tracing::debug!("redirect side acknowledged completion");
                            return Ok(PopupOutcome::Completed);
                        }
                        // Sender dropped without acknowledging; fall back to
                        // the timer alone.
                        Err(_) => {}
                    },
                    _ = interval.tick() => {
                        if handle.is_closed() {
                            tracing::debug!("popup observed closed");
                            return Ok(PopupOutcome::Closed);
                        }
                        completion = Some(ack);
                    }
                }
            } else {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(AuthFlowError::Cancelled),
                    _ = interval.tick() => {
                        if handle.is_closed() {
                            tracing::debug!("popup observed closed");
                            return Ok(PopupOutcome::Closed);
                        }
                    }
                }
            }
        }
    }
}
