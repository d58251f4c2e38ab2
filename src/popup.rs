//! Popup geometry and the window-system seam.
//!
//! The geometry math is the classic centered-popup computation
//! (http://stackoverflow.com/questions/4068373/center-a-popup-window-on-screen).
//! Window operations go through the [`WindowSystem`] / [`WindowHandle`]
//! traits so flows receive an explicit handle from the launcher instead of
//! reaching for shared global state, and so tests can substitute a fake
//! platform.

use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use crate::error::AuthFlowError;

/// Metrics of the screen hosting the opener window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    pub inner_width: i32,
    pub inner_height: i32,
    /// Horizontal screen offset; nonzero on multi-monitor setups.
    pub screen_left: i32,
    /// Vertical screen offset.
    pub screen_top: i32,
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            inner_width: 1280,
            inner_height: 800,
            screen_left: 0,
            screen_top: 0,
        }
    }
}

/// Placement of a popup window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupGeometry {
    pub width: i32,
    pub height: i32,
    pub left: i32,
    pub top: i32,
}

impl PopupGeometry {
    /// Compute top-left coordinates that center a `width`×`height` popup on
    /// the given screen. The screen offsets fix dual-screen positioning.
    pub fn centered(screen: Screen, width: i32, height: i32) -> Self {
        let left = (screen.inner_width / 2 - width / 2) + screen.screen_left;
        let top = (screen.inner_height / 2 - height / 2) + screen.screen_top;
        Self {
            width,
            height,
            left,
            top,
        }
    }

    /// Feature string in the shape `window.open`-style launchers expect,
    /// scrollbars enabled.
    pub fn window_features(&self) -> String {
        format!(
            "scrollbars=yes,width={}, height={}, top={}, left={}",
            self.width, self.height, self.top, self.left
        )
    }
}

/// A native window opened by a [`WindowSystem`].
///
/// Object-safe so flows can hold `&dyn WindowHandle`.
pub trait WindowHandle: Send + Sync {
    /// Bring the window to the foreground. Best effort.
    fn focus(&self);
    /// Whether the window has been closed, by the user or via [`close`].
    ///
    /// [`close`]: WindowHandle::close
    fn is_closed(&self) -> bool;
    /// Close the window.
    fn close(&self);
}

/// Platform seam for opening popup windows.
pub trait WindowSystem {
    type Handle: WindowHandle;

    /// Metrics used to center popups.
    fn screen(&self) -> Screen;

    /// Open a popup at the given geometry and return its handle.
    ///
    /// A blocked popup is terminal for this call — no retry. The caller must
    /// treat the error as "flow did not start".
    fn open_popup(
        &self,
        url: &str,
        title: &str,
        geometry: PopupGeometry,
    ) -> Result<Self::Handle, AuthFlowError>;
}

/// Opens popups by spawning the platform browser opener.
pub struct ProcessWindowSystem {
    browser_command: Option<String>,
    screen: Screen,
}

impl ProcessWindowSystem {
    /// `browser_command` overrides the platform default opener
    /// (`xdg-open` / `open` / `explorer`).
    pub fn new(browser_command: Option<String>) -> Self {
        Self {
            browser_command,
            screen: Screen::default(),
        }
    }

    pub fn with_screen(mut self, screen: Screen) -> Self {
        self.screen = screen;
        self
    }

    fn opener(&self) -> &str {
        match self.browser_command.as_deref() {
            Some(command) => command,
            None if cfg!(target_os = "macos") => "open",
            None if cfg!(target_os = "windows") => "explorer",
            None => "xdg-open",
        }
    }
}

impl WindowSystem for ProcessWindowSystem {
    type Handle = ProcessWindowHandle;

    fn screen(&self) -> Screen {
        self.screen
    }

    fn open_popup(
        &self,
        url: &str,
        _title: &str,
        geometry: PopupGeometry,
    ) -> Result<Self::Handle, AuthFlowError> {
        tracing::debug!(features = %geometry.window_features(), "opening popup window");
        let child = Command::new(self.opener())
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AuthFlowError::PopupBlocked(e.to_string()))?;
        Ok(ProcessWindowHandle {
            child: Mutex::new(Some(child)),
        })
    }
}

/// Handle over a spawned opener process.
///
/// Closure is approximated by process exit; detaching openers such as
/// `xdg-open` exit as soon as the page is handed off, so the closed check is
/// best effort on platforms without real window control.
pub struct ProcessWindowHandle {
    child: Mutex<Option<Child>>,
}

impl WindowHandle for ProcessWindowHandle {
    fn focus(&self) {
        // The opener process has no window of its own to raise.
    }

    fn is_closed(&self) -> bool {
        let mut guard = self.child.lock().unwrap();
        match guard.as_mut() {
            None => true,
            Some(child) => matches!(child.try_wait(), Ok(Some(_))),
        }
    }

    fn close(&self) {
        let mut guard = self.child.lock().unwrap();
        if let Some(mut child) = guard.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
