//! Contains logic for reading user activity state from different
//! environments. [GenericSystemMonitor] is the main artifact of this module
//! that abstracts the operations.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use anyhow::Result;

/// Intended to serve as a contract windows and linux systems must implement.
#[cfg_attr(test, mockall::automock)]
pub trait SystemMonitor: Send + 'static {
    /// Retrieve amount of time the user has been inactive in milliseconds.
    fn get_idle_time(&mut self) -> Result<u32>;

    /// Whether the session is currently locked or blanked by a screensaver.
    fn is_session_locked(&mut self) -> Result<bool>;
}

/// Serves as a cross-compatible SystemMonitor implementation.
pub struct GenericSystemMonitor {
    inner: Box<dyn SystemMonitor>,
}

impl GenericSystemMonitor {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsSystemMonitor;
                Ok(Self {
                    inner: Box::new(WindowsSystemMonitor::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                use x11::LinuxSystemMonitor;
                Ok(Self {
                    inner: Box::new(LinuxSystemMonitor::new()?),
                })
            }
            else {
                // This runtime error is needed to allow the project to be compiled for during testing.
                unimplemented!("No system monitor was specified")
            }
        }
    }
}

impl SystemMonitor for GenericSystemMonitor {
    fn get_idle_time(&mut self) -> Result<u32> {
        self.inner.get_idle_time()
    }

    fn is_session_locked(&mut self) -> Result<bool> {
        self.inner.is_session_locked()
    }
}
