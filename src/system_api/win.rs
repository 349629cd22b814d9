use anyhow::{anyhow, Result};
use windows::Win32::{
    System::{
        StationsAndDesktops::{CloseDesktop, OpenInputDesktop, DESKTOP_READOBJECTS},
        SystemInformation::GetTickCount64,
    },
    UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO},
};

use super::SystemMonitor;

#[tracing::instrument]
pub fn get_idle_ms() -> Result<u32> {
    let mut info = LASTINPUTINFO {
        cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
        dwTime: 0,
    };

    let success = unsafe { GetLastInputInfo(&mut info) };
    if !success.as_bool() {
        return Err(anyhow!("Failed to query last input info"));
    }

    // dwTime comes from the 32-bit tick counter and wraps every 49 days.
    // Truncating the 64-bit counter keeps the subtraction consistent.
    let now = unsafe { GetTickCount64() } as u32;
    Ok(now.wrapping_sub(info.dwTime))
}

#[tracing::instrument]
pub fn input_desktop_available() -> bool {
    // While the session is locked (or on the secure desktop) opening the
    // input desktop is denied for ordinary processes.
    match unsafe { OpenInputDesktop(Default::default(), false, DESKTOP_READOBJECTS) } {
        Ok(desktop) => {
            let _ = unsafe { CloseDesktop(desktop) };
            true
        }
        Err(_) => false,
    }
}

#[derive(Default)]
pub struct WindowsSystemMonitor {}

impl WindowsSystemMonitor {
    pub fn new() -> Self {
        Self {}
    }
}

impl SystemMonitor for WindowsSystemMonitor {
    fn get_idle_time(&mut self) -> Result<u32> {
        get_idle_ms()
    }

    fn is_session_locked(&mut self) -> Result<bool> {
        Ok(!input_desktop_available())
    }
}
