use anyhow::Result;
use tracing::instrument;
use xcb::{
    screensaver::{QueryInfo, QueryInfoReply},
    x::{Drawable, Window},
    Connection,
};

use super::SystemMonitor;

/// `ScreenSaverState.On` from the screensaver extension spec.
const SCREENSAVER_ON: u8 = 1;

pub struct LinuxSystemMonitor {
    connection: Connection,
    preferred_screen: i32,
}

impl LinuxSystemMonitor {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = xcb::Connection::connect(None)?;
        Ok(Self {
            connection,
            preferred_screen,
        })
    }

    fn root_window(&self) -> Window {
        let setup = self.connection.get_setup();

        // Currently the application only supports 1 x11 screen.
        setup
            .roots()
            .nth(self.preferred_screen.max(0) as usize)
            .unwrap()
            .root()
    }

    fn query_screensaver(&self) -> Result<QueryInfoReply> {
        let cookie = self.connection.send_request(&QueryInfo {
            drawable: Drawable::Window(self.root_window()),
        });
        Ok(self.connection.wait_for_reply(cookie)?)
    }
}

impl SystemMonitor for LinuxSystemMonitor {
    #[instrument(skip(self))]
    fn get_idle_time(&mut self) -> Result<u32> {
        let reply = self.query_screensaver()?;
        Ok(reply.ms_since_user_input())
    }

    #[instrument(skip(self))]
    fn is_session_locked(&mut self) -> Result<bool> {
        // The screensaver being on is the closest x11 comes to a portable
        // lock signal. Lockers that bypass the screensaver extension won't be
        // detected and will instead show up as idle time.
        let reply = self.query_screensaver()?;
        Ok(reply.state() == SCREENSAVER_ON)
    }
}
