//! Runtime configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::location::Location;
use crate::storage::{CookieJar, TabStorage};

pub const DEFAULT_PAGE_URL: &str = "http://localhost/";
pub const DEFAULT_MOCK_BIND: &str = "127.0.0.1:8787";

#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding the cookie jar. `None` leaves the jar unavailable.
    pub profile_dir: Option<PathBuf>,
    /// File backing the tab-scoped fallback store.
    pub tab_storage: PathBuf,
    /// Page location consulted for `autoKnock` on mount.
    pub page_url: String,
    /// Raw `KNOCKER_MOCK_BIND`, parsed only when the mock is served.
    pub mock_bind: String,
}

impl Config {
    /// Reads `.env` and then the environment.
    ///
    /// | Variable              | Default                                   |
    /// |-----------------------|-------------------------------------------|
    /// | `KNOCKER_PROFILE_DIR` | `<data dir>/knocker-web`                  |
    /// | `KNOCKER_TAB_STORAGE` | `<temp dir>/knocker-web/session-storage.json` |
    /// | `KNOCKER_PAGE_URL`    | `http://localhost/`                       |
    /// | `KNOCKER_MOCK_BIND`   | `127.0.0.1:8787`                          |
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let profile_dir = std::env::var_os("KNOCKER_PROFILE_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::data_dir().map(|d| d.join("knocker-web")));
        let tab_storage = std::env::var_os("KNOCKER_TAB_STORAGE")
            .map(PathBuf::from)
            .unwrap_or_else(TabStorage::default_path);
        let page_url = std::env::var("KNOCKER_PAGE_URL").unwrap_or_else(|_| DEFAULT_PAGE_URL.into());
        let mock_bind =
            std::env::var("KNOCKER_MOCK_BIND").unwrap_or_else(|_| DEFAULT_MOCK_BIND.into());
        Ok(Self {
            profile_dir,
            tab_storage,
            page_url,
            mock_bind,
        })
    }

    pub fn mock_addr(&self) -> anyhow::Result<SocketAddr> {
        self.mock_bind
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid KNOCKER_MOCK_BIND {:?}: {e}", self.mock_bind))
    }

    pub fn cookie_jar(&self) -> CookieJar {
        match &self.profile_dir {
            Some(dir) => CookieJar::in_profile(dir),
            None => CookieJar::detached(),
        }
    }

    pub fn tab(&self) -> TabStorage {
        TabStorage::at(&self.tab_storage)
    }

    pub fn location(&self) -> anyhow::Result<Location> {
        Ok(Location::parse(&self.page_url)?)
    }
}
