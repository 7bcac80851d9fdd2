// src/session.rs
use std::sync::Arc;

use time::Duration;

use crate::storage::{attempt, Backend, CookieJar, StorageResult, TabStorage};
use crate::types::Session;

pub const SESSION_KEY: &str = "knocker_session";
pub const SESSION_LIFETIME: Duration = Duration::days(2 * 365);

/// Last-used form values. Cookie first, tab storage as fallback.
///
/// None of the operations fail: storage errors read as "no session" and
/// writes that fail are dropped.
#[derive(Clone)]
pub struct SessionStore {
    primary: Arc<dyn Backend>,
    fallback: Arc<dyn Backend>,
}

impl SessionStore {
    pub fn new(primary: Arc<dyn Backend>, fallback: Arc<dyn Backend>) -> Self {
        Self { primary, fallback }
    }

    pub fn with_jar(jar: &CookieJar, tab: TabStorage) -> Self {
        Self::new(Arc::new(jar.with_lifetime(SESSION_LIFETIME)), Arc::new(tab))
    }

    pub fn save(&self, session: &Session) {
        attempt("save session", (), || {
            let raw = serde_json::to_string(session)?;
            self.primary.write(SESSION_KEY, &raw)
        })
    }

    /// A value in the primary store that fails to parse ends the lookup;
    /// the fallback is only consulted when the primary holds nothing.
    pub fn load(&self) -> Option<Session> {
        let primary = attempt("read session cookie", None, || self.primary.read(SESSION_KEY));
        let raw = match primary {
            Some(raw) => raw,
            None => attempt("read tab session", None, || self.fallback.read(SESSION_KEY))?,
        };
        attempt("parse session", None, || {
            Ok(Some(serde_json::from_str::<Session>(&raw)?))
        })
    }

    pub fn clear(&self) {
        attempt("clear session cookie", (), || self.primary.remove(SESSION_KEY));
        attempt("clear tab session", (), || self.fallback.remove(SESSION_KEY));
    }

    /// Seed the fallback store directly, as older builds of the page did.
    pub fn save_to_fallback(&self, session: &Session) -> StorageResult<()> {
        self.fallback
            .write(SESSION_KEY, &serde_json::to_string(session)?)
    }
}
