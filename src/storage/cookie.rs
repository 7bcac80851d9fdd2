//! Cookie jar backend.
//!
//! The jar is a text file in the profile directory holding one `Set-Cookie`
//! style line per cookie. Every cookie is written with `Path=/`,
//! `SameSite=Lax` and an absolute `Expires`. Expired cookies read as absent.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::cookie::{Cookie, SameSite};
use time::{Duration, OffsetDateTime};

use super::{Backend, StorageError, StorageResult};

pub const JAR_FILE: &str = "cookies.txt";

#[derive(Debug, Clone)]
pub struct CookieJar {
    path: Option<PathBuf>,
    lifetime: Duration,
    lock: Arc<Mutex<()>>,
}

impl CookieJar {
    /// Jar stored as `cookies.txt` under `profile_dir`.
    pub fn in_profile(profile_dir: impl AsRef<Path>) -> Self {
        Self::at(profile_dir.as_ref().join(JAR_FILE))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            lifetime: Duration::days(365),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// A jar with no backing file. Every operation fails with `Unavailable`.
    pub fn detached() -> Self {
        Self {
            path: None,
            lifetime: Duration::days(365),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Same jar, writing cookies that expire `lifetime` from now.
    pub fn with_lifetime(&self, lifetime: Duration) -> Self {
        Self {
            path: self.path.clone(),
            lifetime,
            lock: Arc::clone(&self.lock),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn file(&self) -> StorageResult<&Path> {
        self.path.as_deref().ok_or(StorageError::Unavailable)
    }

    fn load(path: &Path) -> StorageResult<Vec<Cookie<'static>>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let now = OffsetDateTime::now_utc();
        Ok(text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| Cookie::parse_encoded(line.to_string()).ok())
            .filter(|c| c.expires_datetime().map_or(true, |at| at > now))
            .collect())
    }

    fn store(path: &Path, cookies: &[Cookie<'static>]) -> StorageResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut out = String::new();
        for c in cookies {
            out.push_str(&c.encoded().to_string());
            out.push('\n');
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, out)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn build(&self, name: &str, value: &str) -> Cookie<'static> {
        Cookie::build((name.to_string(), value.to_string()))
            .path("/")
            .same_site(SameSite::Lax)
            .expires(OffsetDateTime::now_utc() + self.lifetime)
            .build()
    }
}

impl Backend for CookieJar {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.file()?;
        let _guard = self.lock.lock().map_err(|_| StorageError::Unavailable)?;
        let cookies = Self::load(path)?;
        Ok(cookies
            .into_iter()
            .find(|c| c.name() == key)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty()))
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.file()?;
        let _guard = self.lock.lock().map_err(|_| StorageError::Unavailable)?;
        let mut cookies = Self::load(path)?;
        cookies.retain(|c| c.name() != key);
        cookies.push(self.build(key, value));
        Self::store(path, &cookies)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.file()?;
        let _guard = self.lock.lock().map_err(|_| StorageError::Unavailable)?;
        let mut cookies = Self::load(path)?;
        let before = cookies.len();
        cookies.retain(|c| c.name() != key);
        if cookies.len() != before {
            Self::store(path, &cookies)?;
        }
        Ok(())
    }
}
