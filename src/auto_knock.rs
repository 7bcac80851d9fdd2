// src/auto_knock.rs
use std::sync::Arc;
use std::time::Duration as StdDuration;

use time::Duration;

use crate::storage::{attempt, Backend, CookieJar};

pub const AUTO_KNOCK_KEY: &str = "knocker_auto_knock";
pub const AUTO_KNOCK_LIFETIME: Duration = Duration::days(365);
/// Pause between mount and an automatic knock so the prefilled form settles.
pub const AUTO_KNOCK_DELAY: StdDuration = StdDuration::from_millis(100);

const ENABLED: &str = "1";
const DISABLED: &str = "0";

/// Persisted "auto-knock on page load" preference. Independent of the session.
#[derive(Clone)]
pub struct AutoKnockStore {
    backend: Arc<dyn Backend>,
}

impl AutoKnockStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn with_jar(jar: &CookieJar) -> Self {
        Self::new(Arc::new(jar.with_lifetime(AUTO_KNOCK_LIFETIME)))
    }

    pub fn set(&self, enabled: bool) {
        let value = if enabled { ENABLED } else { DISABLED };
        attempt("save auto-knock flag", (), || {
            self.backend.write(AUTO_KNOCK_KEY, value)
        })
    }

    /// Only an explicit "1" counts; unset, "0" and garbage are all off.
    pub fn get(&self) -> bool {
        self.raw().as_deref() == Some(ENABLED)
    }

    pub fn clear(&self) {
        attempt("clear auto-knock flag", (), || self.backend.remove(AUTO_KNOCK_KEY))
    }

    /// Stored value as-is, for telling "disabled" apart from "never set".
    pub fn raw(&self) -> Option<String> {
        attempt("read auto-knock flag", None, || self.backend.read(AUTO_KNOCK_KEY))
    }
}

/// Inputs the auto-knock effect depends on. The effect only re-runs when
/// one of these changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectKey {
    pub endpoint: String,
    pub token: String,
    pub requested_by_url: bool,
    pub enabled: bool,
}

/// Whether an automatic knock may be scheduled for `key` given the current
/// request state.
pub fn should_auto_knock(key: &EffectKey, pending: bool, succeeded: bool) -> bool {
    key.requested_by_url
        && key.enabled
        && !key.endpoint.is_empty()
        && !key.token.is_empty()
        && !pending
        && !succeeded
}

/// Tracks the last key the effect ran with.
#[derive(Debug, Default)]
pub struct AutoKnockEffect {
    last: Option<EffectKey>,
}

impl AutoKnockEffect {
    /// Returns true if `key` differs from the previous run and the effect
    /// should be evaluated.
    pub fn changed(&mut self, key: &EffectKey) -> bool {
        if self.last.as_ref() == Some(key) {
            return false;
        }
        self.last = Some(key.clone());
        true
    }
}
