//! The knocker page: form state, a single in-flight knock, and the
//! auto-knock effect that may fire once after mount.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auto_knock::{should_auto_knock, AutoKnockEffect, AutoKnockStore, EffectKey, AUTO_KNOCK_DELAY};
use crate::knocker::{KnockClient, KnockError};
use crate::location::Location;
use crate::session::SessionStore;
use crate::types::{KnockRequest, KnockResponse, Session};

pub const UNREACHABLE_MESSAGE: &str = "Failed to reach Knocker. Are you sure Knocker is running?";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KnockState {
    #[default]
    Idle,
    Pending,
    Success(KnockResponse),
    Error(String),
}

impl KnockState {
    pub fn is_pending(&self) -> bool {
        matches!(self, KnockState::Pending)
    }

    pub fn result(&self) -> Option<&KnockResponse> {
        match self {
            KnockState::Success(res) => Some(res),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            KnockState::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Raw form fields, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    pub endpoint: String,
    pub token: String,
    pub ttl: String,
    pub ip: String,
}

impl Form {
    fn fill_from(&mut self, session: &Session) {
        self.endpoint = session.endpoint.clone();
        self.token = session.token.clone();
        self.ttl = session
            .ttl
            .filter(|ttl| *ttl != 0)
            .map(|ttl| ttl.to_string())
            .unwrap_or_default();
        self.ip = session.ip.clone().unwrap_or_default();
    }

    /// Leading integer of the TTL field, so `"12.5"` is 12. `None` when the
    /// field does not start with a number.
    pub fn requested_ttl(&self) -> Option<i64> {
        let ttl = self.ttl.trim_start();
        let sign = usize::from(ttl.starts_with(['-', '+']));
        let digits = ttl[sign..].bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        ttl[..sign + digits].parse().ok()
    }

    /// Trimmed IP/CIDR, `None` when blank.
    pub fn ip_address(&self) -> Option<String> {
        Some(self.ip.trim())
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlWarning {
    pub requested: i64,
    pub applied: i64,
}

/// Shown when the server granted less than was asked for.
pub fn ttl_warning(requested: Option<i64>, result: Option<&KnockResponse>) -> Option<TtlWarning> {
    let requested = requested.filter(|ttl| *ttl != 0)?;
    let applied = result?.expires_in_seconds;
    (applied < requested).then_some(TtlWarning { requested, applied })
}

fn describe(err: &KnockError) -> String {
    if err.is_transport() {
        return UNREACHABLE_MESSAGE.to_string();
    }
    err.to_string()
}

pub struct KnockerPage {
    client: KnockClient,
    sessions: SessionStore,
    auto_knock: AutoKnockStore,
    location: Location,
    form: Form,
    state: KnockState,
    requested_ttl: Option<i64>,
    auto_knock_enabled: bool,
    effect: AutoKnockEffect,
    mounted: bool,
}

impl KnockerPage {
    pub fn new(
        client: KnockClient,
        sessions: SessionStore,
        auto_knock: AutoKnockStore,
        location: Location,
    ) -> Self {
        Self {
            client,
            sessions,
            auto_knock,
            location,
            form: Form::default(),
            state: KnockState::Idle,
            requested_ttl: None,
            auto_knock_enabled: false,
            effect: AutoKnockEffect::default(),
            mounted: false,
        }
    }

    /// Prefill the form from the stored session and read the auto-knock
    /// preference. Only the first call has any effect.
    pub fn mount(&mut self) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        if let Some(session) = self.sessions.load() {
            debug!("restored session for {}", session.endpoint);
            self.form.fill_from(&session);
        }
        self.auto_knock_enabled = self.auto_knock.get();
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut Form {
        &mut self.form
    }

    pub fn state(&self) -> &KnockState {
        &self.state
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn auto_knock_enabled(&self) -> bool {
        self.auto_knock_enabled
    }

    pub fn requested_ttl(&self) -> Option<i64> {
        self.requested_ttl
    }

    pub fn ttl_warning(&self) -> Option<TtlWarning> {
        ttl_warning(self.requested_ttl, self.state.result())
    }

    pub fn effect_key(&self) -> EffectKey {
        EffectKey {
            endpoint: self.form.endpoint.clone(),
            token: self.form.token.clone(),
            requested_by_url: self.location.auto_knock_requested(),
            enabled: self.auto_knock_enabled,
        }
    }

    pub fn auto_knock_due(&self) -> bool {
        should_auto_knock(
            &self.effect_key(),
            self.state.is_pending(),
            self.state.result().is_some(),
        )
    }

    /// Re-run the auto-knock effect. Nothing happens unless its inputs changed
    /// since the last run and the page is eligible; then, after a short delay,
    /// one knock is submitted. Cancelling `teardown` drops the pending fire.
    ///
    /// Returns whether a knock was fired.
    pub async fn run_effects(&mut self, teardown: &CancellationToken) -> bool {
        let key = self.effect_key();
        if !self.effect.changed(&key) || !self.auto_knock_due() {
            return false;
        }
        debug!("auto-knock scheduled in {:?}", AUTO_KNOCK_DELAY);
        tokio::select! {
            biased;
            _ = teardown.cancelled() => {
                debug!("page torn down before auto-knock");
                false
            }
            _ = tokio::time::sleep(AUTO_KNOCK_DELAY) => {
                info!("auto-knocking {}", self.form.endpoint);
                self.submit().await;
                true
            }
        }
    }

    /// Knock with the current form values. Ignored while a knock is pending.
    pub async fn submit(&mut self) -> &KnockState {
        if self.state.is_pending() {
            return &self.state;
        }

        let ttl = self.form.requested_ttl();
        let ip = self.form.ip_address();
        self.requested_ttl = ttl;
        self.state = KnockState::Pending;

        let request = KnockRequest {
            ip_address: ip.clone(),
            ttl: ttl.filter(|t| *t > 0).map(|t| t as u64),
        };
        let outcome = self
            .client
            .knock(&self.form.endpoint, &self.form.token, &request)
            .await;

        self.state = match outcome {
            Ok(res) => {
                self.sessions.save(&Session {
                    endpoint: self.form.endpoint.clone(),
                    token: self.form.token.clone(),
                    ttl,
                    ip,
                });
                KnockState::Success(res)
            }
            Err(e) => {
                warn!("knock failed: {e}");
                KnockState::Error(describe(&e))
            }
        };
        &self.state
    }

    /// Flip the auto-knock preference and mirror it into the page URL.
    pub fn toggle_auto_knock(&mut self) -> bool {
        let enabled = !self.auto_knock_enabled;
        self.auto_knock_enabled = enabled;
        self.auto_knock.set(enabled);
        self.location.set_auto_knock(enabled);
        enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CookieJar, TabStorage};
    use tempfile::TempDir;

    fn response(ttl: i64) -> KnockResponse {
        KnockResponse {
            whitelisted_entry: "10.0.0.1".into(),
            expires_at: 1_700_000_000 + ttl,
            expires_in_seconds: ttl,
        }
    }

    fn page(dir: &TempDir, url: &str) -> KnockerPage {
        let jar = CookieJar::in_profile(dir.path());
        KnockerPage::new(
            KnockClient::new(),
            SessionStore::with_jar(&jar, TabStorage::in_memory()),
            AutoKnockStore::with_jar(&jar),
            Location::parse(url).unwrap(),
        )
    }

    #[test]
    fn warning_only_when_capped() {
        assert_eq!(
            ttl_warning(Some(7200), Some(&response(3600))),
            Some(TtlWarning { requested: 7200, applied: 3600 })
        );
        assert_eq!(ttl_warning(Some(3600), Some(&response(3600))), None);
        assert_eq!(ttl_warning(Some(60), Some(&response(3600))), None);
        assert_eq!(ttl_warning(None, Some(&response(3600))), None);
        assert_eq!(ttl_warning(Some(7200), None), None);
    }

    #[test]
    fn form_normalization() {
        let form = Form {
            ttl: " 1800 ".into(),
            ip: "  10.0.0.0/24 ".into(),
            ..Default::default()
        };
        assert_eq!(form.requested_ttl(), Some(1800));
        assert_eq!(form.ip_address().as_deref(), Some("10.0.0.0/24"));

        let blank = Form { ttl: "".into(), ip: "   ".into(), ..Default::default() };
        assert_eq!(blank.requested_ttl(), None);
        assert_eq!(blank.ip_address(), None);

        let junk = Form { ttl: "soon".into(), ..Default::default() };
        assert_eq!(junk.requested_ttl(), None);
    }

    #[test]
    fn ttl_takes_leading_integer() {
        let ttl = |raw: &str| Form { ttl: raw.into(), ..Default::default() }.requested_ttl();
        assert_eq!(ttl("12.5"), Some(12));
        assert_eq!(ttl("600s"), Some(600));
        assert_eq!(ttl("-5"), Some(-5));
        assert_eq!(ttl("+7"), Some(7));
        assert_eq!(ttl("-"), None);
        assert_eq!(ttl(".5"), None);
    }

    #[test]
    fn mount_fills_form_from_session() {
        let dir = TempDir::new().unwrap();
        let mut p = page(&dir, "http://localhost/");
        p.sessions.save(&Session {
            endpoint: "https://host".into(),
            token: "tok".into(),
            ttl: Some(600),
            ip: None,
        });
        p.mount();
        assert_eq!(
            p.form(),
            &Form {
                endpoint: "https://host".into(),
                token: "tok".into(),
                ttl: "600".into(),
                ip: String::new(),
            }
        );
        assert!(!p.auto_knock_enabled());
    }

    #[test]
    fn mount_runs_once() {
        let dir = TempDir::new().unwrap();
        let mut p = page(&dir, "http://localhost/");
        p.mount();
        p.form_mut().endpoint = "typed".into();
        p.sessions.save(&Session { endpoint: "stored".into(), ..Default::default() });
        p.mount();
        assert_eq!(p.form().endpoint, "typed");
    }

    #[test]
    fn toggle_twice_restores_flag_and_url() {
        let dir = TempDir::new().unwrap();
        let mut p = page(&dir, "http://localhost/");
        p.mount();

        assert!(p.toggle_auto_knock());
        assert!(p.auto_knock.get());
        assert_eq!(p.location().to_string(), "http://localhost/?autoKnock=true");

        assert!(!p.toggle_auto_knock());
        assert!(!p.auto_knock.get());
        assert_eq!(p.location().to_string(), "http://localhost/");
    }

    #[test]
    fn auto_knock_needs_flag_url_and_credentials() {
        let dir = TempDir::new().unwrap();
        let mut p = page(&dir, "http://localhost/?autoKnock=true");
        p.mount();
        assert!(!p.auto_knock_due());

        p.form_mut().endpoint = "https://host".into();
        p.form_mut().token = "tok".into();
        assert!(!p.auto_knock_due());

        p.auto_knock.set(true);
        p.auto_knock_enabled = p.auto_knock.get();
        assert!(p.auto_knock_due());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_scheduled_knock() {
        let dir = TempDir::new().unwrap();
        let mut p = page(&dir, "http://localhost/?autoKnock=true");
        p.form_mut().endpoint = "http://127.0.0.1:9".into();
        p.form_mut().token = "tok".into();
        p.auto_knock_enabled = true;

        let teardown = CancellationToken::new();
        teardown.cancel();
        assert!(!p.run_effects(&teardown).await);
        assert_eq!(p.state(), &KnockState::Idle);
    }

    #[test]
    fn http_errors_keep_server_message() {
        let err = KnockError::Http {
            status: reqwest::StatusCode::UNAUTHORIZED,
            message: "Invalid API key".into(),
        };
        assert_eq!(describe(&err), "Invalid API key");
    }
}
