// src/render.rs
use chrono::{DateTime, Local};

use crate::page::{KnockState, KnockerPage, TtlWarning};
use crate::types::KnockResponse;

fn expires_at_local(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub fn success(res: &KnockResponse) -> String {
    format!(
        "Success!\n  Whitelisted: {}\n  Expires in: {} seconds\n  Expires at: {}\n",
        res.whitelisted_entry,
        res.expires_in_seconds,
        expires_at_local(res.expires_at),
    )
}

pub fn warning(w: &TtlWarning) -> String {
    format!(
        "  TTL was capped by the server. Requested: {}s, Applied: {}s\n",
        w.requested, w.applied
    )
}

pub fn error(message: &str) -> String {
    let message = if message.is_empty() { "Failed to knock" } else { message };
    format!("Error\n  {message}\n")
}

pub fn page(page: &KnockerPage) -> String {
    let mut out = String::new();
    match page.state() {
        KnockState::Success(res) => {
            out.push_str(&success(res));
            if let Some(w) = page.ttl_warning() {
                out.push_str(&warning(&w));
            }
            let toggle = if page.auto_knock_enabled() { "on" } else { "off" };
            out.push_str(&format!("  Auto-knock on page load: {toggle}\n"));
        }
        KnockState::Error(msg) => out.push_str(&error(msg)),
        KnockState::Pending => out.push_str("Knocking...\n"),
        KnockState::Idle => {}
    }
    out
}

/// The prefilled form, with the token masked.
pub fn form(page: &KnockerPage) -> String {
    let form = page.form();
    let token = if form.token.is_empty() { "" } else { "********" };
    format!(
        "Knocker Endpoint URL: {}\nToken: {token}\nTTL (seconds): {}\nIP/CIDR to whitelist: {}\n",
        form.endpoint, form.ttl, form.ip
    )
}
