// src/types.rs
use serde::{Deserialize, Serialize};

/// Body of `POST /knock`. Absent fields are omitted so the server picks
/// the caller's address and its default TTL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnockRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnockResponse {
    pub whitelisted_entry: String,
    pub expires_at: i64,
    pub expires_in_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse { pub error: String }

/// Last submitted form values, persisted after a successful knock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub endpoint: String,
    pub token: String,
    pub ttl: Option<i64>,
    pub ip: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_absent_fields() {
        let body = serde_json::to_value(KnockRequest::default()).unwrap();
        assert_eq!(body, json!({}));

        let body = serde_json::to_value(KnockRequest {
            ip_address: Some("10.0.0.1".into()),
            ttl: None,
        })
        .unwrap();
        assert_eq!(body, json!({ "ip_address": "10.0.0.1" }));
    }

    #[test]
    fn response_rejects_missing_or_mistyped_fields() {
        let missing = json!({ "whitelisted_entry": "10.0.0.1", "expires_at": 1 });
        assert!(serde_json::from_value::<KnockResponse>(missing).is_err());

        let mistyped = json!({
            "whitelisted_entry": "10.0.0.1",
            "expires_at": "soon",
            "expires_in_seconds": 60
        });
        assert!(serde_json::from_value::<KnockResponse>(mistyped).is_err());
    }

    #[test]
    fn session_serializes_nulls() {
        let session = Session {
            endpoint: "https://example.com".into(),
            token: "t".into(),
            ttl: None,
            ip: None,
        };
        assert_eq!(
            serde_json::to_value(&session).unwrap(),
            json!({ "endpoint": "https://example.com", "token": "t", "ttl": null, "ip": null })
        );
    }
}
