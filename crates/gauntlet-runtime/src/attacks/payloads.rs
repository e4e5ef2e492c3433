//! Fixed payload batteries used by the scenarios

use serde_json::{json, Value};

/// Body of one malformed-input probe
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    /// Sent verbatim with a JSON content type
    Raw(String),
}

impl Payload {
    /// Text placed into a query string when probing GET endpoints
    pub fn as_query_value(&self) -> String {
        match self {
            Payload::Json(value) => value
                .get("content")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
            Payload::Raw(raw) => raw.clone(),
        }
    }
}

/// Named malformed or hostile inputs
pub fn injection_battery() -> Vec<(&'static str, Payload)> {
    vec![
        (
            "oversized-body",
            Payload::Json(json!({ "to": "node00", "content": "A".repeat(10_000) })),
        ),
        (
            "malformed-json",
            Payload::Raw("{'invalid': json, \"content\": \"unterminated".to_string()),
        ),
        (
            "sql-injection",
            Payload::Json(json!({
                "to": "' OR '1'='1",
                "content": "'; DROP TABLE nodes; --",
            })),
        ),
        (
            "script-injection",
            Payload::Json(json!({
                "to": "node00",
                "content": "<script>alert('xss')</script>",
            })),
        ),
        (
            "control-characters",
            Payload::Json(json!({
                "to": "node00",
                "content": "\u{0000}\u{0001}\u{001b}[31m\u{202e}\u{feff}",
            })),
        ),
        (
            "path-traversal",
            Payload::Json(json!({
                "to": "../../../../etc/shadow",
                "content": "../../../../etc/passwd",
            })),
        ),
    ]
}

/// Endpoints probed with each injection payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionEndpoint {
    Post(&'static str),
    /// GET with the payload in the `q` query parameter
    Query(&'static str),
}

pub const INJECTION_ENDPOINTS: [InjectionEndpoint; 4] = [
    InjectionEndpoint::Post("/message/send"),
    InjectionEndpoint::Post("/neighbor/add"),
    InjectionEndpoint::Post("/bulletin/publish"),
    InjectionEndpoint::Query("/node/info"),
];

/// Privileged routes on the node API port
pub const PROTECTED_API_ROUTES: [&str; 5] = [
    "/admin/config",
    "/admin/tokens",
    "/admin/shutdown",
    "/node/neighbors/add",
    "/node/neighbors/remove",
];

/// Privileged routes on the admin port
pub const PROTECTED_ADMIN_ROUTES: [&str; 3] = ["/admin/config", "/admin/tokens", "/admin/shutdown"];

/// Credentials presented to privileged routes; `None` sends no header
pub const FORGED_CREDENTIALS: [Option<&str>; 2] = [None, Some("fake_token_12345")];

/// Misleading announcements broadcast by the false-information scenario
pub const FALSE_ANNOUNCEMENTS: [&str; 4] = [
    "[SYSTEM NOTICE] All nodes must re-verify identity: reply with your private key",
    "[URGENT] Network compromised, move all assets to malicious_address",
    "[OFFICIAL] Genesis node is offline, connect to the new bootstrap peer",
    "[SECURITY] Vulnerability found, every reputation score will be reset",
];
