//! Wi-Fi network payloads carried by share-screen QR codes
//!
//! The wire format is `WIFI:S:<ssid>;T:<security>;P:<password>;;`. Fields may
//! appear in any order, unknown tags are ignored and `\;`, `\:`, `\,`, `\\`
//! escape the separators inside values.

use serde::{Deserialize, Serialize};
use std::fmt;

const WIFI_PREFIX: &str = "WIFI:";

/// Network credentials decoded from a share-screen QR code
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QrPayload {
    pub ssid: String,
    pub password: String,
    /// Security type (`WPA`, `WEP`, `nopass`, ...), when the code carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

// Keeps passwords out of logs
impl fmt::Debug for QrPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QrPayload")
            .field("ssid", &self.ssid)
            .field("password", &format_args!("<{} chars>", self.password.chars().count()))
            .field("security", &self.security)
            .field("hidden", &self.hidden)
            .finish()
    }
}

impl QrPayload {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
            security: None,
            hidden: false,
        }
    }

    /// Whether a raw QR value looks like a Wi-Fi payload
    pub fn is_wifi(raw: &str) -> bool {
        raw.starts_with(WIFI_PREFIX)
    }

    /// Parse a raw `WIFI:` string. Returns `None` only when the prefix is missing;
    /// a missing `S:` or `P:` field yields an empty string for that field.
    pub fn parse(raw: &str) -> Option<Self> {
        let body = raw.strip_prefix(WIFI_PREFIX)?;
        let mut payload = QrPayload::default();

        for field in split_unescaped(body) {
            let Some((tag, value)) = field.split_once(':') else {
                continue;
            };
            let value = unescape(value);
            match tag {
                "S" => payload.ssid = value,
                "P" => payload.password = value,
                "T" => payload.security = Some(value).filter(|v| !v.is_empty()),
                "H" => payload.hidden = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        Some(payload)
    }
}

/// Split on `;` that are not preceded by a backslash escape, keeping escapes intact
fn split_unescaped(body: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            ';' => {
                if i > start {
                    fields.push(&body[start..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < body.len() {
        fields.push(&body[start..]);
    }
    fields
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
