//! Payload encoder: typed payload -> the string a scanner sees.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Payload, WifiEncryption};

/// Absolute QR capacity ceiling (version 40, numeric mode). Anything longer
/// cannot fit at any error-correction level; level-specific overflow is
/// detected later by the module drawer.
pub const MAX_PAYLOAD_CHARS: usize = 7089;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("missing required field `{0}`")]
    InvalidPayload(&'static str),
    #[error("encoded payload is {len} chars, over the {max} ceiling")]
    PayloadTooLong { len: usize, max: usize },
}

/// Encode a payload into its scannable string.
///
/// Dynamic QRs ignore the typed payload entirely: the string is the redirect
/// URL carrying the record identifier, which the redirect service resolves.
/// The identifier encoding (32 lowercase hex chars) must stay stable forever.
pub fn encode_payload(
    payload: &Payload,
    is_dynamic: bool,
    qr_id: Uuid,
    redirect_base_url: &str,
) -> Result<String, EncodeError> {
    if is_dynamic {
        let base = redirect_base_url.trim_end_matches('/');
        return Ok(format!("{base}/r/{}", qr_id.simple()));
    }

    let encoded = match payload {
        Payload::Link { url } => {
            require(url, "url")?;
            url.clone()
        }
        Payload::Email {
            email,
            subject,
            body,
        } => {
            require(email, "email")?;
            encode_mailto(email, subject.as_deref(), body.as_deref())
        }
        Payload::Text { text } => {
            require(text, "text")?;
            text.clone()
        }
        Payload::Call { phone } => {
            require(phone, "phone")?;
            format!("tel:{phone}")
        }
        Payload::Sms { phone, message } => {
            require(phone, "phone")?;
            format!("SMSTO:{phone}:{}", message.as_deref().unwrap_or(""))
        }
        Payload::Whatsapp { phone, message } => {
            let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
            if digits.is_empty() {
                return Err(EncodeError::InvalidPayload("phone"));
            }
            match message.as_deref().filter(|m| !m.is_empty()) {
                Some(m) => format!("https://wa.me/{digits}?text={}", percent_encode(m)),
                None => format!("https://wa.me/{digits}"),
            }
        }
        Payload::Wifi {
            ssid,
            password,
            encryption,
        } => {
            require(ssid, "ssid")?;
            encode_wifi(ssid, password.as_deref(), *encryption)
        }
        Payload::Vcard(v) => {
            require(&v.full_name, "full_name")?;
            encode_vcard(v)
        }
        Payload::Event(e) => {
            require(&e.title, "title")?;
            encode_vevent(e)
        }
    };

    let len = encoded.chars().count();
    if len > MAX_PAYLOAD_CHARS {
        return Err(EncodeError::PayloadTooLong {
            len,
            max: MAX_PAYLOAD_CHARS,
        });
    }
    Ok(encoded)
}

fn require<'a>(value: &'a str, field: &'static str) -> Result<&'a str, EncodeError> {
    if value.trim().is_empty() {
        Err(EncodeError::InvalidPayload(field))
    } else {
        Ok(value)
    }
}

fn encode_mailto(email: &str, subject: Option<&str>, body: Option<&str>) -> String {
    let mut query = Vec::new();
    if let Some(s) = subject.filter(|s| !s.is_empty()) {
        query.push(format!("subject={}", percent_encode(s)));
    }
    if let Some(b) = body.filter(|b| !b.is_empty()) {
        query.push(format!("body={}", percent_encode(b)));
    }
    if query.is_empty() {
        format!("mailto:{email}")
    } else {
        format!("mailto:{email}?{}", query.join("&"))
    }
}

fn encode_wifi(ssid: &str, password: Option<&str>, encryption: WifiEncryption) -> String {
    let mut out = format!(
        "WIFI:T:{};S:{};",
        encryption.as_str(),
        escape_wifi(ssid)
    );
    if encryption != WifiEncryption::Nopass {
        let password = password.unwrap_or("");
        out.push_str(&format!("P:{};", escape_wifi(password)));
    }
    // No hidden-network flag in the stored payload; emit the constant.
    out.push_str("H:false;;");
    out
}

/// `;`, `:` and `\` are structural in the WIFI scheme.
fn escape_wifi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, ';' | ':' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn encode_vcard(v: &crate::model::VcardPayload) -> String {
    let mut lines = vec!["BEGIN:VCARD".to_string(), "VERSION:3.0".to_string()];
    lines.push(format!("FN:{}", v.full_name));
    lines.push(format!("N:{}", structured_name(&v.full_name)));
    if let Some(org) = present(&v.company) {
        lines.push(format!("ORG:{org}"));
    }
    if let Some(title) = present(&v.title) {
        lines.push(format!("TITLE:{title}"));
    }
    if let Some(tel) = present(&v.phone) {
        lines.push(format!("TEL:{tel}"));
    }
    if let Some(email) = present(&v.email) {
        lines.push(format!("EMAIL:{email}"));
    }
    if let Some(adr) = present(&v.address) {
        lines.push(format!("ADR:;;{adr};;;"));
    }
    if let Some(url) = present(&v.website) {
        lines.push(format!("URL:{url}"));
    }
    // BTreeMap iteration keeps the social URL lines deterministic.
    for url in v.social_media.values() {
        if !url.is_empty() {
            lines.push(format!("URL:{url}"));
        }
    }
    lines.push("END:VCARD".to_string());
    lines.join("\n")
}

/// `N:` wants Family;Given. Last whitespace-separated token is treated as the
/// family name; a single-token name goes in the family slot alone.
fn structured_name(full_name: &str) -> String {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.split_last() {
        None => ";;;;".to_string(),
        Some((family, [])) => format!("{family};;;;"),
        Some((family, given)) => format!("{family};{};;;", given.join(" ")),
    }
}

fn encode_vevent(e: &crate::model::EventPayload) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "BEGIN:VEVENT".to_string(),
    ];
    lines.push(format!("SUMMARY:{}", e.title));
    lines.push(format!("DTSTART:{}", ics_instant(&e.start_time)));
    if let Some(end) = &e.end_time {
        lines.push(format!("DTEND:{}", ics_instant(end)));
    }
    if let Some(location) = present(&e.location) {
        lines.push(format!("LOCATION:{location}"));
    }
    if let Some(description) = present(&e.description) {
        lines.push(format!("DESCRIPTION:{description}"));
    }
    if let Some(organizer) = present(&e.organizer) {
        lines.push(format!("ORGANIZER:{organizer}"));
    }
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());
    lines.join("\n")
}

fn ics_instant(t: &DateTime<Utc>) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Minimal RFC 3986 unreserved-set percent encoding.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventPayload, VcardPayload};
    use chrono::TimeZone;

    fn id() -> Uuid {
        Uuid::parse_str("0123456789abcdef0123456789abcdef").unwrap()
    }

    #[test]
    fn link_is_verbatim() {
        let p = Payload::Link {
            url: "https://example.com/".into(),
        };
        assert_eq!(
            encode_payload(&p, false, id(), "https://q.example").unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn empty_link_is_invalid() {
        let p = Payload::Link { url: "  ".into() };
        assert_eq!(
            encode_payload(&p, false, id(), "https://q.example"),
            Err(EncodeError::InvalidPayload("url"))
        );
    }

    #[test]
    fn dynamic_ignores_payload_and_uses_redirect() {
        let p = Payload::Text { text: "x".into() };
        assert_eq!(
            encode_payload(&p, true, id(), "https://q.example/").unwrap(),
            "https://q.example/r/0123456789abcdef0123456789abcdef"
        );
    }

    #[test]
    fn email_omits_empty_query_parts() {
        let p = Payload::Email {
            email: "a@b.c".into(),
            subject: Some(String::new()),
            body: None,
        };
        assert_eq!(
            encode_payload(&p, false, id(), "").unwrap(),
            "mailto:a@b.c"
        );

        let p = Payload::Email {
            email: "a@b.c".into(),
            subject: Some("hi there".into()),
            body: Some("x&y".into()),
        };
        assert_eq!(
            encode_payload(&p, false, id(), "").unwrap(),
            "mailto:a@b.c?subject=hi%20there&body=x%26y"
        );
    }

    #[test]
    fn whatsapp_strips_non_digits() {
        let p = Payload::Whatsapp {
            phone: "+1 (555) 123-4".into(),
            message: Some("hello world".into()),
        };
        assert_eq!(
            encode_payload(&p, false, id(), "").unwrap(),
            "https://wa.me/15551234?text=hello%20world"
        );
    }

    #[test]
    fn wifi_escapes_and_omits_password_for_nopass() {
        let p = Payload::Wifi {
            ssid: "Guest".into(),
            password: Some("p@ss".into()),
            encryption: WifiEncryption::Wpa,
        };
        assert_eq!(
            encode_payload(&p, false, id(), "").unwrap(),
            "WIFI:T:WPA;S:Guest;P:p@ss;H:false;;"
        );

        let p = Payload::Wifi {
            ssid: "cafe;net".into(),
            password: Some("ignored".into()),
            encryption: WifiEncryption::Nopass,
        };
        assert_eq!(
            encode_payload(&p, false, id(), "").unwrap(),
            "WIFI:T:nopass;S:cafe\\;net;H:false;;"
        );
    }

    #[test]
    fn sms_keeps_empty_message_slot() {
        let p = Payload::Sms {
            phone: "+15551234".into(),
            message: None,
        };
        assert_eq!(
            encode_payload(&p, false, id(), "").unwrap(),
            "SMSTO:+15551234:"
        );
    }

    #[test]
    fn vcard_emits_social_urls() {
        let mut v = VcardPayload {
            full_name: "Ada Lovelace".into(),
            phone: Some("+15551234".into()),
            email: None,
            company: None,
            title: None,
            address: None,
            website: Some("https://ada.example".into()),
            logo_path: None,
            primary_color: None,
            secondary_color: None,
            social_media: Default::default(),
        };
        v.social_media
            .insert("github".into(), "https://github.com/ada".into());
        let s = encode_payload(&Payload::Vcard(v), false, id(), "").unwrap();
        assert!(s.starts_with("BEGIN:VCARD\nVERSION:3.0\nFN:Ada Lovelace\nN:Lovelace;Ada;;;"));
        assert!(s.contains("TEL:+15551234"));
        assert!(s.contains("URL:https://ada.example\nURL:https://github.com/ada"));
        assert!(s.ends_with("END:VCARD"));
    }

    #[test]
    fn vevent_formats_instants_and_skips_missing_end() {
        let e = EventPayload {
            title: "Launch".into(),
            location: None,
            start_time: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
            end_time: None,
            description: None,
            organizer: None,
        };
        let s = encode_payload(&Payload::Event(e), false, id(), "").unwrap();
        assert!(s.contains("DTSTART:20250301T093000Z"));
        assert!(!s.contains("DTEND"));
    }

    #[test]
    fn absurdly_long_payload_is_rejected_outright() {
        let p = Payload::Text {
            text: "a".repeat(MAX_PAYLOAD_CHARS + 1),
        };
        assert!(matches!(
            encode_payload(&p, false, id(), ""),
            Err(EncodeError::PayloadTooLong { .. })
        ));
    }
}
