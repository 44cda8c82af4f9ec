use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::style::QrStyle;

/// The kind of content a QR encodes. Immutable after creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QrType {
    Link,
    Email,
    Text,
    Call,
    Sms,
    Whatsapp,
    Wifi,
    Vcard,
    Event,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum WifiEncryption {
    #[serde(rename = "WPA")]
    Wpa,
    #[serde(rename = "WEP")]
    Wep,
    #[serde(rename = "nopass")]
    Nopass,
}

impl WifiEncryption {
    pub fn as_str(self) -> &'static str {
        match self {
            WifiEncryption::Wpa => "WPA",
            WifiEncryption::Wep => "WEP",
            WifiEncryption::Nopass => "nopass",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VcardPayload {
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub logo_path: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    /// platform name -> profile URL, emitted as extra URL: lines.
    #[serde(default)]
    pub social_media: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventPayload {
    pub title: String,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub organizer: Option<String>,
}

/// Type-specific payload, exactly one per QR record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Link {
        url: String,
    },
    Email {
        email: String,
        subject: Option<String>,
        body: Option<String>,
    },
    Text {
        text: String,
    },
    Call {
        phone: String,
    },
    Sms {
        phone: String,
        message: Option<String>,
    },
    Whatsapp {
        phone: String,
        message: Option<String>,
    },
    Wifi {
        ssid: String,
        password: Option<String>,
        encryption: WifiEncryption,
    },
    Vcard(VcardPayload),
    Event(EventPayload),
}

impl Payload {
    pub fn qr_type(&self) -> QrType {
        match self {
            Payload::Link { .. } => QrType::Link,
            Payload::Email { .. } => QrType::Email,
            Payload::Text { .. } => QrType::Text,
            Payload::Call { .. } => QrType::Call,
            Payload::Sms { .. } => QrType::Sms,
            Payload::Whatsapp { .. } => QrType::Whatsapp,
            Payload::Wifi { .. } => QrType::Wifi,
            Payload::Vcard(_) => QrType::Vcard,
            Payload::Event(_) => QrType::Event,
        }
    }
}

/// Root entity: one QR code with its payload and stored styling.
///
/// `qr_type` and `is_dynamic` never change after creation; everything in
/// `style` is mutable through edit.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct QrRecord {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub qr_type: QrType,
    pub is_dynamic: bool,
    pub payload: Payload,
    #[serde(default)]
    pub style: QrStyle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QrRecord {
    pub fn new(owner: Uuid, name: impl Into<String>, payload: Payload, is_dynamic: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            name: name.into(),
            qr_type: payload.qr_type(),
            is_dynamic,
            payload,
            style: QrStyle::default(),
            created_at: now,
            updated_at: now,
        }
    }
}
