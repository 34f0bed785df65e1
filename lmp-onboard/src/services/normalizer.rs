//! Payload normalizer
//!
//! Each outreach provider posts a differently shaped JSON body. This module
//! maps the known shapes, `outreach` (nested objects) and `replyio` (flat
//! fields), onto the one canonical [`EmailEvent`], and falls back to
//! probing common field names for anything else. Parsing is total: optional
//! fields get defaults, unknown extras are dropped. The only hard
//! requirement is a sender address and a text body; a payload without both
//! is rejected before any log row exists.

use chrono::{DateTime, Utc};
use lmp_common::{Error, Result};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{CampaignInfo, EmailContent, EmailEvent, EmailMessage, EventMetadata};

/// Normalize a provider payload into the canonical event.
pub fn normalize(provider: &str, payload: &Value) -> Result<EmailEvent> {
    let event = match provider {
        "outreach" => from_outreach(payload),
        "replyio" => from_replyio(payload),
        _ => from_generic(payload),
    };

    validate(event)
}

/// Nested shape: `{event_id, campaign{id,name,type}, message{from_email,
/// to_email, subject, received_at, text, html}, thread{id, reply_count,
/// auto_reply}}`
fn from_outreach(payload: &Value) -> EmailEvent {
    let campaign = &payload["campaign"];
    let message = &payload["message"];
    let thread = &payload["thread"];

    EmailEvent {
        event_id: str_or_uuid(&payload["event_id"]),
        campaign: CampaignInfo {
            id: opt_string(&campaign["id"]),
            name: opt_string(&campaign["name"]),
            campaign_type: opt_string(&campaign["type"]),
        },
        email: EmailMessage {
            from: opt_string(&message["from_email"]).unwrap_or_default(),
            to: opt_string(&message["to_email"]),
            subject: opt_string(&message["subject"]),
            received_at: parse_time(&message["received_at"]),
            content: EmailContent {
                text: opt_string(&message["text"]).unwrap_or_default(),
                html: opt_string(&message["html"]),
            },
        },
        metadata: EventMetadata {
            thread_id: opt_string(&thread["id"]),
            reply_count: thread["reply_count"].as_u64().unwrap_or(0) as u32,
            is_auto_reply: thread["auto_reply"].as_bool().unwrap_or(false),
        },
    }
}

/// Flat shape: `{id, campaign_id, campaign_name, campaign_type, from, to,
/// subject, text_body, html_body, sent_at, thread_id, reply_count,
/// is_auto_reply}`
fn from_replyio(payload: &Value) -> EmailEvent {
    EmailEvent {
        event_id: str_or_uuid(&payload["id"]),
        campaign: CampaignInfo {
            id: opt_string(&payload["campaign_id"]),
            name: opt_string(&payload["campaign_name"]),
            campaign_type: opt_string(&payload["campaign_type"]),
        },
        email: EmailMessage {
            from: opt_string(&payload["from"]).unwrap_or_default(),
            to: opt_string(&payload["to"]),
            subject: opt_string(&payload["subject"]),
            received_at: parse_time(&payload["sent_at"]),
            content: EmailContent {
                text: opt_string(&payload["text_body"]).unwrap_or_default(),
                html: opt_string(&payload["html_body"]),
            },
        },
        metadata: EventMetadata {
            thread_id: opt_string(&payload["thread_id"]),
            reply_count: payload["reply_count"].as_u64().unwrap_or(0) as u32,
            is_auto_reply: payload["is_auto_reply"].as_bool().unwrap_or(false),
        },
    }
}

/// Unknown providers: try the field names seen in the wild.
fn from_generic(payload: &Value) -> EmailEvent {
    let from = first_string(payload, &["from", "from_email", "sender", "sender_email"]);
    let text = first_string(payload, &["text", "text_body", "body", "content", "plain"]);

    EmailEvent {
        event_id: str_or_uuid(&payload["event_id"]),
        campaign: CampaignInfo {
            id: first_string(payload, &["campaign_id"]),
            name: first_string(payload, &["campaign_name", "campaign"]),
            campaign_type: first_string(payload, &["campaign_type"]),
        },
        email: EmailMessage {
            from: from.unwrap_or_default(),
            to: first_string(payload, &["to", "to_email", "recipient"]),
            subject: first_string(payload, &["subject"]),
            received_at: parse_time(&payload["received_at"]),
            content: EmailContent {
                text: text.unwrap_or_default(),
                html: first_string(payload, &["html", "html_body"]),
            },
        },
        metadata: EventMetadata::default(),
    }
}

fn validate(event: EmailEvent) -> Result<EmailEvent> {
    if event.email.from.trim().is_empty() {
        return Err(Error::InvalidInput(
            "Payload has no sender email".to_string(),
        ));
    }
    if !event.email.from.contains('@') {
        return Err(Error::InvalidInput(format!(
            "Sender is not an email address: {}",
            event.email.from
        )));
    }
    if event.email.content.text.trim().is_empty() {
        return Err(Error::InvalidInput(
            "Payload has no text body".to_string(),
        ));
    }
    Ok(event)
}

fn opt_string(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_string(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| opt_string(&payload[*k]))
}

fn str_or_uuid(v: &Value) -> String {
    opt_string(v).unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Missing or unparsable provider timestamps default to arrival time.
fn parse_time(v: &Value) -> DateTime<Utc> {
    v.as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}
