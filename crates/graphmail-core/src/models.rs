//! Email data models: what is stored, what is returned, what is sent

use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use graphmail_graph::{GraphEmailWrapper, GraphMessage, OutgoingMessage};
use lettre::Address;
use serde::{Deserialize, Serialize};

/// A retrieved email as persisted locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRecord {
    /// Provider message id, unique per mailbox
    pub email_id: String,
    pub subject: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub cc_recipients: Vec<String>,
    pub bcc_recipients: Vec<String>,
    pub body: String,
    pub is_html: bool,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl EmailRecord {
    /// Convert a Graph message. Returns `None` when the message carries no
    /// usable `receivedDateTime`.
    pub fn from_graph(message: &GraphMessage, created_at: DateTime<Utc>) -> Option<Self> {
        let received_at = message
            .received_date_time
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())?
            .with_timezone(&Utc);

        Some(Self {
            email_id: message.id.clone(),
            subject: message.subject.clone().unwrap_or_default(),
            sender: message.sender_address().unwrap_or_default().to_string(),
            recipients: addresses(&message.to_recipients),
            cc_recipients: addresses(&message.cc_recipients),
            bcc_recipients: addresses(&message.bcc_recipients),
            body: message
                .body
                .as_ref()
                .map(|b| b.content.clone())
                .unwrap_or_default(),
            is_html: message.is_html(),
            received_at,
            created_at,
        })
    }
}

fn addresses(wrappers: &[GraphEmailWrapper]) -> Vec<String> {
    wrappers
        .iter()
        .map(|w| w.email_address.address.clone().unwrap_or_default())
        .collect()
}

/// Email data returned to API callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSummary {
    pub message: Option<String>,
    pub email_id: Option<String>,
    pub subject: Option<String>,
    pub sender: Option<String>,
    pub received_datetime: Option<DateTime<Utc>>,
    pub body: Option<String>,
}

impl EmailSummary {
    pub fn from_record(record: &EmailRecord, message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            email_id: Some(record.email_id.clone()),
            subject: Some(record.subject.clone()),
            sender: Some(record.sender.clone()),
            received_datetime: Some(record.received_at),
            body: Some(record.body.clone()),
        }
    }
}

/// Body of `POST /api/email/send`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailRequest {
    pub to_recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub cc_recipients: Vec<String>,
    #[serde(default)]
    pub bcc_recipients: Vec<String>,
    #[serde(default)]
    pub is_html: bool,
}

impl SendEmailRequest {
    /// Structural checks: at least one recipient, every address well formed
    pub fn validate(&self) -> CoreResult<()> {
        if self.to_recipients.is_empty() {
            return Err(CoreError::ValidationError(
                "to_recipients must contain at least one address".to_string(),
            ));
        }

        let all = self
            .to_recipients
            .iter()
            .chain(&self.cc_recipients)
            .chain(&self.bcc_recipients);
        for address in all {
            address.parse::<Address>().map_err(|e| {
                CoreError::ValidationError(format!("invalid email address {:?}: {}", address, e))
            })?;
        }

        Ok(())
    }

    pub fn to_outgoing(&self) -> OutgoingMessage {
        OutgoingMessage {
            to: self.to_recipients.clone(),
            cc: self.cc_recipients.clone(),
            bcc: self.bcc_recipients.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            is_html: self.is_html,
        }
    }
}
