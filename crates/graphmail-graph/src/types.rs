use serde::{Deserialize, Serialize};

/// Response wrapper for Graph API list endpoints
#[derive(Debug, Deserialize)]
pub struct GraphListResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// A message as returned by `GET /me/messages` with the retrieval `$select`
#[derive(Debug, Clone, Deserialize)]
pub struct GraphMessage {
    pub id: String,
    pub subject: Option<String>,
    pub sender: Option<GraphEmailWrapper>,
    #[serde(rename = "toRecipients", default)]
    pub to_recipients: Vec<GraphEmailWrapper>,
    #[serde(rename = "ccRecipients", default)]
    pub cc_recipients: Vec<GraphEmailWrapper>,
    #[serde(rename = "bccRecipients", default)]
    pub bcc_recipients: Vec<GraphEmailWrapper>,
    pub body: Option<GraphItemBody>,
    #[serde(rename = "receivedDateTime")]
    pub received_date_time: Option<String>,
}

impl GraphMessage {
    pub fn sender_address(&self) -> Option<&str> {
        self.sender.as_ref().and_then(|s| s.email_address.address.as_deref())
    }

    /// Whether the body is HTML (Graph reports `html` or `text`)
    pub fn is_html(&self) -> bool {
        self.body
            .as_ref()
            .map(|b| b.content_type.eq_ignore_ascii_case("html"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphEmailWrapper {
    #[serde(rename = "emailAddress")]
    pub email_address: GraphEmailAddress,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphEmailAddress {
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphItemBody {
    #[serde(rename = "contentType", default)]
    pub content_type: String,
    #[serde(default)]
    pub content: String,
}

/// Email message to send through `sendMail`
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

impl OutgoingMessage {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Add a To recipient
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Add a CC recipient
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    /// Add a BCC recipient
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    pub fn html(mut self, is_html: bool) -> Self {
        self.is_html = is_html;
        self
    }
}

#[derive(Serialize)]
pub(crate) struct SendMailRequest {
    pub message: SendMailMessage,
    #[serde(rename = "saveToSentItems")]
    pub save_to_sent_items: bool,
}

#[derive(Serialize)]
pub(crate) struct SendMailMessage {
    pub subject: String,
    pub body: SendMailBody,
    #[serde(rename = "toRecipients")]
    pub to_recipients: Vec<SendMailRecipient>,
    #[serde(rename = "ccRecipients", skip_serializing_if = "Vec::is_empty")]
    pub cc_recipients: Vec<SendMailRecipient>,
    #[serde(rename = "bccRecipients", skip_serializing_if = "Vec::is_empty")]
    pub bcc_recipients: Vec<SendMailRecipient>,
}

#[derive(Serialize)]
pub(crate) struct SendMailBody {
    #[serde(rename = "contentType")]
    pub content_type: &'static str,
    pub content: String,
}

#[derive(Serialize)]
pub(crate) struct SendMailRecipient {
    #[serde(rename = "emailAddress")]
    pub email_address: SendMailAddress,
}

#[derive(Serialize)]
pub(crate) struct SendMailAddress {
    pub address: String,
}
