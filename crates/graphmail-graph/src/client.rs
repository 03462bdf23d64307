use crate::error::{GraphError, GraphResult};
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use graphmail_auth::AccessTokenSource;
use std::sync::Arc;
use tracing::{debug, info};

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Message fields needed to persist a retrieved email
const MESSAGE_SELECT: &str =
    "id,subject,sender,toRecipients,ccRecipients,bccRecipients,body,receivedDateTime";

/// Where mail is sent and read from
#[derive(Debug, Clone)]
pub struct GraphEndpoints {
    pub send_mail_url: String,
    pub messages_url: String,
}

impl Default for GraphEndpoints {
    fn default() -> Self {
        Self {
            send_mail_url: format!("{}/me/sendMail", GRAPH_BASE),
            messages_url: format!("{}/me/messages", GRAPH_BASE),
        }
    }
}

/// Graph mail client. Asks the token source for a bearer token once per
/// API call and never caches it.
pub struct GraphMailClient {
    client: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
    endpoints: GraphEndpoints,
}

impl GraphMailClient {
    pub fn new(tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self::with_endpoints(tokens, GraphEndpoints::default())
    }

    pub fn with_endpoints(tokens: Arc<dyn AccessTokenSource>, endpoints: GraphEndpoints) -> Self {
        Self {
            client: reqwest::Client::new(),
            tokens,
            endpoints,
        }
    }

    /// Send a message via `POST /me/sendMail`, saving it to Sent Items
    pub async fn send_mail(&self, message: &OutgoingMessage) -> GraphResult<()> {
        let request = build_send_request(message);
        let access_token = self.tokens.access_token().await?;
        debug!(
            "Graph: sendMail to={:?} cc={} bcc={}",
            message.to,
            message.cc.len(),
            message.bcc.len()
        );

        let response = self
            .client
            .post(&self.endpoints.send_mail_url)
            .bearer_auth(&access_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        info!("Graph: email sent to {:?} (status {})", message.to, status);
        Ok(())
    }

    /// List messages received at or after `since`, newest page only
    pub async fn list_messages_since(
        &self,
        since: DateTime<Utc>,
        top: u32,
    ) -> GraphResult<Vec<GraphMessage>> {
        let filter = format!(
            "receivedDateTime ge {}",
            since.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let top = top.to_string();
        let access_token = self.tokens.access_token().await?;
        debug!("Graph: listing messages filter='{}' top={}", filter, top);

        let response = self
            .client
            .get(&self.endpoints.messages_url)
            .bearer_auth(&access_token)
            .query(&[
                ("$filter", filter.as_str()),
                ("$select", MESSAGE_SELECT),
                ("$top", top.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::ApiError { status, body });
        }

        let list: GraphListResponse<GraphMessage> = response
            .json()
            .await
            .map_err(|e| GraphError::ParseError(e.to_string()))?;

        info!(
            "Graph: retrieved {} messages, has_more={}",
            list.value.len(),
            list.next_link.is_some()
        );
        Ok(list.value)
    }
}

fn recipients(addresses: &[String]) -> Vec<SendMailRecipient> {
    addresses
        .iter()
        .filter(|addr| !addr.is_empty())
        .map(|addr| SendMailRecipient {
            email_address: SendMailAddress {
                address: addr.clone(),
            },
        })
        .collect()
}

fn build_send_request(message: &OutgoingMessage) -> SendMailRequest {
    SendMailRequest {
        message: SendMailMessage {
            subject: message.subject.clone(),
            body: SendMailBody {
                content_type: if message.is_html { "html" } else { "text" },
                content: message.body.clone(),
            },
            to_recipients: recipients(&message.to),
            cc_recipients: recipients(&message.cc),
            bcc_recipients: recipients(&message.bcc),
        },
        save_to_sent_items: true,
    }
}
