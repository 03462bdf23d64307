//! Send and retrieve-and-store operations

use crate::models::{EmailRecord, EmailSummary, SendEmailRequest};
use crate::{CoreResult, Database, PeriodicJob};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use graphmail_graph::GraphMailClient;
use std::sync::Arc;
use tracing::{info, warn};

/// Retrieval looks back this far on every run
const RETRIEVAL_WINDOW_HOURS: i64 = 24;

/// Maximum messages fetched per retrieval
const RETRIEVAL_PAGE_SIZE: u32 = 50;

pub struct MailService {
    graph: GraphMailClient,
    database: Arc<Database>,
}

impl MailService {
    pub fn new(graph: GraphMailClient, database: Arc<Database>) -> Self {
        Self { graph, database }
    }

    /// Validate and send an email through Graph
    pub async fn send_email(&self, request: &SendEmailRequest) -> CoreResult<()> {
        request.validate()?;
        self.graph.send_mail(&request.to_outgoing()).await?;
        info!("Email sent successfully to {:?}", request.to_recipients);
        Ok(())
    }

    /// Pull mail received in the last 24 hours and persist what is new.
    ///
    /// Returns a summary of every retrieved email, stored now or earlier.
    pub async fn retrieve_emails(&self) -> CoreResult<Vec<EmailSummary>> {
        let now = Utc::now();
        let since = now - Duration::hours(RETRIEVAL_WINDOW_HOURS);
        let messages = self
            .graph
            .list_messages_since(since, RETRIEVAL_PAGE_SIZE)
            .await?;

        let records: Vec<EmailRecord> = messages
            .iter()
            .filter_map(|message| {
                let record = EmailRecord::from_graph(message, now);
                if record.is_none() {
                    warn!("Skipping message {} without receivedDateTime", message.id);
                }
                record
            })
            .collect();

        let inserted = self.database.store_emails(&records).await?;
        info!(
            "Retrieved {} emails from the past {} hours, {} new",
            records.len(),
            RETRIEVAL_WINDOW_HOURS,
            inserted
        );

        Ok(records
            .iter()
            .map(|record| EmailSummary::from_record(record, "Email retrieved and stored"))
            .collect())
    }

    /// Stored emails, newest first
    pub async fn list_stored(&self, limit: i64, offset: i64) -> CoreResult<Vec<EmailSummary>> {
        let records = self.database.list_emails(limit, offset).await?;
        Ok(records
            .iter()
            .map(|record| EmailSummary::from_record(record, "Email stored"))
            .collect())
    }
}

#[async_trait]
impl PeriodicJob for MailService {
    async fn run_once(&self) -> CoreResult<usize> {
        Ok(self.retrieve_emails().await?.len())
    }
}
