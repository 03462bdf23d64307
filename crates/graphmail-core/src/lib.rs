//! Core logic for GraphMail
//!
//! Provides settings, email storage, the mail service and the retrieval
//! scheduler.

mod config;
mod database;
mod error;
pub mod models;
mod scheduler;
mod service;

pub use config::Settings;
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use scheduler::{create_scheduler_channel, PeriodicJob, RetrievalScheduler, SchedulerCommand};
pub use service::MailService;
