//! CreoleCentric text-to-speech API client and webhook receiver.
//!
//! Two independent pieces share only the service's job id:
//!
//! - [`client::CreoleClient`] submits jobs and polls their status.
//! - [`webhook::WebhookReceiver`] ingests the service's progress
//!   notifications, keeps an ordered event log, and reconciles job state.
//!
//! # Quick Start
//!
//! ```no_run
//! use creolecentric::prelude::*;
//!
//! # async fn example() -> creolecentric::error::Result<()> {
//! let client = CreoleClient::from_env()?;
//! let job = client.create_job(&CreateJobRequest::new("Bonjou!")).await?;
//! let status = client.wait_for_job(&job.job_id, WaitOptions::default()).await?;
//! println!("{}", status.status);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod prelude;
pub mod types;
pub mod util;
pub mod webhook;

#[cfg(feature = "cli")]
pub mod cli;
