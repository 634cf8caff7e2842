//! Outbound collaborators: transactional email and text generation.
//!
//! The pipeline only talks to these through the traits below, so tests and
//! local runs can swap in recording doubles.

use crate::error::Error;
use async_trait::async_trait;

pub mod gemini;
pub mod mailersend;

/// A fully rendered transactional email for a single recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub to_email: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Returns the provider's message id when it reports one.
    async fn send(&self, email: OutboundEmail) -> Result<Option<String>, Error>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String, Error>;
}
