//! Summarization backends and the dispatcher that picks between them.

pub mod anthropic;
pub mod sagemaker;
mod sigv4;

use crate::config::Backend;
use std::{borrow::Cow, fmt};

/// Stored when summarization is turned off.
pub const DISABLED_TEXT: &str = "Summarization disabled.";

/// Stored when a backend answered but produced nothing.
pub const NO_SUMMARY_TEXT: &str = "No summary";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Sagemaker,
    Anthropic,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Provider::Sagemaker => f.write_str("Sagemaker"),
            Provider::Anthropic => f.write_str("Anthropic"),
        }
    }
}

/// Errors raised while talking to a backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A backend call that failed, tagged with the provider it was made to.
#[derive(Debug, thiserror::Error)]
#[error("{provider} summarization failed: {source}")]
pub struct Failure {
    pub provider: Provider,
    #[source]
    pub source: Error,
}

/// What ends up in the record's summary field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Summary {
    Generated(String),
    Empty,
    Disabled,
    Failed(Provider),
}

impl Summary {
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Summary::Generated(text) => Cow::Borrowed(text),
            Summary::Empty => Cow::Borrowed(NO_SUMMARY_TEXT),
            Summary::Disabled => Cow::Borrowed(DISABLED_TEXT),
            Summary::Failed(provider) => Cow::Owned(format!(
                "An error occurred generating a {} summary.",
                provider
            )),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Summary::Failed(_))
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Dispatches a transcript to the configured backend.
#[derive(Clone, Debug)]
pub struct Summarizer {
    backend: Backend,
    client: reqwest::Client,
}

impl Summarizer {
    pub fn new(backend: Backend) -> Self {
        Self::with_client(backend, reqwest::Client::new())
    }

    pub fn with_client(backend: Backend, client: reqwest::Client) -> Self {
        Self { backend, client }
    }

    /// Call the backend, reporting failures to the caller.
    pub async fn try_summarize(&self, transcript: &str) -> Result<Summary, Failure> {
        match &self.backend {
            Backend::Disabled => Ok(Summary::Disabled),
            Backend::Sagemaker(config) => sagemaker::summarize(&self.client, config, transcript)
                .await
                .map_err(|source| Failure {
                    provider: Provider::Sagemaker,
                    source,
                }),
            Backend::Anthropic(config) => anthropic::summarize(&self.client, config, transcript)
                .await
                .map_err(|source| Failure {
                    provider: Provider::Anthropic,
                    source,
                }),
        }
    }

    /// Call the backend. A failure becomes [`Summary::Failed`] and is logged;
    /// it never reaches the caller.
    pub async fn summarize(&self, transcript: &str) -> Summary {
        match self.try_summarize(transcript).await {
            Ok(summary) => summary,
            Err(failure) => {
                error!("{}", failure);
                Summary::Failed(failure.provider)
            }
        }
    }
}
