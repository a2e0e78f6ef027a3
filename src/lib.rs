//! Call summarization step for the post-call analytics pipeline.
//!
//! # How It Works
//!
//! Each invocation receives an [`Event`] naming an interim result object and:
//!
//! 1. Reads the [`ConversationResult`](results::ConversationResult) from the
//!    configured output bucket.
//! 2. Renders its speech segments into a `"<speaker>: <text>"` transcript,
//!    optionally truncated to `TOKEN_COUNT` tokens.
//! 3. Sends the transcript to the configured summarization backend
//!    (`SUMMARY_TYPE`: `DISABLED`, `SAGEMAKER` or `ANTHROPIC`).
//! 4. Stores the summary in `ConversationAnalytics.Summary.Summary` and
//!    writes the record back under the same key.
//! 5. Returns the event unchanged for the next pipeline step.
//!
//! A backend failure does not fail the step: the stored summary becomes a
//! fixed message naming the backend. Configuration and storage failures are
//! returned to the caller.
//!
//! # Configuration
//!
//! All settings are read from the environment; see [`config::Settings`] for
//! the variable names and defaults.

#[macro_use]
extern crate log;

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod results;
pub mod store;
pub mod summarize;
pub mod transcript;

pub use engine::{Engine, Event};
pub use error::Error;

use std::sync::Arc;

/// Run the step once, blocking until the record has been written back.
pub fn handler(event: Event) -> Result<Event, Error> {
    let config = config::Config::from_env()?;
    logging::init(config.log_level);

    info!("handler invoked for {}", event.interim_results_file);
    debug!("event: {:?}", event);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::Runtime)?;

    let store = store::FsStore::new(config.storage_root.clone());
    let engine = Engine::new(Arc::new(config), store);
    runtime.block_on(engine.run(event))
}
