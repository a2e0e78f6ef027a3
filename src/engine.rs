use crate::{
    config::Config,
    error::Error,
    store::ResultStore,
    summarize::Summarizer,
    transcript,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// The step's input, handed on unchanged to the next pipeline step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "interimResultsFile")]
    pub interim_results_file: String,
    /// Routing metadata this step does not interpret (bucket, job name,
    /// input type, API mode, transcription status, ...).
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Event {
    pub fn new(interim_results_file: impl Into<String>) -> Self {
        Self {
            interim_results_file: interim_results_file.into(),
            metadata: Map::new(),
        }
    }
}

/// The summarize step.
pub struct Engine<S> {
    config: Arc<Config>,
    store: S,
    summarizer: Summarizer,
}

impl<S: ResultStore> Engine<S> {
    pub fn new(config: Arc<Config>, store: S) -> Self {
        let summarizer = Summarizer::new(config.backend.clone());
        Self::with_summarizer(config, store, summarizer)
    }

    pub fn with_summarizer(config: Arc<Config>, store: S, summarizer: Summarizer) -> Self {
        Self {
            config,
            store,
            summarizer,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Summarize the interim result named by `event` and write it back.
    ///
    /// Only configuration and storage problems are returned as errors; a
    /// failing backend still results in a written record.
    pub async fn run(&self, event: Event) -> Result<Event, Error> {
        let bucket = &self.config.output_bucket;
        let key = &event.interim_results_file;
        info!("Summarizing {}/{}", bucket, key);

        let mut result = self.store.read(bucket, key)?;

        let transcript = transcript::assemble(&result, self.config.token_count);
        let summary = self.summarizer.summarize(&transcript).await;
        if summary.is_failure() {
            warn!("Storing failure summary for {}", key);
        }

        result.conversation_analytics.set_summary(summary.text());
        info!("Summary: {}", summary);

        self.store.write(bucket, key, &result)?;

        Ok(event)
    }
}
