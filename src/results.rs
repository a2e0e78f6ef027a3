//! The interim analytics record shared between pipeline steps.
//!
//! Only the pieces this step reads or writes are typed. Everything else is
//! carried through in flattened maps so a read/modify/write cycle leaves
//! the rest of the record untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key of the summary text inside `ConversationAnalytics.Summary`.
const SUMMARY_KEY: &str = "Summary";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConversationResult {
    #[serde(default)]
    pub conversation_analytics: ConversationAnalytics,
    #[serde(default)]
    pub speech_segments: Vec<SpeechSegment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConversationAnalytics {
    #[serde(default)]
    pub speaker_labels: Vec<SpeakerLabel>,
    #[serde(default)]
    pub summary: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationAnalytics {
    pub fn summary(&self) -> Option<&str> {
        self.summary.get(SUMMARY_KEY).and_then(Value::as_str)
    }

    pub fn set_summary(&mut self, text: impl Into<String>) {
        self.summary
            .insert(SUMMARY_KEY.to_string(), Value::String(text.into()));
    }
}

/// Maps a raw speaker label such as `spk_0` to a display name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeakerLabel {
    #[serde(rename = "Speaker")]
    pub speaker: String,
    #[serde(rename = "DisplayText")]
    pub display_text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One turn of speech.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeechSegment {
    #[serde(rename = "SegmentSpeaker")]
    pub segment_speaker: String,
    #[serde(rename = "DisplayText")]
    pub display_text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SpeakerLabel {
    pub fn new(speaker: impl Into<String>, display_text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            display_text: display_text.into(),
            extra: Map::new(),
        }
    }
}

impl SpeechSegment {
    pub fn new(segment_speaker: impl Into<String>, display_text: impl Into<String>) -> Self {
        Self {
            segment_speaker: segment_speaker.into(),
            display_text: display_text.into(),
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "ConversationAnalytics": {
                "SourceInformation": [{"TranscribeJobInfo": {"MediaFormat": "wav"}}],
                "SpeakerLabels": [
                    {"Speaker": "spk_0", "DisplayText": "Agent"},
                    {"Speaker": "spk_1", "DisplayText": "Customer"}
                ],
                "Summary": {"Topic": "billing"}
            },
            "SpeechSegments": [
                {
                    "SegmentStartTime": 0.5,
                    "SegmentSpeaker": "spk_0",
                    "DisplayText": "Hello, how can I help?",
                    "SentimentIsPositive": 1
                }
            ],
            "TranscribeJobName": "job-1"
        })
    }

    #[test]
    fn parse_interim_record() -> Result<(), serde_json::Error> {
        let result: ConversationResult = serde_json::from_value(sample())?;

        assert_eq!(
            result.conversation_analytics.speaker_labels[1].display_text,
            "Customer"
        );
        assert_eq!(result.speech_segments.len(), 1);
        assert_eq!(result.speech_segments[0].segment_speaker, "spk_0");
        assert_eq!(result.conversation_analytics.summary(), None);

        Ok(())
    }

    #[test]
    fn set_summary_keeps_unrelated_fields() -> Result<(), serde_json::Error> {
        let mut result: ConversationResult = serde_json::from_value(sample())?;
        result.conversation_analytics.set_summary("Caller asked about a bill.");

        let mut expected = sample();
        expected["ConversationAnalytics"]["Summary"]["Summary"] =
            json!("Caller asked about a bill.");

        assert_eq!(serde_json::to_value(&result)?, expected);
        assert_eq!(
            result.conversation_analytics.summary(),
            Some("Caller asked about a bill.")
        );

        Ok(())
    }

    #[test]
    fn missing_sections_default_to_empty() -> Result<(), serde_json::Error> {
        let result: ConversationResult = serde_json::from_value(json!({}))?;

        assert_eq!(result, ConversationResult::default());

        Ok(())
    }
}
