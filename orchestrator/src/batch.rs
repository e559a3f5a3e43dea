//! Batch driver over a JSONL dataset
//!
//! Each input line holds a `text` field, either one string or a list of
//! documents. Example `i` is written to `output_{i}.json` once its pipeline
//! completes; examples whose output already exists are skipped. A failed
//! example is logged and leaves no file behind.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::{QagPipeline, QagResult};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The `text` field of an input line
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ContextText {
    Single(String),
    Documents(Vec<String>),
}

impl ContextText {
    /// Pipeline input: a single string as is, documents framed and numbered from 1
    pub fn prepare(&self) -> String {
        match self {
            Self::Single(text) => text.clone(),
            Self::Documents(docs) => docs
                .iter()
                .enumerate()
                .map(|(i, doc)| format!("Document {}:\n{}\n\n", i + 1, doc))
                .collect::<String>()
                .trim()
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InputLine {
    text: ContextText,
}

/// Parse JSONL content into prepared contexts, ignoring blank lines
pub fn parse_examples(content: &str) -> Result<Vec<String>, BatchError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<InputLine>(line)
                .map(|input| input.text.prepare())
                .map_err(|e| BatchError::Parse {
                    line: i + 1,
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Read and parse a JSONL dataset
pub fn load_examples(path: &Path) -> Result<Vec<String>, BatchError> {
    let content = std::fs::read_to_string(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_examples(&content)
}

pub fn output_path(output_dir: &Path, index: usize) -> PathBuf {
    output_dir.join(format!("output_{}.json", index))
}

/// Pretty JSON with four-space indentation
pub fn to_pretty_json(result: &QagResult) -> Result<Vec<u8>, BatchError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    result.serialize(&mut serializer)?;
    Ok(buf)
}

pub fn write_result(path: &Path, result: &QagResult) -> Result<(), BatchError> {
    let bytes = to_pretty_json(result)?;
    let io_err = |source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::create(path).map_err(io_err)?;
    file.write_all(&bytes).map_err(io_err)?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExampleOutcome {
    Processed,
    Skipped,
    Failed(String),
}

/// Tally of one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    /// Example index and error message
    pub failed: Vec<(usize, String)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed.len()
    }
}

pub struct BatchRunner {
    pipeline: Arc<QagPipeline>,
    output_dir: PathBuf,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<QagPipeline>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            output_dir: output_dir.into(),
            concurrency: 1,
        }
    }

    /// Examples run at once; 1 processes them strictly in order
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run every example, writing results into the output directory
    pub async fn run(&self, examples: Vec<String>) -> Result<BatchSummary, BatchError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| BatchError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        tracing::info!(
            examples = examples.len(),
            concurrency = self.concurrency,
            output_dir = %self.output_dir.display(),
            "Starting batch"
        );

        let outcomes: Vec<(usize, ExampleOutcome)> = stream::iter(examples.into_iter().enumerate())
            .map(|(index, context)| async move { (index, self.process(index, &context).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = BatchSummary::default();
        for (index, outcome) in outcomes {
            match outcome {
                ExampleOutcome::Processed => summary.processed += 1,
                ExampleOutcome::Skipped => summary.skipped += 1,
                ExampleOutcome::Failed(reason) => summary.failed.push((index, reason)),
            }
        }
        summary.failed.sort_by_key(|(index, _)| *index);

        tracing::info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            "Batch complete"
        );
        Ok(summary)
    }

    async fn process(&self, index: usize, context: &str) -> ExampleOutcome {
        let path = output_path(&self.output_dir, index);
        if path.exists() {
            tracing::info!("{} exists, skipping", path.display());
            return ExampleOutcome::Skipped;
        }

        let result = match self.pipeline.run(context).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(example = index, "Example failed: {}", e);
                return ExampleOutcome::Failed(e.to_string());
            }
        };

        match write_result(&path, &result) {
            Ok(()) => {
                tracing::info!(
                    example = index,
                    questions = result.questions.len(),
                    "Wrote {}",
                    path.display()
                );
                ExampleOutcome::Processed
            }
            Err(e) => {
                tracing::error!(example = index, "Failed to write result: {}", e);
                ExampleOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AnswerRecord;

    #[test]
    fn test_prepare_single_text() {
        let text = ContextText::Single("City Y is the capital.".to_string());
        assert_eq!(text.prepare(), "City Y is the capital.");
    }

    #[test]
    fn test_prepare_documents() {
        let text = ContextText::Documents(vec!["First doc.".to_string(), "Second doc.".to_string()]);
        assert_eq!(
            text.prepare(),
            "Document 1:\nFirst doc.\n\nDocument 2:\nSecond doc."
        );
    }

    #[test]
    fn test_parse_examples() {
        let content = r#"{"text": "one"}

{"text": ["a", "b"], "id": 7}
"#;
        let examples = parse_examples(content).unwrap();

        assert_eq!(examples, vec!["one".to_string(), "Document 1:\na\n\nDocument 2:\nb".to_string()]);
    }

    #[test]
    fn test_parse_error_names_line() {
        let content = "{\"text\": \"ok\"}\n{\"body\": \"missing text\"}\n";

        match parse_examples(content).unwrap_err() {
            BatchError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let result = QagResult {
            context: "ctx".to_string(),
            questions: vec!["Q?".to_string()],
            answers: vec![AnswerRecord {
                answer: "A".to_string(),
                explanation: "E".to_string(),
            }],
        };

        let json = String::from_utf8(to_pretty_json(&result).unwrap()).unwrap();

        assert!(json.starts_with("{\n    \"context\": \"ctx\",\n    \"questions\": [\n        \"Q?\"\n    ],"));
        let parsed: QagResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_output_path() {
        assert_eq!(output_path(Path::new("out"), 3), PathBuf::from("out/output_3.json"));
    }
}
