//! Shared state threaded through one pipeline run
//!
//! - Conversation log: append-only, reset only by the answer phase
//! - Question set: ordered, duplicate-free, changed only through [`QuestionUpdate`]
//! - Answer list: grows by one record per accepted answer, aligned with questions by position

use serde::{Deserialize, Serialize};

use qag_agent::llm::{ChatMessage, ConversationLog};

/// Change to the question set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionUpdate {
    /// Append items not already present, in batch order
    Add(Vec<String>),
    /// Drop every item equal to an entry of the batch
    Remove(Vec<String>),
}

/// Pure reducer for the question set
pub fn reduce_questions(existing: &[String], update: &QuestionUpdate) -> Vec<String> {
    match update {
        QuestionUpdate::Add(batch) => {
            let mut merged = existing.to_vec();
            for item in batch {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            merged
        }
        QuestionUpdate::Remove(batch) => existing
            .iter()
            .filter(|item| !batch.contains(item))
            .cloned()
            .collect(),
    }
}

/// Ordered set of generated questions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionSet(Vec<String>);

impl QuestionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `update`, returning how many questions were added or removed
    pub fn apply(&mut self, update: QuestionUpdate) -> usize {
        let before = self.0.len();
        self.0 = reduce_questions(&self.0, &update);
        before.abs_diff(self.0.len())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    /// One `- {question}` line per entry
    pub fn bulleted(&self) -> String {
        self.0
            .iter()
            .map(|q| format!("- {}", q))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<String>> for QuestionSet {
    fn from(items: Vec<String>) -> Self {
        let mut set = Self::new();
        set.apply(QuestionUpdate::Add(items));
        set
    }
}

/// Accepted answer for the question at the same position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub answer: String,
    pub explanation: String,
}

/// State owned by one phase of a pipeline run
#[derive(Debug, Clone, Default)]
pub struct OverallState {
    pub log: ConversationLog,
    pub questions: QuestionSet,
    pub answers: Vec<AnswerRecord>,
}

impl OverallState {
    /// Fresh state whose log holds only the context preamble
    pub fn seeded(context: &str) -> Self {
        let mut log = ConversationLog::new();
        log.push(ChatMessage::user(format!("### Context:\n\n{}", context.trim())));
        Self {
            log,
            ..Self::default()
        }
    }

    /// Index of the first question without an answer, if any
    pub fn next_unanswered(&self) -> Option<usize> {
        (self.answers.len() < self.questions.len()).then_some(self.answers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_skips_duplicates_and_keeps_order() {
        let mut set = QuestionSet::from(strings(&["a", "b"]));

        let added = set.apply(QuestionUpdate::Add(strings(&["c", "a", "d", "c"])));

        assert_eq!(added, 2);
        assert_eq!(set.as_slice(), strings(&["a", "b", "c", "d"]).as_slice());
    }

    #[test]
    fn test_add_sequence_never_duplicates() {
        let batches = [
            strings(&["q1"]),
            strings(&["q1", "q2"]),
            strings(&["q3", "q2", "q3"]),
            strings(&[]),
            strings(&["q1", "q4"]),
        ];
        let mut set = QuestionSet::new();
        let mut seen_positions: Vec<(String, usize)> = Vec::new();

        for batch in batches {
            set.apply(QuestionUpdate::Add(batch));

            let mut sorted = set.as_slice().to_vec();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted.len(), set.len());

            // Existing items never move
            for (item, pos) in &seen_positions {
                assert_eq!(set.get(*pos), Some(item.as_str()));
            }
            seen_positions = set.iter().enumerate().map(|(i, q)| (q.to_string(), i)).collect();
        }

        assert_eq!(set.as_slice(), strings(&["q1", "q2", "q3", "q4"]).as_slice());
    }

    #[test]
    fn test_remove_preserves_survivor_order() {
        let mut set = QuestionSet::from(strings(&["a", "b", "c", "d", "e"]));

        let removed = set.apply(QuestionUpdate::Remove(strings(&["d", "b", "zzz"])));

        assert_eq!(removed, 2);
        assert_eq!(set.as_slice(), strings(&["a", "c", "e"]).as_slice());
    }

    #[test]
    fn test_remove_on_empty_set_is_noop() {
        let mut set = QuestionSet::new();
        assert_eq!(set.apply(QuestionUpdate::Remove(strings(&["a"]))), 0);
        assert!(set.is_empty());
    }

    #[test]
    fn test_reducer_is_pure() {
        let existing = strings(&["a", "b"]);
        let merged = reduce_questions(&existing, &QuestionUpdate::Add(strings(&["c"])));

        assert_eq!(existing, strings(&["a", "b"]));
        assert_eq!(merged, strings(&["a", "b", "c"]));
    }

    #[test]
    fn test_bulleted() {
        let set = QuestionSet::from(strings(&["Why?", "How?"]));
        assert_eq!(set.bulleted(), "- Why?\n- How?");
        assert_eq!(QuestionSet::new().bulleted(), "");
    }

    #[test]
    fn test_seeded_state() {
        let state = OverallState::seeded("  City Y is the capital.\n\n");

        assert_eq!(state.log.len(), 1);
        assert_eq!(
            state.log.get(0).unwrap().content,
            "### Context:\n\nCity Y is the capital."
        );
        assert!(state.questions.is_empty());
        assert_eq!(state.next_unanswered(), None);
    }

    #[test]
    fn test_next_unanswered() {
        let mut state = OverallState::seeded("ctx");
        state.questions.apply(QuestionUpdate::Add(strings(&["q1", "q2"])));
        assert_eq!(state.next_unanswered(), Some(0));

        state.answers.push(AnswerRecord {
            answer: "a".into(),
            explanation: "e".into(),
        });
        assert_eq!(state.next_unanswered(), Some(1));
    }
}
