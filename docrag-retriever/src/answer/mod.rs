//! Answer synthesis from retrieved chunks
//!
//! [`Answerer`] turns a question and its ranked chunks into a single prompt
//! and asks a [`ChatProvider`] once. It never fails: an empty context or a
//! model error produce fixed fallback answers.

use crate::retrieval::ScoredChunk;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod openai;

pub use openai::OpenAiChat;

/// Returned when retrieval produced no chunks.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found in the database.";
/// Returned when the language model call fails.
pub const ANSWER_ERROR: &str = "Error generating answer.";
/// Subject used in the instruction line unless configured otherwise.
pub const DEFAULT_DOMAIN: &str = "document";

/// A text-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send `prompt` and return the model's reply.
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

#[derive(Clone)]
pub struct Answerer {
    chat: Arc<dyn ChatProvider>,
    domain: String,
}

impl Answerer {
    pub fn new(chat: Arc<dyn ChatProvider>) -> Self {
        Self {
            chat,
            domain: DEFAULT_DOMAIN.to_string(),
        }
    }

    /// Subject named in the instruction line, e.g. "recipe".
    pub fn with_domain(self, domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..self
        }
    }

    /// Build the prompt for `query` over `chunks`, in rank order.
    pub fn build_prompt(&self, query: &str, chunks: &[ScoredChunk]) -> String {
        let context = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("Context {}:\n{}", i + 1, chunk.record.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "You are a helpful assistant specialized in {} questions. Use the context to provide clear and accurate answers.\n\n{}\n\nUser Query: {}\n\nYour Answer:",
            self.domain, context, query
        )
    }

    /// Answer `query` from `chunks` with exactly one model call.
    pub async fn generate(&self, query: &str, chunks: &[ScoredChunk]) -> String {
        if chunks.is_empty() {
            tracing::info!("No context chunks, skipping answer generation");
            return NO_RELEVANT_INFORMATION.to_string();
        }

        let prompt = self.build_prompt(query, chunks);
        tracing::info!(
            "Generating answer with {} from {} chunks",
            self.chat.model_name(),
            chunks.len()
        );
        match self.chat.complete(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Answer generation failed: {:#}", e);
                ANSWER_ERROR.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ChunkRecord;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    struct MockChat {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl MockChat {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl ChatProvider for MockChat {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                anyhow::bail!("rate limited");
            }
            Ok("Use more garlic.".to_string())
        }

        fn model_name(&self) -> &str {
            "mock-chat"
        }
    }

    fn scored(id: i64, text: &str) -> ScoredChunk {
        ScoredChunk {
            record: ChunkRecord {
                id,
                text: text.to_string(),
                embedding: vec![1.0],
                source_file: "doc.pdf".to_string(),
                split_strategy: "fixed_size_600_60".to_string(),
                created_at: chrono::NaiveDateTime::default(),
            },
            score: 1.0,
        }
    }

    #[test]
    fn test_prompt_layout() {
        let answerer = Answerer::new(MockChat::new(false)).with_domain("recipe");
        let prompt = answerer.build_prompt(
            "How do I make rice?",
            &[scored(1, "Rinse the rice."), scored(2, "Boil for 12 minutes.")],
        );
        assert_eq!(
            prompt,
            "You are a helpful assistant specialized in recipe questions. Use the context to provide clear and accurate answers.\n\n\
             Context 1:\nRinse the rice.\n\n\
             Context 2:\nBoil for 12 minutes.\n\n\
             User Query: How do I make rice?\n\n\
             Your Answer:"
        );
    }

    #[tokio::test]
    async fn test_empty_context_skips_model() {
        let chat = MockChat::new(false);
        let answerer = Answerer::new(chat.clone());

        let answer = answerer.generate("anything", &[]).await;

        assert_eq!(answer, NO_RELEVANT_INFORMATION);
        assert!(chat.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_model_call() {
        let chat = MockChat::new(false);
        let answerer = Answerer::new(chat.clone());

        let answer = answerer.generate("q", &[scored(1, "a"), scored(2, "b")]).await;

        assert_eq!(answer, "Use more garlic.");
        assert_eq!(chat.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_model_failure_returns_fallback() {
        let answerer = Answerer::new(MockChat::new(true));

        let answer = answerer.generate("q", &[scored(1, "a")]).await;

        assert_eq!(answer, ANSWER_ERROR);
        assert!(logs_contain("rate limited"));
    }
}
