//! Retrieval-augmented answering pipeline.
//!
//! Read path: question → query embedding → similarity search → prompt
//! assembly → generation. The retrieved chunk texts become the prompt's
//! context section; the question is passed through verbatim and the
//! generated text is returned untouched.
//!
//! Degraded-context policy: when retrieval returns nothing (empty store
//! or off-corpus question), generation still runs with an empty context
//! section — the template instructs the model to fall back to a generic
//! answer, keeping the endpoint available instead of failing.

use std::sync::Arc;

use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::generation::Generator;
use crate::models::{AnswerResult, ScoredDocument};
use crate::store::VectorStore;

/// Prompt template: context block plus the verbatim question. The
/// generic-answer clause is what makes the degraded-context policy work.
const PROMPT_TEMPLATE: &str = "You are a helpful bot. If you cannot answer based on the \
context provided, respond with a generic answer. Answer the question as truthfully as \
possible using the context below:\n{context}\n\nQuestion: {question}";

pub struct AnswerPipeline {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl AnswerPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn VectorStore>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            generator,
            store,
            top_k,
        }
    }

    /// Answer a question from retrieved context.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty or whitespace-only question,
    ///   rejected before any external call.
    /// - `Generation` when the embedding or generation capability fails
    ///   (embedding failures are folded into the generation kind at this
    ///   boundary; the caller sees one upstream-model error class).
    /// - `StoreConnection` when the store cannot be searched.
    pub async fn answer(&self, question: &str) -> Result<AnswerResult, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::invalid_input("question must not be empty"));
        }

        let query_vector = self
            .embedder
            .embed(question)
            .await
            .map_err(as_generation)?;

        let context = self
            .store
            .similarity_search(&query_vector, self.top_k)
            .await?;
        debug!(retrieved = context.len(), top_k = self.top_k, "context retrieved");

        let prompt = build_prompt(&context, question);
        let text = self
            .generator
            .generate(&prompt)
            .await
            .map_err(as_generation)?;

        info!(
            question_chars = question.len(),
            context_chunks = context.len(),
            "question answered"
        );
        Ok(AnswerResult { text })
    }
}

/// Fold embedding failures into the generation error kind: at the
/// answering boundary both are "the upstream model capability failed".
fn as_generation(err: PipelineError) -> PipelineError {
    match err {
        PipelineError::EmbeddingService { message, timed_out } => {
            PipelineError::Generation { message, timed_out }
        }
        other => other,
    }
}

/// Assemble the generation prompt from retrieved chunks and the verbatim
/// question. Zero chunks produce an empty context section, not an error.
fn build_prompt(context: &[ScoredDocument], question: &str) -> String {
    let context_text = context
        .iter()
        .map(|doc| doc.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    PROMPT_TEMPLATE
        .replace("{context}", &context_text)
        .replace("{question}", question)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, text: &str) -> ScoredDocument {
        ScoredDocument {
            id: id.to_string(),
            text: text.to_string(),
            score: 0.9,
        }
    }

    #[test]
    fn test_prompt_contains_context_and_question() {
        let prompt = build_prompt(
            &[hit("a", "The sky is blue."), hit("b", "Grass is green.")],
            "What color is the sky?",
        );
        assert!(prompt.contains("The sky is blue."));
        assert!(prompt.contains("Grass is green."));
        assert!(prompt.ends_with("Question: What color is the sky?"));
    }

    #[test]
    fn test_prompt_with_no_context_keeps_generic_fallback_clause() {
        let prompt = build_prompt(&[], "What is Rust?");
        assert!(prompt.contains("respond with a generic answer"));
        assert!(prompt.contains("Question: What is Rust?"));
    }

    #[test]
    fn test_embedding_errors_fold_into_generation_kind() {
        let folded = as_generation(PipelineError::embedding_timeout("slow"));
        assert_eq!(folded.code(), "generation");
        assert!(folded.is_timeout());

        let store = as_generation(PipelineError::store_connection("refused"));
        assert_eq!(store.code(), "store_connection");
    }
}
