// src/providers/mod.rs

use crate::errors::Result;
use crate::models::GenerationRequest;

pub mod ollama;

/// A common trait for text-generation backends.
///
/// The game only ships an Ollama implementation; the trait is the seam that
/// lets the round orchestrator be driven by a scripted provider in tests.
///
/// Note: We're not using async_trait here, so implementers must handle async directly.
pub trait LlmProvider: Send + Sync {
    /// Generates text for the given request.
    ///
    /// # Returns
    /// The cleaned generated text, or a tagged `QuizError` describing why
    /// generation failed. Implementations must not retry.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}
