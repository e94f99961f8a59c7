// src/runner.rs
use crate::models::{Challenge, FailureReason, GenerationRequest};
use crate::providers::LlmProvider;
use crate::sandbox::{ExecutionOutcome, SandboxRunner};

/// Instructions sent to the model for every round.
pub const CHALLENGE_PROMPT: &str = r#"Generate a short JavaScript code snippet (between 5 and 10 lines long).
The code MUST use at least one loop (for or while) or one conditional (if/else) to calculate a final value in a variable (e.g., 'result' or 'outputValue').
The code MUST conclude with EXACTLY ONE console.log() statement AFTER all loops or conditionals, printing only the single final calculated value.
IMPORTANT: Do NOT attempt to access loop counter variables (like 'i') AFTER the loop has finished.
Do not include comments. Do not log anything inside loops.

Output ONLY the JavaScript code block. Nothing else."#;

/// Builds the request used to ask the model for a new snippet.
pub fn challenge_request(model: &str, temperature: f32) -> GenerationRequest {
    GenerationRequest {
        model: model.to_string(),
        prompt: CHALLENGE_PROMPT.to_string(),
        temperature,
    }
}

/// Generates one snippet, runs it, and packages the result as a `Challenge`.
///
/// Never retries: a failed attempt comes back as a challenge carrying a
/// `FailureReason` and the caller decides what to do next.
pub async fn produce_challenge<P: LlmProvider>(
    provider: &P,
    sandbox: &SandboxRunner,
    request: &GenerationRequest,
) -> Challenge {
    log::info!("Requesting code snippet from {}", request.model);

    let code = match provider.generate(request).await {
        Ok(code) => code,
        Err(e) => {
            log::warn!("Failed to get a valid code snippet: {}", e);
            return Challenge::failed(None, FailureReason::Generation(e.to_string()));
        }
    };

    log::debug!("Generated code:\n{}", code);

    let outcome = sandbox.run(&code).await;
    challenge_from_outcome(code, outcome)
}

fn challenge_from_outcome(code: String, outcome: ExecutionOutcome) -> Challenge {
    match outcome {
        ExecutionOutcome {
            error: Some(error), ..
        } => {
            log::info!("Code failed to execute: {}", error);
            Challenge::failed(Some(code), FailureReason::Execution(error))
        }
        ExecutionOutcome {
            output: Some(output),
            ..
        } => {
            log::info!("Code produced output: \"{}\"", output);
            Challenge::ready(code, output)
        }
        ExecutionOutcome { .. } => {
            log::info!("Code executed but produced no output via console.log()");
            Challenge::failed(Some(code), FailureReason::NoOutput)
        }
    }
}
