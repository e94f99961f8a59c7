// src/models.rs
use std::fmt;

/// Everything needed for one call to the text-generation endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
}

/// Why an attempt at building a question was thrown away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Generation(String),
    Execution(String),
    NoOutput,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Generation(msg) => write!(f, "generation failed: {}", msg),
            FailureReason::Execution(msg) => write!(f, "execution failed: {}", msg),
            FailureReason::NoOutput => write!(f, "no output produced"),
        }
    }
}

/// A generated snippet together with the output it actually produced.
///
/// A challenge carrying a `failure` is never shown to the player.
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    pub code: Option<String>,
    pub expected_output: Option<String>,
    pub failure: Option<FailureReason>,
}

/// A challenge that passed validation and can be presented.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyChallenge {
    pub code: String,
    pub expected_output: String,
}

impl Challenge {
    pub fn ready(code: String, expected_output: String) -> Self {
        Self {
            code: Some(code),
            expected_output: Some(expected_output),
            failure: None,
        }
    }

    pub fn failed(code: Option<String>, reason: FailureReason) -> Self {
        Self {
            code,
            expected_output: None,
            failure: Some(reason),
        }
    }

    pub fn into_ready(self) -> Result<ReadyChallenge, FailureReason> {
        if let Some(reason) = self.failure {
            return Err(reason);
        }
        match (self.code, self.expected_output) {
            (Some(code), Some(expected_output)) => Ok(ReadyChallenge {
                code,
                expected_output,
            }),
            (None, _) => Err(FailureReason::Generation("no code returned".to_string())),
            (Some(_), None) => Err(FailureReason::NoOutput),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_messages() {
        assert_eq!(
            FailureReason::Execution("x is not defined".to_string()).to_string(),
            "execution failed: x is not defined"
        );
        assert_eq!(FailureReason::NoOutput.to_string(), "no output produced");
    }

    #[test]
    fn test_failed_challenge_is_never_ready() {
        let challenge = Challenge::failed(
            Some("console.log(y);".to_string()),
            FailureReason::Execution("y is not defined".to_string()),
        );
        assert_eq!(
            challenge.into_ready(),
            Err(FailureReason::Execution("y is not defined".to_string()))
        );
    }

    #[test]
    fn test_missing_output_counts_as_no_output() {
        let challenge = Challenge {
            code: Some("let a = 1;".to_string()),
            expected_output: None,
            failure: None,
        };
        assert_eq!(challenge.into_ready(), Err(FailureReason::NoOutput));
    }
}
