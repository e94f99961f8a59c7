// src/session.rs
use std::fmt;
use std::io::Write;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::AppConfig;
use crate::errors::{QuizError, Result};
use crate::models::{GenerationRequest, ReadyChallenge};
use crate::providers::LlmProvider;
use crate::runner::{challenge_request, produce_challenge};
use crate::sandbox::SandboxRunner;

const SEPARATOR: &str = "--------------------";
const BANNER_RULE: &str = "===================================";

/// Knobs the session needs, split out of `AppConfig` so tests can run
/// without pacing delays.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_rounds: u32,
    /// Consecutive failed attempts allowed before giving up; 0 retries forever.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub round_delay: Duration,
}

impl From<&AppConfig> for SessionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_rounds: config.max_rounds,
            max_attempts: config.max_attempts,
            retry_delay: config.retry_delay(),
            round_delay: config.round_delay(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub round: u32,
    pub max_rounds: u32,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    pub round: u32,
    pub code: String,
    pub expected_output: String,
    pub prediction: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub score: u32,
    pub max_rounds: u32,
    pub rounds: Vec<RoundRecord>,
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.score, self.max_rounds)
    }
}

enum Phase {
    AwaitingChallenge,
    Presenting(ReadyChallenge),
    AwaitingAnswer(ReadyChallenge),
    Scoring {
        challenge: ReadyChallenge,
        prediction: String,
    },
    Done,
}

/// Case-insensitive exact comparison of a prediction with the real output.
pub fn answers_match(prediction: &str, expected: &str) -> bool {
    prediction.trim().to_lowercase() == expected.to_lowercase()
}

/// One game of guess-the-output.
///
/// The session owns its input handle and output sink; both are released when
/// the session is dropped, whichever way `run` exits.
pub struct Session<P, R, W> {
    provider: P,
    sandbox: SandboxRunner,
    settings: SessionSettings,
    request: GenerationRequest,
    input: R,
    output: W,
    state: SessionState,
    rounds: Vec<RoundRecord>,
}

impl<P, R, W> Session<P, R, W>
where
    P: LlmProvider,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(provider: P, sandbox: SandboxRunner, settings: SessionSettings, input: R, output: W) -> Self {
        let request = challenge_request(&settings.model, settings.temperature);
        let state = SessionState {
            round: 0,
            max_rounds: settings.max_rounds,
            score: 0,
        };
        Self {
            provider,
            sandbox,
            settings,
            request,
            input,
            output,
            state,
            rounds: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Plays every round and returns the final report.
    pub async fn run(&mut self) -> Result<SessionReport> {
        self.print_welcome()?;

        let mut phase = Phase::AwaitingChallenge;
        let mut failed_attempts = 0u32;

        loop {
            phase = match phase {
                Phase::AwaitingChallenge => {
                    writeln!(
                        self.output,
                        "\n===== ROUND {}/{} =====",
                        self.state.round + 1,
                        self.state.max_rounds
                    )?;

                    let challenge =
                        produce_challenge(&self.provider, &self.sandbox, &self.request).await;

                    match challenge.into_ready() {
                        Ok(ready) => {
                            failed_attempts = 0;
                            Phase::Presenting(ready)
                        }
                        Err(reason) => {
                            failed_attempts += 1;
                            log::warn!("Discarding question (attempt {}): {}", failed_attempts, reason);
                            writeln!(
                                self.output,
                                "There was an issue with this question. Trying another one."
                            )?;
                            writeln!(self.output, "Reason: {}", reason)?;

                            let max_attempts = self.settings.max_attempts;
                            if max_attempts > 0 && failed_attempts >= max_attempts {
                                return Err(QuizError::RetriesExhausted {
                                    attempts: failed_attempts,
                                    last_reason: reason.to_string(),
                                });
                            }

                            pause(self.settings.retry_delay).await;
                            Phase::AwaitingChallenge
                        }
                    }
                }
                Phase::Presenting(challenge) => {
                    writeln!(self.output, "\nPredict the output of this code:")?;
                    writeln!(self.output, "{}", SEPARATOR)?;
                    writeln!(self.output, "{}", challenge.code)?;
                    writeln!(self.output, "{}", SEPARATOR)?;
                    Phase::AwaitingAnswer(challenge)
                }
                Phase::AwaitingAnswer(challenge) => {
                    let prediction = self.read_prediction().await?;
                    Phase::Scoring {
                        challenge,
                        prediction,
                    }
                }
                Phase::Scoring {
                    challenge,
                    prediction,
                } => {
                    self.score_round(challenge, prediction)?;
                    if self.state.round >= self.state.max_rounds {
                        Phase::Done
                    } else {
                        pause(self.settings.round_delay).await;
                        Phase::AwaitingChallenge
                    }
                }
                Phase::Done => break,
            };
        }

        let report = SessionReport {
            score: self.state.score,
            max_rounds: self.state.max_rounds,
            rounds: std::mem::take(&mut self.rounds),
        };

        writeln!(self.output, "\n{}", BANNER_RULE)?;
        writeln!(self.output, "      Game Over!")?;
        writeln!(self.output, "      Final Score: {}", report)?;
        writeln!(self.output, "{}", BANNER_RULE)?;
        self.output.flush()?;

        log::info!("Session finished with score {}", report);
        Ok(report)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "\n{}", BANNER_RULE)?;
        writeln!(self.output, "   Welcome to Guess the Output!")?;
        writeln!(self.output, "{}", BANNER_RULE)?;
        writeln!(
            self.output,
            "Predict the output of {} JavaScript snippets.",
            self.state.max_rounds
        )?;
        writeln!(self.output, "Using AI Model: {}", self.settings.model)?;
        Ok(())
    }

    /// Reads one non-empty, trimmed line, re-prompting on blank input.
    async fn read_prediction(&mut self) -> Result<String> {
        loop {
            write!(self.output, "Your prediction: ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line).await? == 0 {
                return Err(QuizError::InputClosed);
            }

            let answer = line.trim();
            if answer.is_empty() {
                writeln!(self.output, "Please enter your prediction.")?;
                continue;
            }
            return Ok(answer.to_string());
        }
    }

    fn score_round(&mut self, challenge: ReadyChallenge, prediction: String) -> Result<()> {
        self.state.round += 1;

        writeln!(self.output, "\nYour prediction: \"{}\"", prediction)?;
        writeln!(self.output, "Correct output:  \"{}\"", challenge.expected_output)?;

        let correct = answers_match(&prediction, &challenge.expected_output);
        if correct {
            self.state.score += 1;
            writeln!(self.output, "🎉 Correct! +1 point")?;
        } else {
            writeln!(self.output, "❌ Incorrect.")?;
        }
        writeln!(
            self.output,
            "Current Score: {}/{}",
            self.state.score, self.state.round
        )?;

        self.rounds.push(RoundRecord {
            round: self.state.round,
            code: challenge.code,
            expected_output: challenge.expected_output,
            prediction,
            correct,
        });
        Ok(())
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
