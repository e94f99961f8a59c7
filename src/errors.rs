// src/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuizError {
    #[error("Could not connect to Ollama or process request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Ollama API returned status {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Ollama API returned an error: {0}")]
    ApiResponse(String),

    #[error("Invalid response format from Ollama")]
    InvalidResponse,

    #[error("Received empty code snippet from model")]
    EmptyResponse,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Standard input closed before a prediction was entered")]
    InputClosed,

    #[error("Gave up after {attempts} failed attempts to build a question (last reason: {last_reason})")]
    RetriesExhausted { attempts: u32, last_reason: String },
}

pub type Result<T> = std::result::Result<T, QuizError>;
