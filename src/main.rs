use std::backtrace::Backtrace;

use guess_the_output::banner;
use guess_the_output::config::AppConfig;
use guess_the_output::errors::Result;
use guess_the_output::providers::ollama::OllamaProvider;
use guess_the_output::sandbox::{self, SandboxRunner};
use guess_the_output::session::{Session, SessionReport, SessionSettings};
use reqwest::Client;
use tokio::io::BufReader;

#[tokio::main]
async fn main() {
    // Snippet workers report their own crashes through the exit status, so
    // they must not inherit the fatal hook below.
    if std::env::args().nth(1).as_deref() == Some(sandbox::WORKER_FLAG) {
        std::process::exit(sandbox::serve_worker());
    }

    // Anything that panics in the game process is a programming error, not
    // model flakiness.
    std::panic::set_hook(Box::new(|info| {
        eprintln!("FATAL uncaught panic: {}", info);
        eprintln!("{}", Backtrace::force_capture());
        std::process::exit(1);
    }));

    // Print the startup banner
    banner::print_banner();

    let dotenv_result = dotenvy::dotenv();

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Err(e) = dotenv_result {
        log::debug!("No .env file loaded: {}", e);
    }

    let exit_code = match run().await {
        Ok(report) => {
            log::info!("Final score {}", report);
            0
        }
        Err(e) => {
            log::error!("Critical error during game execution: {:?}", e);
            eprintln!("Critical error during game execution: {}", e);
            1
        }
    };

    println!("\nExiting game.");
    std::process::exit(exit_code);
}

async fn run() -> Result<SessionReport> {
    let config = AppConfig::from_env()?;
    log::info!(
        "Using Ollama at {} with model {}",
        config.ollama.api_base,
        config.model
    );

    let provider = OllamaProvider::new(Client::new(), config.ollama.clone());
    let sandbox = SandboxRunner::new(config.execution_timeout());
    let input = BufReader::new(tokio::io::stdin());
    let output = std::io::stdout();

    let mut session = Session::new(
        provider,
        sandbox,
        SessionSettings::from(&config),
        input,
        output,
    );
    session.run().await
}
