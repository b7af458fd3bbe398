use std::process::ExitCode;
use std::sync::Arc;

use gramgpt::app::ChatShell;
use gramgpt::chat::SessionController;
use gramgpt::settings::AppSettings;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // stdout belongs to the chat transcript
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = AppSettings::load();
    let controller = Arc::new(SessionController::from_settings(&settings));

    let mut shell = ChatShell::new(controller, tokio::io::stdout());
    match shell.run(BufReader::new(tokio::io::stdin())).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "chat shell stopped");
            ExitCode::FAILURE
        }
    }
}
