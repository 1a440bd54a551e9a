//! rtmark entry point: parses CLI and starts the async application runtime.
//! The main function is intentionally thin and delegates to the runtime in `app`.

use std::process::ExitCode;

use anyhow::Result;
use rtmark::{app, cli};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let config = cli::parse();
    app::init_logging(&config)?;
    app::run(config).await
}
