use clap::Parser;

use ats_autofill::cli::{self, Cli};

#[tokio::main]
async fn main() {
    cli::init_tracing();
    let cli = Cli::parse();

    let code = match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            eprintln!("error: {e}");
            1
        }
    };
    std::process::exit(code);
}
