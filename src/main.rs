use std::process::ExitCode;

use flockq::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    cli::init_logging(&cli);

    match cli::run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("flockq: {:#}", err);
            ExitCode::from(cli::EXIT_FAILURE)
        }
    }
}
