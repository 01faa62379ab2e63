use std::process::ExitCode;

use clap::Parser;
use esp_at_runner::cli::{self, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = esp_at_runner::init_logging(&cli.log_level) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let recorder = if cli.metrics {
        match esp_at_runner::install_metrics() {
            Ok(recorder) => Some(recorder),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let result = cli::run(&cli);
    if let Some(recorder) = recorder {
        print!("{}", recorder.render());
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
