// src/main.rs

use jobflow::submission::SubmissionStatus;
use jobflow::{cli, logging, run};

fn main() {
    match run_main() {
        // Dry runs report `Undefined`.
        Ok(SubmissionStatus::Completed | SubmissionStatus::Undefined) => {}
        Ok(_) => std::process::exit(1),
        Err(err) => {
            eprintln!("jobflow error: {err:?}");
            std::process::exit(2);
        }
    }
}

fn run_main() -> anyhow::Result<SubmissionStatus> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args)
}
