mod app;
mod cli;
mod config;
mod core;
mod executors;
mod organizers;
mod pipeline;
mod reporters;
mod tools;
mod ui;
mod utils;

#[cfg(test)]
mod test_support;

use clap::Parser;
use crate::core::errors::BugxError;

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = cli::args::Cli::parse();
    match app::run(cli).await {
        Ok(app::Outcome::Success) => {}
        Ok(app::Outcome::Aborted) => std::process::exit(2),
        Err(err) => {
            eprintln!("fatal: {:#}", err);
            if err
                .downcast_ref::<BugxError>()
                .is_some_and(BugxError::is_usage_error)
            {
                eprintln!("hint: `bugx tools` and `bugx workflows` list what is available");
            }
            std::process::exit(1);
        }
    }
}
