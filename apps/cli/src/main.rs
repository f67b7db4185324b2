//! topicwiki CLI: document a codebase topic by topic.
//!
//! Decides whether a topic is already covered, plans it as one or more
//! articles, and writes them into the repository's wiki.

mod commands;

use std::process::ExitCode;

use clap::Parser;

use commands::Cli;
use topicwiki_shared::{EXIT_EXECUTION_ERROR, TopicWikiError};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error handler: {e}");
        return ExitCode::from(EXIT_EXECUTION_ERROR);
    }
    let cli = Cli::parse();
    commands::init_tracing(&cli);

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            let code = report
                .downcast_ref::<TopicWikiError>()
                .map(TopicWikiError::exit_code)
                .unwrap_or(EXIT_EXECUTION_ERROR);
            eprintln!("Error: {report:?}");
            ExitCode::from(code)
        }
    }
}
