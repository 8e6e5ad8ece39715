use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// run a capture session until the job queue is exhausted.
    CAPTURE {
        /// Bind the session to this tab instead of the active one.
        #[clap(short, long)]
        tab: Option<String>,
    },
    /// run the page agent once against a saved page and print the capture.
    PROBE {
        /// The url the page was saved from.
        #[clap(short, long)]
        url: String,
        /// Path of the saved HTML.
        #[clap(long)]
        html: PathBuf,
    },
}
