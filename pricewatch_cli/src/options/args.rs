use crate::options::sub_command::Commands;
use clap::Parser;

/// program to capture retail prices by walking a browser through product pages.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Build main sub commands
    #[clap(subcommand)]
    pub command: Option<Commands>,
    /// Base URL of the collection service.
    #[clap(short, long)]
    pub app_base: Option<String>,
    /// Store mode: WOOLWORTHS, COLES, ALDI, SEQ_WC or SEQ_CW.
    #[clap(short, long)]
    pub mode: Option<String>,
    /// Comma seperated ordered store list. Overrides the mode.
    #[clap(short, long)]
    pub stores: Option<String>,
    /// Pause between captures in milli seconds.
    #[clap(long)]
    pub settle_ms: Option<u64>,
    /// Extra attempts for failed collection service requests.
    #[clap(short, long)]
    pub retry_budget: Option<usize>,
    /// Connect to a running chrome instance instead of launching one.
    #[clap(short, long)]
    pub chrome_url: Option<String>,
    /// Log session progress to stderr
    #[clap(short, long)]
    pub verbose: bool,
}
