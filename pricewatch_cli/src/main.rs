extern crate env_logger;
extern crate pricewatch;
extern crate serde_json;

pub mod options;

use clap::Parser;
use options::{Cli, Commands};
use pricewatch::agent::{Attempt, PageAgent};
use pricewatch::configuration::Configuration;
use pricewatch::protocol::{CaptureMessage, NO_PRICE_FOUND, UNSUPPORTED_PAGE};
use pricewatch::store::{parse_store_list, StoreMode};
use std::str::FromStr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Apply the command line on top of the environment configuration.
fn configure(cli: &Cli) -> Result<Configuration, String> {
    let mut config = Configuration::from_env();

    if let Some(ref app_base) = cli.app_base {
        config = config.with_app_base(app_base.as_str());
    }

    if let Some(ref mode) = cli.mode {
        let mode = StoreMode::from_str(mode).map_err(|_| format!("unknown store mode {mode}"))?;
        config = config.with_store_mode(mode);
    }

    if let Some(ref stores) = cli.stores {
        let stores =
            parse_store_list(stores).map_err(|_| format!("invalid store list {stores}"))?;
        config = config.with_stores(stores);
    }

    if let Some(ms) = cli.settle_ms {
        config = config.with_settle_delay(Duration::from_millis(ms));
    }

    if let Some(retries) = cli.retry_budget {
        config.retry.retries = retries;
    }

    if cli.chrome_url.is_some() {
        config = config.with_chrome_connection(cli.chrome_url.clone());
    }

    Ok(config)
}

async fn print_line(line: String) {
    let mut stdout = tokio::io::stdout();

    if let Err(e) = stdout.write_all(format!("{line}\n").as_bytes()).await {
        log::error!("{e}");
    }
}

async fn probe(config: &Configuration, url: &str, html: &std::path::Path) -> Result<(), String> {
    let html = tokio::fs::read_to_string(html)
        .await
        .map_err(|e| format!("{}: {e}", html.display()))?;

    let agent = PageAgent::from_config(config);

    let message = match agent.attempt(url, &html) {
        Attempt::Captured(message) => message,
        Attempt::NoPrice => CaptureMessage::failure(
            agent.profiles().resolve(url).map(|p| p.store),
            NO_PRICE_FOUND,
            Some(url.to_string()),
        ),
        Attempt::Unsupported => {
            CaptureMessage::failure(None, UNSUPPORTED_PAGE, Some(url.to_string()))
        }
    };

    let json = serde_json::to_string(&message).map_err(|e| e.to_string())?;
    print_line(json).await;

    Ok(())
}

#[cfg(feature = "chrome")]
async fn capture(config: Configuration, tab: Option<String>) -> Result<(), String> {
    use pricewatch::features::chrome::ChromeTabs;
    use pricewatch::ingest::HttpIngestClient;
    use pricewatch::job_source::HttpJobSource;
    use pricewatch::orchestrator::{Orchestrator, OrchestratorHandle};
    use pricewatch::protocol::TabId;
    use pricewatch::utils::build_client;
    use std::sync::Arc;

    let client = build_client(&config).map_err(|e| e.to_string())?;
    let (handle, mailbox) = OrchestratorHandle::channel();

    let tabs = ChromeTabs::open(
        &config,
        PageAgent::from_config(&config),
        Arc::new(handle.clone()),
    )
    .await
    .map_err(|e| e.to_string())?;

    let orchestrator = Orchestrator::new(
        config.clone(),
        Arc::new(HttpJobSource::new(client.clone(), &config)),
        Arc::new(HttpIngestClient::new(client, &config)),
        Arc::new(tabs),
    );

    let task = tokio::spawn(orchestrator.run(mailbox));
    let mut status = handle.subscribe();

    handle
        .start(tab.map(TabId::new), None)
        .await
        .map_err(|e| e.to_string())?;

    loop {
        let report = status.borrow_and_update().clone();

        if let Ok(json) = serde_json::to_string(&report) {
            print_line(json).await;
        }

        if !report.running {
            break;
        }

        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted, stopping the session");
                let _ = handle.stop().await;
            }
        }
    }

    task.abort();

    Ok(())
}

#[cfg(not(feature = "chrome"))]
async fn capture(_config: Configuration, _tab: Option<String>) -> Result<(), String> {
    Err("capture requires the `chrome` feature".into())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        use env_logger::Env;
        let env = Env::default()
            .filter_or("RUST_LOG", "info")
            .write_style_or("RUST_LOG_STYLE", "always");

        env_logger::init_from_env(env);
    }

    let config = match configure(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let result = match cli.command {
        Some(Commands::CAPTURE { tab }) => capture(config, tab).await,
        Some(Commands::PROBE { url, html }) => probe(&config, &url, &html).await,
        None => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
