use crate::agent::{CaptureSink, PageAgent, PageProbe};
use crate::configuration::Configuration;
use crate::error::TabError;
use crate::protocol::{CaptureEnvelope, CaptureMessage, NavigationId, TabId, NAVIGATION_FAILED};
use crate::tab::TabDriver;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;

fn browser_error(e: CdpError) -> TabError {
    TabError::Browser(e.to_string())
}

/// Drive the handler until the connection drops.
fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::task::spawn(async move {
        while let Some(k) = handler.next().await {
            if let Err(e) = k {
                match e {
                    CdpError::Ws(_)
                    | CdpError::LaunchExit(_, _)
                    | CdpError::LaunchTimeout(_)
                    | CdpError::LaunchIo(_, _) => {
                        break;
                    }
                    _ => {
                        continue;
                    }
                }
            }
        }
    })
}

/// Tabs of a chrome instance. Each navigation runs a page agent on the loaded page.
pub struct ChromeTabs {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    agent: Arc<PageAgent>,
    sink: Arc<dyn CaptureSink>,
}

impl ChromeTabs {
    /// Connect to the configured chrome instance, or launch a headed one.
    pub async fn open(
        config: &Configuration,
        agent: PageAgent,
        sink: Arc<dyn CaptureSink>,
    ) -> Result<Self, TabError> {
        let (browser, handler) = match config.chrome_connection_url {
            Some(ref url) => {
                log::info!("connecting to chrome at {url}");
                Browser::connect(url.as_str()).await.map_err(browser_error)?
            }
            None => {
                let browser_config = BrowserConfig::builder()
                    .with_head()
                    .build()
                    .map_err(TabError::Browser)?;
                Browser::launch(browser_config)
                    .await
                    .map_err(browser_error)?
            }
        };

        Ok(Self {
            browser: Arc::new(browser),
            handler: spawn_handler(handler),
            agent: Arc::new(agent),
            sink,
        })
    }

    async fn page(&self, tab: &TabId) -> Result<Page, TabError> {
        let page = self
            .browser
            .get_page(TargetId::new(tab.as_str().to_string()))
            .await
            .map_err(|_| TabError::NotFound(tab.clone()))?;

        // a closed target still resolves until it is queried
        page.url()
            .await
            .map_err(|_| TabError::NotFound(tab.clone()))?;

        Ok(page)
    }
}

impl Drop for ChromeTabs {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

struct ChromePage {
    page: Page,
}

#[async_trait]
impl PageProbe for ChromePage {
    async fn url(&self) -> Result<String, TabError> {
        Ok(self
            .page
            .url()
            .await
            .map_err(browser_error)?
            .unwrap_or_default())
    }

    async fn html(&self) -> Result<String, TabError> {
        self.page.content().await.map_err(browser_error)
    }
}

#[async_trait]
impl TabDriver for ChromeTabs {
    async fn active_tab(&self) -> Result<TabId, TabError> {
        let pages = self.browser.pages().await.map_err(browser_error)?;

        let page = match pages.into_iter().next() {
            Some(page) => page,
            None => self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|_| TabError::NoActiveTab)?,
        };

        Ok(TabId::new(page.target_id().inner().clone()))
    }

    async fn navigate(
        &self,
        tab: &TabId,
        url: &str,
        navigation: NavigationId,
    ) -> Result<(), TabError> {
        let page = self.page(tab).await?;
        let agent = self.agent.clone();
        let sink = self.sink.clone();
        let tab = tab.clone();
        let url = url.to_string();

        tokio::spawn(async move {
            match page.goto(url.as_str()).await {
                Ok(_) => {
                    let probe = ChromePage { page };
                    agent
                        .report(&probe, tab, Some(navigation), sink.as_ref())
                        .await;
                }
                Err(e) => {
                    log::warn!("{url} failed to load: {e}");
                    sink.deliver(CaptureEnvelope::new(
                        tab,
                        Some(navigation),
                        CaptureMessage::failure(None, NAVIGATION_FAILED, Some(url)),
                    ));
                }
            }
        });

        Ok(())
    }
}
