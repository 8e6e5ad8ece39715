//! The page agent.
//!
//! After a product page loads, the agent samples the page on a fixed schedule
//! and reports exactly one capture message for the load: a success on the
//! first attempt that finds a price, otherwise a failure after the last one.

/// Price extraction from page HTML.
pub mod extract;
/// Store page profiles.
pub mod profile;

use crate::configuration::Configuration;
use crate::error::TabError;
use crate::protocol::{
    CaptureEnvelope, CaptureMessage, NavigationId, TabId, NO_PRICE_FOUND, UNSUPPORTED_PAGE,
};
use async_trait::async_trait;
use profile::SelectorProfiles;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Read access to a loaded page.
#[async_trait]
pub trait PageProbe: Send + Sync {
    /// The current location of the page.
    async fn url(&self) -> Result<String, TabError>;
    /// The current document HTML.
    async fn html(&self) -> Result<String, TabError>;
}

/// Where page agents deliver their messages.
pub trait CaptureSink: Send + Sync {
    /// Deliver a message. Returns false when nobody is listening anymore.
    fn deliver(&self, envelope: CaptureEnvelope) -> bool;
}

impl CaptureSink for UnboundedSender<CaptureEnvelope> {
    fn deliver(&self, envelope: CaptureEnvelope) -> bool {
        self.send(envelope).is_ok()
    }
}

/// Outcome of sampling a page once.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    /// A price was found.
    Captured(CaptureMessage),
    /// The page is a known product page but no price was found.
    NoPrice,
    /// The page matched no profile.
    Unsupported,
}

/// Samples product pages and reports captures.
#[derive(Debug, Clone)]
pub struct PageAgent {
    profiles: Arc<SelectorProfiles>,
    schedule: Vec<Duration>,
}

impl Default for PageAgent {
    fn default() -> Self {
        Self::from_config(&Configuration::default())
    }
}

impl PageAgent {
    /// A new agent. An empty schedule samples once, right away.
    pub fn new(profiles: SelectorProfiles, mut schedule: Vec<Duration>) -> Self {
        schedule.sort();

        if schedule.is_empty() {
            schedule.push(Duration::ZERO);
        }

        Self {
            profiles: Arc::new(profiles),
            schedule,
        }
    }

    /// Agent with the built-in profiles and the configured schedule.
    pub fn from_config(config: &Configuration) -> Self {
        Self::new(SelectorProfiles::default(), config.attempt_schedule.clone())
    }

    /// The profile table.
    pub fn profiles(&self) -> &SelectorProfiles {
        &self.profiles
    }

    /// Sample one snapshot of a page.
    pub fn attempt(&self, url: &str, html: &str) -> Attempt {
        let profile = match self.profiles.resolve(url) {
            Some(profile) => profile,
            None => return Attempt::Unsupported,
        };

        let extraction = extract::extract(profile, html);

        match extraction.price {
            Some(_) => Attempt::Captured(CaptureMessage::from_values(
                Some(profile.store),
                extraction.price,
                extraction.unit_price,
                extraction.was_price,
                extraction.promo_text,
                Some(url.to_string()),
            )),
            None => Attempt::NoPrice,
        }
    }

    /// Run the attempt schedule against a loaded page and return the single message for it.
    pub async fn run<P>(&self, probe: &P) -> CaptureMessage
    where
        P: PageProbe + ?Sized,
    {
        let loaded = tokio::time::Instant::now();
        let mut matched_store = None;
        let mut last_url = None;

        for (i, offset) in self.schedule.iter().enumerate() {
            tokio::time::sleep_until(loaded + *offset).await;

            let snapshot = match probe.url().await {
                Ok(url) => match probe.html().await {
                    Ok(html) => Ok((url, html)),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };

            let (url, html) = match snapshot {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    log::debug!("attempt {} could not read the page: {e}", i + 1);
                    continue;
                }
            };

            match self.attempt(&url, &html) {
                Attempt::Captured(message) => {
                    log::debug!("price found on attempt {}", i + 1);
                    return message;
                }
                Attempt::NoPrice => {
                    matched_store = self.profiles.resolve(&url).map(|p| p.store);
                }
                Attempt::Unsupported => (),
            }

            last_url = Some(url);
        }

        match matched_store {
            Some(store) => CaptureMessage::failure(Some(store), NO_PRICE_FOUND, last_url),
            None => CaptureMessage::failure(None, UNSUPPORTED_PAGE, last_url),
        }
    }

    /// Run against a page and deliver the message for `tab`.
    pub async fn report<P>(
        &self,
        probe: &P,
        tab: TabId,
        navigation: Option<NavigationId>,
        sink: &dyn CaptureSink,
    ) where
        P: PageProbe + ?Sized,
    {
        let message = self.run(probe).await;

        if !sink.deliver(CaptureEnvelope::new(tab, navigation, message)) {
            log::debug!("capture sink closed, dropping message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreId;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    /// Serves a sequence of snapshots, repeating the last one.
    struct Snapshots {
        pages: Mutex<Vec<(String, String)>>,
        reads: Mutex<usize>,
    }

    impl Snapshots {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: Mutex::new(
                    pages
                        .iter()
                        .rev()
                        .map(|(u, h)| (u.to_string(), h.to_string()))
                        .collect(),
                ),
                reads: Mutex::new(0),
            }
        }

        fn current(&self) -> (String, String) {
            let pages = self.pages.lock().unwrap();
            pages.last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl PageProbe for Snapshots {
        async fn url(&self) -> Result<String, TabError> {
            Ok(self.current().0)
        }

        async fn html(&self) -> Result<String, TabError> {
            *self.reads.lock().unwrap() += 1;
            let html = self.current().1;
            let mut pages = self.pages.lock().unwrap();
            if pages.len() > 1 {
                pages.pop();
            }
            Ok(html)
        }
    }

    struct Broken;

    #[async_trait]
    impl PageProbe for Broken {
        async fn url(&self) -> Result<String, TabError> {
            Err(TabError::Browser("gone".into()))
        }

        async fn html(&self) -> Result<String, TabError> {
            Err(TabError::Browser("gone".into()))
        }
    }

    const COLES_URL: &str = "https://www.coles.com.au/product/milk-1";
    const PRICED: &str = r#"<body><span data-testid="pricing">$3.50</span></body>"#;
    const EMPTY: &str = "<body><p>loading</p></body>";

    fn agent() -> PageAgent {
        PageAgent::new(
            SelectorProfiles::default(),
            vec![Duration::from_millis(1), Duration::from_millis(2), Duration::from_millis(3)],
        )
    }

    #[tokio::test]
    async fn test_first_price_wins() {
        let probe = Snapshots::new(&[(COLES_URL, EMPTY), (COLES_URL, PRICED)]);
        let message = agent().run(&probe).await;

        assert_eq!(
            message,
            CaptureMessage::from_values(
                Some(StoreId::Coles),
                Some(Decimal::new(350, 2)),
                None,
                None,
                None,
                None
            )
        );
        assert_eq!(*probe.reads.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_no_price_after_schedule() {
        let probe = Snapshots::new(&[(COLES_URL, EMPTY)]);
        let message = agent().run(&probe).await;

        assert_eq!(
            message,
            CaptureMessage::failure(Some(StoreId::Coles), NO_PRICE_FOUND, Some(COLES_URL.into()))
        );
        assert_eq!(*probe.reads.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unsupported_page() {
        let probe = Snapshots::new(&[("https://example.com/", PRICED)]);
        let message = agent().run(&probe).await;

        assert_eq!(
            message,
            CaptureMessage::failure(None, UNSUPPORTED_PAGE, Some("https://example.com/".into()))
        );
    }

    #[tokio::test]
    async fn test_unreadable_page_still_reports_once() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        agent()
            .report(&Broken, TabId::from("t1"), Some(NavigationId(4)), &tx)
            .await;

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.sender, TabId::from("t1"));
        assert_eq!(envelope.navigation, Some(NavigationId(4)));
        assert_eq!(
            envelope.message,
            CaptureMessage::failure(None, UNSUPPORTED_PAGE, None)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_attempt_classification() {
        let agent = PageAgent::default();

        assert!(matches!(agent.attempt(COLES_URL, PRICED), Attempt::Captured(_)));
        assert_eq!(agent.attempt(COLES_URL, EMPTY), Attempt::NoPrice);
        assert_eq!(
            agent.attempt("https://www.coles.com.au/", PRICED),
            Attempt::Unsupported
        );
    }
}
