//! Browser tab control.

use crate::error::TabError;
use crate::protocol::{NavigationId, TabId};
use async_trait::async_trait;

/// Drives browser tabs on behalf of a session.
///
/// `navigate` resolves once the navigation is handed to the tab. The page agent
/// for that load reports back through a capture sink, tagged with `navigation`.
#[async_trait]
pub trait TabDriver: Send + Sync {
    /// The tab a new session should bind to.
    async fn active_tab(&self) -> Result<TabId, TabError>;
    /// Point `tab` at `url`.
    async fn navigate(
        &self,
        tab: &TabId,
        url: &str,
        navigation: NavigationId,
    ) -> Result<(), TabError>;
}
