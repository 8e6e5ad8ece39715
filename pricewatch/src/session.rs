//! Capture session state.
//!
//! A [`Session`] owns at most one tab and at most one job at a time. It holds
//! no I/O: the orchestrator feeds it events and acts on what it returns.
//!
//! ```text
//! Idle --start--> AwaitingJob --job--> Navigating --dispatched--> AwaitingCapture
//!                  ^   |                                                |
//!                  |   +--exhausted--> Idle                             |
//!                  +---------------- capture accepted ------------------+
//! ```
//!
//! Every start bumps the session epoch. Events tagged with an older epoch
//! belong to a cancelled session and are dropped.

use crate::job::Job;
use crate::protocol::{CaptureEnvelope, CaptureResult, NavigationId, StatusReport, TabId};
use crate::store::StoreId;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Where the session is in its loop.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    #[default]
    /// No session.
    Idle,
    /// Waiting for the job source or for the settle delay.
    AwaitingJob,
    /// A navigation is being dispatched.
    Navigating,
    /// Waiting for the page agent of the current navigation.
    AwaitingCapture,
}

/// Generation of a session. Changes on every start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Epoch(pub u64);

/// A navigation the orchestrator should dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationPlan {
    /// The owned tab.
    pub tab: TabId,
    /// The job page.
    pub url: String,
    /// Ticket the page agent echoes back.
    pub navigation: NavigationId,
}

/// Why a capture message was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Rejection {
    /// No session is running.
    NotRunning,
    /// The session has no job in flight.
    NoJob,
    /// The message came from a tab the session does not own.
    ForeignTab,
    /// The navigation has not been dispatched yet.
    NotDispatched,
    /// The message belongs to an earlier navigation of the same tab.
    StaleNavigation,
}

/// A capture that passed the provenance checks.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedCapture {
    /// The job the capture completes.
    pub job: Job,
    /// The normalised result.
    pub result: CaptureResult,
    /// Epoch to tag the settle timer with.
    pub epoch: Epoch,
}

/// The capture session.
#[derive(Debug, Default)]
pub struct Session {
    running: bool,
    state: SessionState,
    owned_tab: Option<TabId>,
    current_job: Option<Job>,
    stores: Vec<StoreId>,
    epoch: Epoch,
    navigation: Option<NavigationId>,
    navigations: u64,
    fetch_pending: bool,
}

impl Session {
    /// A new idle session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Is a session running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The current epoch.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// The job in flight.
    pub fn current_job(&self) -> Option<&Job> {
        self.current_job.as_ref()
    }

    /// The owned tab.
    pub fn owned_tab(&self) -> Option<&TabId> {
        self.owned_tab.as_ref()
    }

    /// Does `epoch` belong to the running session.
    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.running && self.epoch == epoch
    }

    /// Start a session bound to `tab`. Any previous session is cancelled first.
    pub fn start(&mut self, tab: TabId, stores: Vec<StoreId>) -> Epoch {
        self.stop();
        self.epoch = Epoch(self.epoch.0.wrapping_add(1));
        self.running = true;
        self.state = SessionState::AwaitingJob;
        self.owned_tab = Some(tab);
        self.stores = stores;
        self.epoch
    }

    /// Stop the session. Safe to call at any time.
    pub fn stop(&mut self) {
        self.running = false;
        self.state = SessionState::Idle;
        self.owned_tab = None;
        self.current_job = None;
        self.stores.clear();
        self.navigation = None;
        self.fetch_pending = false;
    }

    /// Claim the next job request for `epoch`. Returns the store set to ask for,
    /// or `None` when the epoch is stale or a request is already out.
    pub fn request_job(&mut self, epoch: Epoch) -> Option<Vec<StoreId>> {
        if !self.is_current(epoch) || self.state != SessionState::AwaitingJob || self.fetch_pending {
            return None;
        }

        self.fetch_pending = true;
        Some(self.stores.clone())
    }

    /// Bind a job and plan its navigation.
    pub fn begin_navigation(&mut self, epoch: Epoch, job: Job) -> Option<NavigationPlan> {
        if !self.is_current(epoch) || self.state != SessionState::AwaitingJob {
            return None;
        }

        let tab = self.owned_tab.clone()?;

        self.navigations += 1;
        let navigation = NavigationId(self.navigations);
        let url = job.url.clone();

        self.fetch_pending = false;
        self.current_job = Some(job);
        self.navigation = Some(navigation);
        self.state = SessionState::Navigating;

        Some(NavigationPlan {
            tab,
            url,
            navigation,
        })
    }

    /// The navigation was handed to the tab.
    pub fn navigation_dispatched(&mut self, epoch: Epoch, navigation: NavigationId) -> bool {
        if !self.is_current(epoch)
            || self.state != SessionState::Navigating
            || self.navigation != Some(navigation)
        {
            return false;
        }

        self.state = SessionState::AwaitingCapture;
        true
    }

    /// The job source ran dry. Ends the session.
    pub fn finish(&mut self, epoch: Epoch) -> bool {
        if !self.is_current(epoch) {
            return false;
        }

        self.stop();
        true
    }

    /// Check the provenance of a capture message without consuming it.
    pub fn check(&self, envelope: &CaptureEnvelope) -> Result<(), Rejection> {
        if !self.running {
            return Err(Rejection::NotRunning);
        }

        if self.current_job.is_none() {
            return Err(Rejection::NoJob);
        }

        if self.owned_tab.as_ref() != Some(&envelope.sender) {
            return Err(Rejection::ForeignTab);
        }

        if self.state != SessionState::AwaitingCapture {
            return Err(Rejection::NotDispatched);
        }

        match envelope.navigation {
            Some(navigation) if Some(navigation) != self.navigation => {
                Err(Rejection::StaleNavigation)
            }
            _ => Ok(()),
        }
    }

    /// Accept a capture for the current job. The job is released, so a duplicate
    /// message for the same page load is rejected.
    pub fn accept_capture(
        &mut self,
        envelope: CaptureEnvelope,
    ) -> Result<AcceptedCapture, Rejection> {
        self.check(&envelope)?;

        let job = self.current_job.take().ok_or(Rejection::NoJob)?;
        let result = envelope.message.into_result(job.store_id);

        self.navigation = None;
        self.state = SessionState::AwaitingJob;

        Ok(AcceptedCapture {
            job,
            result,
            epoch: self.epoch,
        })
    }

    /// Snapshot for status queries.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            running: self.running,
            state: self.state,
            current_job: self.current_job.clone(),
            owned_tab: self.owned_tab.clone(),
            stores: self.stores.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CaptureMessage, CaptureOutcome};
    use rust_decimal::Decimal;

    fn job(item_id: i64, store: StoreId) -> Job {
        Job {
            run_id: 1,
            store_id: store,
            item_id,
            item_name: None,
            url: format!("https://example.test/item/{item_id}"),
        }
    }

    fn success() -> CaptureMessage {
        CaptureMessage::from_values(None, Some(Decimal::new(350, 2)), None, None, None, None)
    }

    fn running_with_job(tab: &str) -> (Session, Epoch, NavigationId) {
        let mut session = Session::new();
        let epoch = session.start(TabId::from(tab), vec![StoreId::Coles]);
        session.request_job(epoch);
        let plan = session.begin_navigation(epoch, job(7, StoreId::Coles)).unwrap();
        assert!(session.navigation_dispatched(epoch, plan.navigation));
        (session, epoch, plan.navigation)
    }

    #[test]
    fn test_start_and_stop() {
        let mut session = Session::new();
        assert_eq!(session.status(), StatusReport::default());

        let epoch = session.start(TabId::from("t1"), vec![StoreId::Woolworths]);
        assert!(session.is_current(epoch));
        assert_eq!(session.state(), SessionState::AwaitingJob);

        session.stop();
        session.stop();
        assert!(!session.is_running());
        assert_eq!(session.status(), StatusReport::default());
    }

    #[test]
    fn test_restart_invalidates_epoch() {
        let mut session = Session::new();
        let first = session.start(TabId::from("t1"), vec![StoreId::Woolworths]);
        let second = session.start(TabId::from("t2"), vec![StoreId::Coles]);

        assert_ne!(first, second);
        assert!(session.request_job(first).is_none());
        assert!(session.begin_navigation(first, job(1, StoreId::Woolworths)).is_none());
        assert_eq!(session.request_job(second), Some(vec![StoreId::Coles]));
        assert_eq!(session.owned_tab(), Some(&TabId::from("t2")));
    }

    #[test]
    fn test_single_job_request_in_flight() {
        let mut session = Session::new();
        let epoch = session.start(TabId::from("t1"), vec![StoreId::Aldi]);

        assert!(session.request_job(epoch).is_some());
        assert!(session.request_job(epoch).is_none());
    }

    #[test]
    fn test_capture_accepted_once() {
        let (mut session, epoch, navigation) = running_with_job("t1");

        let envelope = CaptureEnvelope::new(TabId::from("t1"), Some(navigation), success());
        let accepted = session.accept_capture(envelope.clone()).unwrap();

        assert_eq!(accepted.job.item_id, 7);
        assert_eq!(accepted.epoch, epoch);
        assert_eq!(accepted.result.store_id, StoreId::Coles);
        assert_eq!(accepted.result.outcome, CaptureOutcome::Success);
        assert!(session.current_job().is_none());
        assert_eq!(session.accept_capture(envelope), Err(Rejection::NoJob));
    }

    #[test]
    fn test_capture_from_foreign_tab_ignored() {
        let (mut session, _, navigation) = running_with_job("t1");

        let envelope = CaptureEnvelope::new(TabId::from("t9"), Some(navigation), success());
        assert_eq!(session.accept_capture(envelope), Err(Rejection::ForeignTab));
        assert!(session.current_job().is_some());
        assert_eq!(session.state(), SessionState::AwaitingCapture);
    }

    #[test]
    fn test_stale_navigation_ignored() {
        let (mut session, _, navigation) = running_with_job("t1");

        let stale = NavigationId(navigation.0 + 100);
        let envelope = CaptureEnvelope::new(TabId::from("t1"), Some(stale), success());
        assert_eq!(
            session.accept_capture(envelope),
            Err(Rejection::StaleNavigation)
        );

        let untagged = CaptureEnvelope::new(TabId::from("t1"), None, success());
        assert!(session.accept_capture(untagged).is_ok());
    }

    #[test]
    fn test_capture_without_session_ignored() {
        let mut session = Session::new();
        let envelope = CaptureEnvelope::new(TabId::from("t1"), None, success());
        assert_eq!(session.accept_capture(envelope), Err(Rejection::NotRunning));
    }

    #[test]
    fn test_capture_before_dispatch_ignored() {
        let mut session = Session::new();
        let epoch = session.start(TabId::from("t1"), vec![StoreId::Coles]);
        let plan = session.begin_navigation(epoch, job(1, StoreId::Coles)).unwrap();

        let envelope = CaptureEnvelope::new(TabId::from("t1"), Some(plan.navigation), success());
        assert_eq!(session.check(&envelope), Err(Rejection::NotDispatched));
    }

    #[test]
    fn test_finish_requires_current_epoch() {
        let mut session = Session::new();
        let old = session.start(TabId::from("t1"), vec![StoreId::Coles]);
        let epoch = session.start(TabId::from("t1"), vec![StoreId::Coles]);

        assert!(!session.finish(old));
        assert!(session.is_running());
        assert!(session.finish(epoch));
        assert!(!session.is_running());
    }
}
