//! The capture orchestrator.
//!
//! A single task owns the [`Session`] and handles one event at a time, so
//! session transitions never interleave. Commands and capture messages come
//! in through an [`OrchestratorHandle`]. Job fetches, ingest posts and settle
//! timers run as spawned tasks and report back on an internal channel.
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use pricewatch::configuration::Configuration;
//! # use pricewatch::orchestrator::{Orchestrator, OrchestratorHandle};
//! # async fn run(
//! #     source: Arc<dyn pricewatch::job_source::JobSource>,
//! #     ingest: Arc<dyn pricewatch::ingest::IngestClient>,
//! #     tabs: Arc<dyn pricewatch::tab::TabDriver>,
//! # ) -> Result<(), pricewatch::error::OrchestratorError> {
//! let (handle, mailbox) = OrchestratorHandle::channel();
//! let orchestrator = Orchestrator::new(Configuration::default(), source, ingest, tabs);
//! tokio::spawn(orchestrator.run(mailbox));
//!
//! handle.start(None, None).await?;
//! handle.wait_until_idle().await;
//! # Ok(())
//! # }
//! ```

use crate::agent::CaptureSink;
use crate::configuration::Configuration;
use crate::error::OrchestratorError;
use crate::ingest::{CapturePayload, IngestClient};
use crate::job::NextJob;
use crate::job_source::JobSource;
use crate::protocol::{CaptureEnvelope, CaptureOutcome, StatusReport, TabId};
use crate::session::{Epoch, Session};
use crate::store::{join_stores, StoreId};
use crate::tab::TabDriver;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Commands accepted by the orchestrator.
#[derive(Debug)]
pub enum Command {
    /// Start a session, cancelling any running one.
    Start {
        /// Tab to bind. The driver's active tab when unset.
        tab: Option<TabId>,
        /// Store set. The configured set when unset or empty.
        stores: Option<Vec<StoreId>>,
        /// Status after the start.
        reply: oneshot::Sender<Result<StatusReport, OrchestratorError>>,
    },
    /// Stop the session.
    Stop {
        /// Status after the stop.
        reply: oneshot::Sender<StatusReport>,
    },
    /// Query the status.
    Status {
        /// Current status.
        reply: oneshot::Sender<StatusReport>,
    },
    /// A page agent message.
    Capture(CaptureEnvelope),
}

/// Completions of spawned work.
#[derive(Debug)]
enum Event {
    JobReady { epoch: Epoch, next: NextJob },
    SettleElapsed { epoch: Epoch },
}

/// Receiving half of the orchestrator channels.
#[derive(Debug)]
pub struct Mailbox {
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<StatusReport>,
}

/// Cloneable handle to a running orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<StatusReport>,
}

impl OrchestratorHandle {
    /// Create a handle and the mailbox the orchestrator will run on.
    pub fn channel() -> (OrchestratorHandle, Mailbox) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(StatusReport::default());

        (
            OrchestratorHandle {
                commands: commands_tx,
                status: status_rx,
            },
            Mailbox {
                commands: commands_rx,
                status: status_tx,
            },
        )
    }

    fn send(&self, command: Command) -> Result<(), OrchestratorError> {
        self.commands
            .send(command)
            .map_err(|_| OrchestratorError::Closed)
    }

    /// Start a session. A running session is cancelled first.
    pub async fn start(
        &self,
        tab: Option<TabId>,
        stores: Option<Vec<StoreId>>,
    ) -> Result<StatusReport, OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { tab, stores, reply })?;
        rx.await.map_err(|_| OrchestratorError::Closed)?
    }

    /// Stop the session.
    pub async fn stop(&self) -> Result<StatusReport, OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { reply })?;
        rx.await.map_err(|_| OrchestratorError::Closed)
    }

    /// Query the status.
    pub async fn status(&self) -> Result<StatusReport, OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply })?;
        rx.await.map_err(|_| OrchestratorError::Closed)
    }

    /// Hand a page agent message to the orchestrator.
    pub fn report_capture(&self, envelope: CaptureEnvelope) -> Result<(), OrchestratorError> {
        self.send(Command::Capture(envelope))
    }

    /// Follow status changes.
    pub fn subscribe(&self) -> watch::Receiver<StatusReport> {
        self.status.clone()
    }

    /// Wait until no session is running or the orchestrator is gone.
    pub async fn wait_until_idle(&self) {
        let mut status = self.subscribe();
        let _ = status.wait_for(|report| !report.running).await;
    }
}

impl CaptureSink for OrchestratorHandle {
    fn deliver(&self, envelope: CaptureEnvelope) -> bool {
        self.report_capture(envelope).is_ok()
    }
}

/// The orchestrator task state.
pub struct Orchestrator {
    config: Configuration,
    session: Session,
    job_source: Arc<dyn JobSource>,
    ingest: Arc<dyn IngestClient>,
    tabs: Arc<dyn TabDriver>,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(
        config: Configuration,
        job_source: Arc<dyn JobSource>,
        ingest: Arc<dyn IngestClient>,
        tabs: Arc<dyn TabDriver>,
    ) -> Self {
        Self {
            config,
            session: Session::new(),
            job_source,
            ingest,
            tabs,
        }
    }

    /// Spawn the orchestrator on the runtime and return its handle.
    pub fn spawn(self) -> OrchestratorHandle {
        let (handle, mailbox) = OrchestratorHandle::channel();
        tokio::spawn(self.run(mailbox));
        handle
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self, mailbox: Mailbox) {
        let Mailbox {
            mut commands,
            status,
        } = mailbox;
        let (events_tx, mut events) = mpsc::unbounded_channel();

        loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => self.handle_event(event, &events_tx).await,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, &events_tx, &status).await,
                    None => break,
                },
            }

            self.publish(&status);
        }

        self.session.stop();
        self.publish(&status);
        log::debug!("orchestrator shut down");
    }

    /// Publish the session status when it changed.
    fn publish(&self, status: &watch::Sender<StatusReport>) {
        status.send_if_modified(|current| {
            let next = self.session.status();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    async fn handle_command(
        &mut self,
        command: Command,
        events: &mpsc::UnboundedSender<Event>,
        status: &watch::Sender<StatusReport>,
    ) {
        // publish before replying
        match command {
            Command::Start { tab, stores, reply } => {
                let result = self.start(tab, stores, events).await;
                self.publish(status);
                let _ = reply.send(result);
            }
            Command::Stop { reply } => {
                if self.session.is_running() {
                    log::info!("session stopped");
                }
                self.session.stop();
                self.publish(status);
                let _ = reply.send(self.session.status());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.session.status());
            }
            Command::Capture(envelope) => self.capture(envelope, events),
        }
    }

    async fn handle_event(&mut self, event: Event, events: &mpsc::UnboundedSender<Event>) {
        match event {
            Event::JobReady { epoch, next } => self.job_ready(epoch, next).await,
            Event::SettleElapsed { epoch } => self.request_job(epoch, events),
        }
    }

    async fn start(
        &mut self,
        tab: Option<TabId>,
        stores: Option<Vec<StoreId>>,
        events: &mpsc::UnboundedSender<Event>,
    ) -> Result<StatusReport, OrchestratorError> {
        if self.session.is_running() {
            log::info!("restarting, cancelling the running session");
            self.session.stop();
        }

        let stores = match stores {
            Some(stores) if !stores.is_empty() => stores,
            _ => self.config.stores(),
        };

        let tab = match tab {
            Some(tab) => tab,
            None => self.tabs.active_tab().await.map_err(|e| {
                log::warn!("no tab to bind the session to: {e}");
                e
            })?,
        };

        log::info!("session started on tab {tab} for {}", join_stores(&stores));

        let epoch = self.session.start(tab, stores);
        self.request_job(epoch, events);

        Ok(self.session.status())
    }

    fn request_job(&mut self, epoch: Epoch, events: &mpsc::UnboundedSender<Event>) {
        let stores = match self.session.request_job(epoch) {
            Some(stores) => stores,
            None => return,
        };

        let source = self.job_source.clone();
        let events = events.clone();

        tokio::spawn(async move {
            let next = source.next(&stores).await;
            let _ = events.send(Event::JobReady { epoch, next });
        });
    }

    async fn job_ready(&mut self, epoch: Epoch, next: NextJob) {
        if !self.session.is_current(epoch) {
            log::debug!("dropping job reply of a cancelled session");
            return;
        }

        let job = match next {
            NextJob::Job(job) => job,
            NextJob::Exhausted => {
                log::info!("done, no more items");
                self.session.finish(epoch);
                return;
            }
        };

        log::info!(
            "next: {} item {} {} {}",
            job.store_id,
            job.item_id,
            job.item_name.as_deref().unwrap_or_default(),
            job.url
        );

        let plan = match self.session.begin_navigation(epoch, job) {
            Some(plan) => plan,
            None => return,
        };

        match self
            .tabs
            .navigate(&plan.tab, &plan.url, plan.navigation)
            .await
        {
            Ok(()) => {
                self.session.navigation_dispatched(epoch, plan.navigation);
            }
            Err(e) => {
                log::warn!("navigation to {} failed, stopping: {e}", plan.url);
                self.session.stop();
            }
        }
    }

    fn capture(&mut self, envelope: CaptureEnvelope, events: &mpsc::UnboundedSender<Event>) {
        let sender = envelope.sender.clone();
        let reported = envelope.message.store();

        let accepted = match self.session.accept_capture(envelope) {
            Ok(accepted) => accepted,
            Err(rejection) => {
                log::debug!("ignoring capture from tab {sender}: {rejection}");
                return;
            }
        };

        if let Some(store) = reported.filter(|s| *s != accepted.job.store_id) {
            log::warn!(
                "page reported store {store} for a {} job, keeping the job store",
                accepted.job.store_id
            );
        }

        if accepted.result.is_success() {
            log::info!(
                "captured {} item {}: ${}",
                accepted.job.store_id,
                accepted.job.item_id,
                accepted.result.price.unwrap_or_default()
            );

            let payload = CapturePayload::new(&accepted.job, &accepted.result);
            let ingest = self.ingest.clone();

            tokio::spawn(async move {
                if let Err(e) = ingest.post(&payload).await {
                    log::warn!(
                        "capture of item {} for run {} not stored: {e}",
                        payload.item_id,
                        payload.capture_run_id
                    );
                }
            });
        } else if let CaptureOutcome::Failure(reason) = &accepted.result.outcome {
            log::warn!(
                "capture failed for {} item {}: {reason} {}",
                accepted.job.store_id,
                accepted.job.item_id,
                accepted.job.url
            );
        }

        let epoch = accepted.epoch;
        let delay = self.config.settle_delay;
        let events = events.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::SettleElapsed { epoch });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IngestError, TabError};
    use crate::protocol::NavigationId;
    use async_trait::async_trait;

    struct NoJobs;

    #[async_trait]
    impl JobSource for NoJobs {
        async fn next(&self, _stores: &[StoreId]) -> NextJob {
            NextJob::Exhausted
        }
    }

    struct NoIngest;

    #[async_trait]
    impl IngestClient for NoIngest {
        async fn post(&self, _payload: &CapturePayload) -> Result<(), IngestError> {
            Ok(())
        }
    }

    struct NoTabs;

    #[async_trait]
    impl TabDriver for NoTabs {
        async fn active_tab(&self) -> Result<TabId, TabError> {
            Err(TabError::NoActiveTab)
        }

        async fn navigate(&self, tab: &TabId, _: &str, _: NavigationId) -> Result<(), TabError> {
            Err(TabError::NotFound(tab.clone()))
        }
    }

    fn spawn() -> OrchestratorHandle {
        Orchestrator::new(
            Configuration::default(),
            Arc::new(NoJobs),
            Arc::new(NoIngest),
            Arc::new(NoTabs),
        )
        .spawn()
    }

    #[tokio::test]
    async fn test_start_without_tab_fails() {
        let handle = spawn();

        let err = handle.start(None, None).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Tab(TabError::NoActiveTab)));
        assert!(!handle.status().await.unwrap().running);
    }

    #[tokio::test]
    async fn test_exhausted_run_goes_idle() {
        let handle = spawn();

        let status = handle
            .start(Some(TabId::from("t1")), Some(vec![StoreId::Aldi]))
            .await
            .unwrap();
        assert!(status.running);
        assert_eq!(status.stores, vec![StoreId::Aldi]);

        handle.wait_until_idle().await;
        assert_eq!(handle.status().await.unwrap(), StatusReport::default());
    }

    #[tokio::test]
    async fn test_handle_reports_closed() {
        let (handle, mailbox) = OrchestratorHandle::channel();
        drop(mailbox);

        assert!(matches!(
            handle.status().await,
            Err(OrchestratorError::Closed)
        ));
    }
}
