// Copyright (c) The multinode-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event loop that connects event producers to the aggregator and
//! sinks.
//!
//! A [`RunCoordinator`] owns the [`RunAggregator`] and every attached
//! [`MessageSink`], and consumes events from an unbounded channel one at a
//! time, so sinks and the aggregator never need their own locking. The
//! [`CoordinatorHandle`] is the producer side: it is cheap to clone, can be
//! sent to node launchers, and answers the shutdown question of whether the
//! final report has been delivered.

use crate::{
    aggregator::{IngestOutcome, RunAggregator},
    errors::{IngestError, ShutdownError},
    events::RunEvent,
    reporting::RunTree,
    sinks::MessageSink,
};
use debug_ignore::DebugIgnore;
use std::time::Duration;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time,
};
use tracing::{debug, warn};

/// Assembles a [`RunCoordinator`] and its [`CoordinatorHandle`].
#[derive(Debug, Default)]
pub struct CoordinatorBuilder {
    sinks: DebugIgnore<Vec<Box<dyn MessageSink + Send>>>,
}

impl CoordinatorBuilder {
    /// Creates a builder with no sinks attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a sink. Sinks receive events and reports in attachment
    /// order.
    pub fn add_sink(&mut self, sink: impl MessageSink + Send + 'static) -> &mut Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Builds the coordinator and the handle event producers use to reach
    /// it.
    pub fn build(self) -> (RunCoordinator, CoordinatorHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (terminated_tx, terminated_rx) = watch::channel(false);
        let coordinator = RunCoordinator {
            aggregator: RunAggregator::new(),
            sinks: self.sinks,
            event_rx,
            terminated_tx,
        };
        let handle = CoordinatorHandle {
            event_tx,
            terminated_rx,
        };
        (coordinator, handle)
    }
}

/// The consumer side of a run: aggregates every event and drives the
/// attached sinks.
#[derive(Debug)]
pub struct RunCoordinator {
    aggregator: RunAggregator,
    sinks: DebugIgnore<Vec<Box<dyn MessageSink + Send>>>,
    event_rx: mpsc::UnboundedReceiver<RunEvent>,
    terminated_tx: watch::Sender<bool>,
}

impl RunCoordinator {
    /// Consumes events until the run ends, then returns the result tree.
    ///
    /// The final report is delivered to every sink before the termination
    /// flag is raised, so a caller that waits on
    /// [`CoordinatorHandle::can_terminate`] never cuts reporting short. If
    /// every handle is dropped before a run-end event arrives, one is
    /// synthesized so the tree still closes.
    pub async fn run(mut self) -> RunTree {
        loop {
            match self.event_rx.recv().await {
                Some(event) => {
                    self.dispatch_to_sinks(&event);
                    match self.aggregator.ingest(event) {
                        Ok(outcome) => {
                            if self.handle_outcome(outcome) {
                                break;
                            }
                        }
                        Err(error) => {
                            warn!("event rejected: {error}");
                        }
                    }
                }
                None => {
                    warn!("all event senders dropped before the run ended; synthesizing run end");
                    if let Ok(outcome) = self.aggregator.ingest(RunEvent::RunEnded) {
                        let _finished = self.handle_outcome(outcome);
                    }
                    break;
                }
            }
        }
        self.aggregator.into_run_tree()
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> JoinHandle<RunTree> {
        tokio::spawn(self.run())
    }

    fn dispatch_to_sinks(&mut self, event: &RunEvent) {
        for sink in self.sinks.iter_mut() {
            if let Err(error) = sink.dispatch(event) {
                warn!("failed to write an event: {error}");
            }
        }
    }

    /// Returns true once the run is over and the final report has been
    /// delivered.
    fn handle_outcome(&mut self, outcome: IngestOutcome) -> bool {
        match outcome {
            IngestOutcome::Applied => false,
            IngestOutcome::CaseFinalized => {
                self.report_last_case();
                false
            }
            IngestOutcome::RunFinished { case_finalized } => {
                if case_finalized {
                    self.report_last_case();
                }
                self.finish_run();
                true
            }
        }
    }

    fn report_last_case(&mut self) {
        let Some(facts) = self.aggregator.run_tree().specs.last() else {
            return;
        };
        for sink in self.sinks.iter_mut() {
            if let Err(error) = sink.report_case(facts) {
                warn!("failed to write a case report: {error}");
            }
        }
    }

    fn finish_run(&mut self) {
        for sink in self.sinks.iter_mut() {
            if let Err(error) = sink.report_final(self.aggregator.run_tree()) {
                warn!("failed to write the final report: {error}");
            }
        }
        self.aggregator.terminate();
        // Close the inbox first so an ingest attempt that races with
        // termination fails rather than landing in a drained channel.
        self.event_rx.close();
        // Waiters may have gone away already.
        let _ = self.terminated_tx.send(true);
        debug!("final report delivered; run terminated");
    }
}

/// The producer side of a run.
///
/// Handles are cheap to clone; one is typically given to each node
/// launcher plus the shutdown path.
#[derive(Clone, Debug)]
pub struct CoordinatorHandle {
    event_tx: mpsc::UnboundedSender<RunEvent>,
    terminated_rx: watch::Receiver<bool>,
}

impl CoordinatorHandle {
    /// Sends an event to the coordinator.
    ///
    /// Fails once the coordinator has terminated or gone away, handing the
    /// event back to the caller.
    pub fn ingest(&self, event: RunEvent) -> Result<(), IngestError> {
        self.event_tx
            .send(event)
            .map_err(|error| IngestError(error.0))
    }

    /// Waits until the final report has been delivered.
    ///
    /// Returns immediately if it already has. Otherwise blocks until the
    /// coordinator raises the termination flag, the coordinator goes away,
    /// or `timeout` elapses, whichever comes first.
    pub async fn can_terminate(&self, timeout: Duration) -> Result<(), ShutdownError> {
        let mut terminated_rx = self.terminated_rx.clone();
        match time::timeout(timeout, terminated_rx.wait_for(|done| *done)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(ShutdownError::Abandoned),
            Err(_) => Err(ShutdownError::Timeout { timeout }),
        }
    }

    /// Whether the final report has been delivered.
    pub fn is_terminated(&self) -> bool {
        *self.terminated_rx.borrow()
    }
}
