// Copyright (c) The multinode-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregates run events into the result tree.
//!
//! The main structure in this module is [`RunAggregator`]. It consumes one
//! event at a time through [`ingest`](RunAggregator::ingest), updates the
//! [`RunTree`] and tells the caller which outbound reports are due. All
//! mutation is serialized by construction: the aggregator has no interior
//! concurrency, and the [coordinator](crate::coordinator) drives it from a
//! single consumer loop.

use crate::{
    errors::InvalidEventError,
    events::{CaseName, NodeIndex, NodeLogFragment, NodeLogLine, RunEvent, RunnerLogLine, TestNode},
    reporting::{AnomalyNote, FactData, NodeResult, ResultMessage, RunTree},
    time::{StopwatchStart, stopwatch},
};
use tracing::warn;

/// Lifecycle phase of a run.
///
/// `Idle` and `CaseOpen` alternate while cases run. `Draining` is entered
/// when the run-end event is ingested; `Terminated` once the final report
/// has been delivered to every sink.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunPhase {
    /// No case is open.
    Idle,

    /// Exactly one case is open.
    CaseOpen,

    /// The run has ended; the final report is being delivered.
    Draining,

    /// The final report has been delivered.
    Terminated,
}

/// What an ingested event obligates the caller to do next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[must_use = "outcomes tell the caller which reports are due"]
pub enum IngestOutcome {
    /// The event was applied; nothing further is due.
    Applied,

    /// A case was finalized; its results should be reported to every sink.
    CaseFinalized,

    /// The run finished; the final report is due after any pending case
    /// report.
    RunFinished {
        /// True if ingesting the run end also finalized a case that was
        /// still open.
        case_finalized: bool,
    },
}

/// Builds the result tree of one run from its event stream.
///
/// The aggregator is the sole writer of its tree. `ingest` never blocks and
/// never reorders: arrival order is processing order. Structurally
/// malformed events are rejected with [`InvalidEventError`] and leave the
/// state untouched; semantically out-of-order events are recovered in place
/// and recorded as [`AnomalyNote`]s on the affected case.
#[derive(Debug)]
pub struct RunAggregator {
    stopwatch: StopwatchStart,
    tree: RunTree,
    open_case: Option<OpenCase>,
    phase: RunPhase,
}

#[derive(Debug)]
struct OpenCase {
    facts: FactData,
    stopwatch: StopwatchStart,
}

impl RunAggregator {
    /// Creates an aggregator for a run starting now.
    pub fn new() -> Self {
        let stopwatch = stopwatch();
        let tree = RunTree::new(stopwatch.start_time().fixed_offset());
        Self {
            stopwatch,
            tree,
            open_case: None,
            phase: RunPhase::Idle,
        }
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Applies one event to the tree.
    ///
    /// This is the single mutating entry point. The returned outcome tells
    /// the caller whether a case report or the final report is now due.
    pub fn ingest(&mut self, event: RunEvent) -> Result<IngestOutcome, InvalidEventError> {
        match event {
            RunEvent::CaseStarted { nodes } => self.case_started(nodes),
            RunEvent::CaseFinished { nodes } => Ok(self.case_finished(nodes)),
            RunEvent::NodePassed { node, message } => Ok(self.node_verdict(node, true, message)),
            RunEvent::NodeFailed { node, message } => Ok(self.node_verdict(node, false, message)),
            RunEvent::NodeLog(line) => Ok(self.node_log(line)),
            RunEvent::NodeLogFragment(fragment) => Ok(self.node_fragment(fragment)),
            RunEvent::RunnerLog(line) => Ok(self.runner_log(line)),
            RunEvent::RunEnded => Ok(self.run_ended()),
        }
    }

    /// A snapshot of the open case, or of the most recently finalized one
    /// if no case is open.
    ///
    /// Snapshots of an open case carry the duration so far; the stored
    /// verdict stays unset until finalization.
    pub fn current_facts(&self) -> Option<FactData> {
        match &self.open_case {
            Some(open) => {
                let mut facts = open.facts.clone();
                facts.elapsed = open.stopwatch.snapshot().duration;
                Some(facts)
            }
            None => self.tree.specs.last().cloned(),
        }
    }

    /// The tree of finalized cases so far. An open case is not included.
    pub fn run_tree(&self) -> &RunTree {
        &self.tree
    }

    /// Consumes the aggregator, returning the tree.
    pub fn into_run_tree(self) -> RunTree {
        self.tree
    }

    /// Marks the final report as delivered.
    ///
    /// Called by the coordinator once every sink has received the final
    /// tree; after this the run is over for good.
    pub fn terminate(&mut self) {
        self.phase = RunPhase::Terminated;
    }

    fn case_started(&mut self, nodes: Vec<TestNode>) -> Result<IngestOutcome, InvalidEventError> {
        // Validation precedes phase handling: a malformed event is rejected
        // no matter what state the run is in.
        let Some(name) = CaseName::from_nodes(&nodes) else {
            warn!("rejecting case start with an empty node list");
            return Err(InvalidEventError::EmptyNodeList);
        };
        if self.run_over() {
            self.note_stray(None, format!("case start for {name} arrived after the run ended"));
            return Ok(IngestOutcome::Applied);
        }

        let mut outcome = IngestOutcome::Applied;
        if let Some(open) = &mut self.open_case {
            let message = format!(
                "case start for {name} arrived while {} was still open; \
                 force-closing the open case as failed",
                open.facts.name,
            );
            warn!("{message}");
            open.facts.anomalies.push(AnomalyNote {
                node: None,
                message,
            });
            self.finalize_open_case(true);
            outcome = IngestOutcome::CaseFinalized;
        }

        let case_stopwatch = stopwatch();
        let mut facts = FactData::new(name, case_stopwatch.start_time().fixed_offset());
        // Seed a record per listed node so one that never reports anything
        // is still visible, and visibly failed, in the results.
        for node in &nodes {
            facts
                .node_facts
                .entry(node.index)
                .or_insert_with(|| NodeResult::new(node.index));
        }
        self.open_case = Some(OpenCase {
            facts,
            stopwatch: case_stopwatch,
        });
        self.phase = RunPhase::CaseOpen;
        Ok(outcome)
    }

    fn case_finished(&mut self, nodes: Option<Vec<TestNode>>) -> IngestOutcome {
        if self.run_over() {
            self.note_stray(None, "case finish arrived after the run ended".to_owned());
            return IngestOutcome::Applied;
        }
        let Some(open) = &mut self.open_case else {
            self.note_stray(None, "case finish arrived with no case open".to_owned());
            return IngestOutcome::Applied;
        };

        // Identity always comes from the case start; a mismatched finish
        // payload is recorded but otherwise ignored.
        if let Some(name) = nodes.as_deref().and_then(CaseName::from_nodes)
            && name != open.facts.name
        {
            let message = format!("case finish named {name} while {} was open", open.facts.name);
            warn!("{message}");
            open.facts.anomalies.push(AnomalyNote {
                node: None,
                message,
            });
        }

        self.finalize_open_case(false);
        self.phase = RunPhase::Idle;
        IngestOutcome::CaseFinalized
    }

    fn node_verdict(
        &mut self,
        node: NodeIndex,
        passed: bool,
        message: Option<String>,
    ) -> IngestOutcome {
        let verdict = if passed { "pass" } else { "fail" };
        if self.run_over() {
            self.note_stray(
                Some(node),
                format!("node {node} reported a {verdict} after the run ended"),
            );
            return IngestOutcome::Applied;
        }
        let Some(open) = &mut self.open_case else {
            let detail = match &message {
                Some(message) => format!(": {message}"),
                None => String::new(),
            };
            self.note_stray(
                Some(node),
                format!("node {node} reported a {verdict} with no case open{detail}"),
            );
            return IngestOutcome::Applied;
        };

        let elapsed = open.stopwatch.snapshot().duration;
        if let Some(previous) = open.facts.node(node).and_then(|result| result.passed) {
            let message = format!(
                "node {node} reported a {verdict} after already reporting a {}; \
                 keeping the latest report",
                if previous { "pass" } else { "fail" },
            );
            warn!("{message}");
            open.facts.anomalies.push(AnomalyNote {
                node: Some(node),
                message,
            });
        }
        let result = open
            .facts
            .node_facts
            .entry(node)
            .or_insert_with(|| NodeResult::new(node));
        result.passed = Some(passed);
        result.elapsed = elapsed;
        if let Some(message) = message {
            result.messages.push(ResultMessage::Verdict(message));
        }
        IngestOutcome::Applied
    }

    fn node_log(&mut self, line: NodeLogLine) -> IngestOutcome {
        if self.run_over() {
            self.note_stray(
                Some(line.node),
                format!("log line arrived after the run ended: {line}"),
            );
            return IngestOutcome::Applied;
        }
        let Some(open) = &mut self.open_case else {
            self.note_stray(
                Some(line.node),
                format!("log line arrived with no case open: {line}"),
            );
            return IngestOutcome::Applied;
        };
        let result = open
            .facts
            .node_facts
            .entry(line.node)
            .or_insert_with(|| NodeResult::new(line.node));
        result.messages.push(ResultMessage::Log(line));
        IngestOutcome::Applied
    }

    fn node_fragment(&mut self, fragment: NodeLogFragment) -> IngestOutcome {
        if self.run_over() {
            self.note_stray(
                Some(fragment.node),
                format!("log fragment arrived after the run ended: {fragment}"),
            );
            return IngestOutcome::Applied;
        }
        let Some(open) = &mut self.open_case else {
            self.note_stray(
                Some(fragment.node),
                format!("log fragment arrived with no case open: {fragment}"),
            );
            return IngestOutcome::Applied;
        };
        let result = open
            .facts
            .node_facts
            .entry(fragment.node)
            .or_insert_with(|| NodeResult::new(fragment.node));
        result.messages.push(ResultMessage::Fragment(fragment));
        IngestOutcome::Applied
    }

    fn runner_log(&mut self, line: RunnerLogLine) -> IngestOutcome {
        if self.run_over() {
            warn!("runner log line arrived after the run ended: {line}");
            return IngestOutcome::Applied;
        }
        // Runner lines are run-scoped: they go to the tree even while a
        // case is open.
        self.tree.runner_log.push(line);
        IngestOutcome::Applied
    }

    fn run_ended(&mut self) -> IngestOutcome {
        if self.run_over() {
            warn!("run end received more than once");
            return IngestOutcome::Applied;
        }
        let case_finalized = self.open_case.is_some();
        if let Some(open) = &mut self.open_case {
            let message = format!("the run ended while {} was still open", open.facts.name);
            warn!("{message}");
            open.facts.anomalies.push(AnomalyNote {
                node: None,
                message,
            });
            // Abnormal finalization: nodes without a verdict count as
            // failed under the usual conjunction rule.
            self.finalize_open_case(false);
        }
        let snapshot = self.stopwatch.snapshot();
        self.tree.elapsed = snapshot.duration;
        self.tree.end_time = Some(snapshot.end_time().fixed_offset());
        self.phase = RunPhase::Draining;
        IngestOutcome::RunFinished { case_finalized }
    }

    fn run_over(&self) -> bool {
        matches!(self.phase, RunPhase::Draining | RunPhase::Terminated)
    }

    /// Records an event that had nowhere to go on the most recently
    /// finalized case. Before any case has finalized, the warning is the
    /// only trace.
    fn note_stray(&mut self, node: Option<NodeIndex>, message: String) {
        warn!("{message}");
        if let Some(facts) = self.tree.specs.last_mut() {
            facts.anomalies.push(AnomalyNote { node, message });
        }
    }

    fn finalize_open_case(&mut self, forced_fail: bool) {
        let Some(open) = self.open_case.take() else {
            return;
        };
        let OpenCase {
            mut facts,
            stopwatch,
        } = open;
        let snapshot = stopwatch.snapshot();
        facts.elapsed = snapshot.duration;
        facts.end_time = Some(snapshot.end_time().fixed_offset());
        // Nodes that never reported a verdict are charged the whole case.
        for result in facts.node_facts.values_mut() {
            if result.passed.is_none() {
                result.elapsed = snapshot.duration;
            }
        }
        let passed = if forced_fail {
            false
        } else {
            facts.all_nodes_passed()
        };
        facts.passed = Some(passed);
        self.tree.specs.push(facts);
    }
}

impl Default for RunAggregator {
    fn default() -> Self {
        Self::new()
    }
}
