// Copyright (c) The multinode-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The result tree built up from run events.
//!
//! One [`RunTree`] holds every finalized case as a [`FactData`], which in
//! turn holds one [`NodeResult`] per participating node. The
//! [`RunAggregator`](crate::aggregator::RunAggregator) is the sole writer;
//! sinks receive these types read-only.

use crate::events::{CaseName, NodeIndex, NodeLogFragment, NodeLogLine, RunnerLogLine};
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use std::{fmt, time::Duration};

/// One entry in a node's message log.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResultMessage {
    /// A complete log line.
    Log(NodeLogLine),

    /// A partial log line, stored verbatim.
    Fragment(NodeLogFragment),

    /// The message that accompanied the node's pass or fail report.
    Verdict(String),
}

impl fmt::Display for ResultMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultMessage::Log(line) => write!(f, "{line}"),
            ResultMessage::Fragment(fragment) => write!(f, "{fragment}"),
            ResultMessage::Verdict(message) => write!(f, "{message}"),
        }
    }
}

/// The record of one node's participation in one case.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeResult {
    /// The node this record belongs to.
    pub node: NodeIndex,

    /// The node's verdict. `None` until a pass or fail report arrives; a
    /// node still at `None` when the case is finalized counts as failed.
    pub passed: Option<bool>,

    /// Time from case start to the node's verdict, or the whole case
    /// duration if the node never reported one.
    pub elapsed: Duration,

    /// Everything the node sent while the case was open, in arrival order.
    pub messages: Vec<ResultMessage>,
}

impl NodeResult {
    /// Creates an empty record for a node.
    pub fn new(node: NodeIndex) -> Self {
        Self {
            node,
            passed: None,
            elapsed: Duration::ZERO,
            messages: Vec::new(),
        }
    }
}

/// A recovered protocol anomaly, kept visible in the final report.
///
/// Anomalies record events that were semantically out of order (duplicate
/// verdicts, overlapping case starts, events with no case open). The
/// aggregator recovers from each of these in a defined way; the note is the
/// durable trace of what happened.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnomalyNote {
    /// The node involved, when the anomaly was node-scoped.
    pub node: Option<NodeIndex>,

    /// What was observed and how it was recovered.
    pub message: String,
}

/// The aggregate record of one test case.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FactData {
    /// Identity of the case.
    pub name: CaseName,

    /// Wall-clock time the case was opened.
    pub start_time: DateTime<FixedOffset>,

    /// Wall-clock time the case was finalized. `None` while it is open.
    pub end_time: Option<DateTime<FixedOffset>>,

    /// Time from open to finalization. Snapshots of an open case carry the
    /// duration so far.
    pub elapsed: Duration,

    /// Per-node records, keyed by node index in first-seen order.
    pub node_facts: IndexMap<NodeIndex, NodeResult>,

    /// The case verdict. `None` while the case is open; fixed at
    /// finalization and never recomputed afterwards.
    pub passed: Option<bool>,

    /// Anomalies recorded while this case was the current one.
    pub anomalies: Vec<AnomalyNote>,
}

impl FactData {
    /// Creates an open case with no nodes recorded yet.
    pub fn new(name: CaseName, start_time: DateTime<FixedOffset>) -> Self {
        Self {
            name,
            start_time,
            end_time: None,
            elapsed: Duration::ZERO,
            node_facts: IndexMap::new(),
            passed: None,
            anomalies: Vec::new(),
        }
    }

    /// Returns the record for one node, if it has been seen.
    pub fn node(&self, node: NodeIndex) -> Option<&NodeResult> {
        self.node_facts.get(&node)
    }

    /// Conjunction over per-node verdicts: true only if at least one node
    /// is recorded and every recorded node reported a pass.
    pub fn all_nodes_passed(&self) -> bool {
        !self.node_facts.is_empty()
            && self
                .node_facts
                .values()
                .all(|result| result.passed == Some(true))
    }

    /// Whether the finalized verdict is a pass.
    pub fn is_pass(&self) -> bool {
        self.passed == Some(true)
    }

    /// The nodes that did not report a pass, in first-seen order.
    pub fn failed_nodes(&self) -> impl Iterator<Item = &NodeResult> {
        self.node_facts
            .values()
            .filter(|result| result.passed != Some(true))
    }
}

/// The aggregate record of a whole run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunTree {
    /// Wall-clock time the run started.
    pub start_time: DateTime<FixedOffset>,

    /// Wall-clock time the run ended. `None` while it is in flight.
    pub end_time: Option<DateTime<FixedOffset>>,

    /// Time from run start to run end.
    pub elapsed: Duration,

    /// Finalized cases, in finalization order. A case that is still open
    /// does not appear here.
    pub specs: Vec<FactData>,

    /// Log lines from the runner itself, in arrival order.
    pub runner_log: Vec<RunnerLogLine>,
}

impl RunTree {
    /// Creates an empty tree for a run starting now.
    pub fn new(start_time: DateTime<FixedOffset>) -> Self {
        Self {
            start_time,
            end_time: None,
            elapsed: Duration::ZERO,
            specs: Vec::new(),
            runner_log: Vec::new(),
        }
    }

    /// The number of finalized cases that passed.
    pub fn passed_count(&self) -> usize {
        self.specs.iter().filter(|facts| facts.is_pass()).count()
    }

    /// The number of finalized cases that failed.
    pub fn failed_count(&self) -> usize {
        self.specs.len() - self.passed_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogLevel;

    fn start_time() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-08-22T09:00:00+00:00").expect("valid timestamp")
    }

    fn facts_with_verdicts(verdicts: &[(u32, Option<bool>)]) -> FactData {
        let mut facts = FactData::new(CaseName::new("ClusterSpec", "converges"), start_time());
        for &(index, passed) in verdicts {
            let node = NodeIndex::new(index);
            let mut result = NodeResult::new(node);
            result.passed = passed;
            facts.node_facts.insert(node, result);
        }
        facts
    }

    #[test]
    fn verdict_is_a_conjunction() {
        let empty = facts_with_verdicts(&[]);
        assert!(!empty.all_nodes_passed(), "no nodes is not a pass");

        let all_passed = facts_with_verdicts(&[(1, Some(true)), (2, Some(true))]);
        assert!(all_passed.all_nodes_passed());

        let one_failed = facts_with_verdicts(&[(1, Some(true)), (2, Some(false))]);
        assert!(!one_failed.all_nodes_passed());

        // A node that never reported counts as failed.
        let one_silent = facts_with_verdicts(&[(1, Some(true)), (2, None)]);
        assert!(!one_silent.all_nodes_passed());
    }

    #[test]
    fn failed_nodes_keeps_first_seen_order() {
        let facts = facts_with_verdicts(&[(3, None), (1, Some(true)), (2, Some(false))]);
        let failed: Vec<_> = facts
            .failed_nodes()
            .map(|result| result.node.get())
            .collect();
        assert_eq!(failed, [3, 2]);
    }

    #[test]
    fn run_tree_counts_passed_specs() {
        let mut tree = RunTree::new(start_time());
        for passed in [true, false, true] {
            let mut facts = facts_with_verdicts(&[(1, Some(passed))]);
            facts.passed = Some(passed);
            tree.specs.push(facts);
        }
        assert_eq!(tree.passed_count(), 2);
        assert_eq!(tree.failed_count(), 1);
    }

    #[test]
    fn result_message_renders_its_payload() {
        let line = NodeLogLine {
            node: NodeIndex::new(1),
            level: LogLevel::Info,
            when: start_time(),
            source: "cluster".to_owned(),
            message: "joined".to_owned(),
        };
        assert_eq!(
            ResultMessage::Log(line).to_string(),
            "[NODE1][09:00:00.000][INFO][cluster]: joined"
        );
        assert_eq!(
            ResultMessage::Verdict("assertion held on all nodes".to_owned()).to_string(),
            "assertion held on all nodes"
        );
    }
}
