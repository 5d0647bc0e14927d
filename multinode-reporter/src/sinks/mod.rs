// Copyright (c) The multinode-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sinks render run events and reports to an output backend.
//!
//! A [`MessageSink`] receives every event the coordinator ingests, plus the
//! per-case and final reports once the aggregator finalizes them. The
//! provided [`dispatch`](MessageSink::dispatch) method routes each event to
//! a per-kind handler; handlers a backend does not override fall through to
//! [`handle_unknown`](MessageSink::handle_unknown), so a minimal sink still
//! sees every event in some form.

use crate::{
    events::{CaseName, NodeIndex, NodeLogFragment, NodeLogLine, RunEvent, RunnerLogLine, TestNode},
    reporting::{FactData, RunTree},
};
use std::io;

mod console;
mod teamcity;

pub use console::ConsoleSink;
pub use teamcity::TeamCitySink;

/// An output backend for run events and reports.
///
/// Backends implement the three required methods and override the per-event
/// handlers they care about. Handlers return `io::Result` so a broken pipe
/// surfaces at the call site instead of panicking mid-run.
pub trait MessageSink {
    /// Routes an event to the matching handler.
    fn dispatch(&mut self, event: &RunEvent) -> io::Result<()> {
        match event {
            RunEvent::CaseStarted { nodes } => self.on_case_started(nodes),
            RunEvent::CaseFinished { nodes } => self.on_case_finished(nodes.as_deref()),
            RunEvent::NodePassed { node, message } => {
                self.on_node_passed(*node, message.as_deref())
            }
            RunEvent::NodeFailed { node, message } => {
                self.on_node_failed(*node, message.as_deref())
            }
            RunEvent::NodeLog(line) => self.on_node_log(line),
            RunEvent::NodeLogFragment(fragment) => self.on_node_log_fragment(fragment),
            RunEvent::RunnerLog(line) => self.on_runner_log(line),
            RunEvent::RunEnded => self.on_run_ended(),
        }
    }

    /// A test case began.
    fn on_case_started(&mut self, nodes: &[TestNode]) -> io::Result<()> {
        match CaseName::from_nodes(nodes) {
            Some(name) => self.handle_unknown(&format!("case started: {name}")),
            None => self.handle_unknown("case started"),
        }
    }

    /// The open test case ended.
    fn on_case_finished(&mut self, nodes: Option<&[TestNode]>) -> io::Result<()> {
        match nodes.and_then(CaseName::from_nodes) {
            Some(name) => self.handle_unknown(&format!("case finished: {name}")),
            None => self.handle_unknown("case finished"),
        }
    }

    /// A node reported a pass.
    fn on_node_passed(&mut self, node: NodeIndex, message: Option<&str>) -> io::Result<()> {
        match message {
            Some(message) => self.handle_unknown(&format!("node {node} passed: {message}")),
            None => self.handle_unknown(&format!("node {node} passed")),
        }
    }

    /// A node reported a failure.
    fn on_node_failed(&mut self, node: NodeIndex, message: Option<&str>) -> io::Result<()> {
        match message {
            Some(message) => self.handle_unknown(&format!("node {node} failed: {message}")),
            None => self.handle_unknown(&format!("node {node} failed")),
        }
    }

    /// A node produced a complete log line.
    fn on_node_log(&mut self, line: &NodeLogLine) -> io::Result<()> {
        self.handle_unknown(&line.to_string())
    }

    /// A node produced a partial log line.
    fn on_node_log_fragment(&mut self, fragment: &NodeLogFragment) -> io::Result<()> {
        self.handle_unknown(&fragment.to_string())
    }

    /// The runner produced a log line.
    fn on_runner_log(&mut self, line: &RunnerLogLine) -> io::Result<()> {
        self.handle_unknown(&line.to_string())
    }

    /// No further events will arrive.
    fn on_run_ended(&mut self) -> io::Result<()> {
        self.handle_unknown("run ended")
    }

    /// Receives a description of any event the backend did not handle.
    fn handle_unknown(&mut self, description: &str) -> io::Result<()>;

    /// Renders the results of a finalized case.
    fn report_case(&mut self, facts: &FactData) -> io::Result<()>;

    /// Renders the final report for the whole run.
    fn report_final(&mut self, tree: &RunTree) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogLevel;
    use chrono::{DateTime, FixedOffset};

    /// A sink that implements only the required methods, so every event
    /// falls through to `handle_unknown`.
    #[derive(Default)]
    struct RecordingSink {
        unknown: Vec<String>,
    }

    impl MessageSink for RecordingSink {
        fn handle_unknown(&mut self, description: &str) -> io::Result<()> {
            self.unknown.push(description.to_owned());
            Ok(())
        }

        fn report_case(&mut self, _facts: &FactData) -> io::Result<()> {
            Ok(())
        }

        fn report_final(&mut self, _tree: &RunTree) -> io::Result<()> {
            Ok(())
        }
    }

    fn when() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-08-22T10:15:30+00:00").expect("valid timestamp")
    }

    fn nodes() -> Vec<TestNode> {
        vec![TestNode {
            index: NodeIndex::new(1),
            role: "seed".to_owned(),
            class_name: "ClusterSpec".to_owned(),
            method_name: "converges".to_owned(),
        }]
    }

    #[test]
    fn unhandled_events_fall_through_with_descriptions() {
        let mut sink = RecordingSink::default();
        let events = [
            RunEvent::CaseStarted { nodes: nodes() },
            RunEvent::NodePassed {
                node: NodeIndex::new(1),
                message: None,
            },
            RunEvent::NodeFailed {
                node: NodeIndex::new(2),
                message: Some("barrier timeout".to_owned()),
            },
            RunEvent::NodeLog(NodeLogLine {
                node: NodeIndex::new(1),
                level: LogLevel::Info,
                when: when(),
                source: "node1".to_owned(),
                message: "joined".to_owned(),
            }),
            RunEvent::NodeLogFragment(NodeLogFragment {
                node: NodeIndex::new(1),
                when: when(),
                message: "partial".to_owned(),
            }),
            RunEvent::RunnerLog(RunnerLogLine {
                level: LogLevel::Debug,
                when: when(),
                source: "runner".to_owned(),
                message: "spawning".to_owned(),
            }),
            RunEvent::CaseFinished { nodes: None },
            RunEvent::RunEnded,
        ];
        for event in &events {
            sink.dispatch(event).unwrap();
        }

        assert_eq!(sink.unknown.len(), events.len());
        assert_eq!(sink.unknown[0], "case started: ClusterSpec.converges");
        assert_eq!(sink.unknown[1], "node 1 passed");
        assert_eq!(sink.unknown[2], "node 2 failed: barrier timeout");
        assert!(sink.unknown[3].contains("[NODE1]"));
        assert!(sink.unknown[4].contains("partial"));
        assert!(sink.unknown[5].contains("[RUNNER]"));
        assert_eq!(sink.unknown[6], "case finished");
        assert_eq!(sink.unknown[7], "run ended");
    }

    #[test]
    fn overridden_handlers_do_not_fall_through() {
        struct IgnoringSink {
            unknown: Vec<String>,
        }

        impl MessageSink for IgnoringSink {
            fn on_run_ended(&mut self) -> io::Result<()> {
                // Recognized and dropped on purpose.
                Ok(())
            }

            fn handle_unknown(&mut self, description: &str) -> io::Result<()> {
                self.unknown.push(description.to_owned());
                Ok(())
            }

            fn report_case(&mut self, _facts: &FactData) -> io::Result<()> {
                Ok(())
            }

            fn report_final(&mut self, _tree: &RunTree) -> io::Result<()> {
                Ok(())
            }
        }

        let mut sink = IgnoringSink { unknown: vec![] };
        sink.dispatch(&RunEvent::RunEnded).unwrap();
        assert!(sink.unknown.is_empty());
    }
}
