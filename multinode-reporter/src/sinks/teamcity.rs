// Copyright (c) The multinode-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TeamCity service message output.
//!
//! Case boundaries and verdicts are rendered as `##teamcity[...]` service
//! messages so a TeamCity build picks them up as test results. Everything
//! else is written as plain lines, which TeamCity attributes to the test
//! that is currently open.

use crate::{
    events::{CaseName, NodeIndex, NodeLogFragment, NodeLogLine, RunnerLogLine, TestNode},
    helpers::{FormattedDuration, plural},
    reporting::{FactData, RunTree},
    sinks::MessageSink,
};
use std::{
    borrow::Cow,
    io::{self, Write},
};
use swrite::{SWrite, swriteln};

/// A sink that renders events and reports as TeamCity service messages.
pub struct TeamCitySink<W> {
    writer: W,
}

impl TeamCitySink<io::Stdout> {
    /// Creates a sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TeamCitySink<W> {
    /// Creates a sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MessageSink for TeamCitySink<W> {
    fn on_case_started(&mut self, nodes: &[TestNode]) -> io::Result<()> {
        match CaseName::from_nodes(nodes) {
            Some(name) => writeln!(
                self.writer,
                "##teamcity[testStarted name='{}' captureStandardOutput='true']",
                teamcity_escape(&name.to_string()),
            ),
            None => self.handle_unknown("case started"),
        }
    }

    fn on_case_finished(&mut self, _nodes: Option<&[TestNode]>) -> io::Result<()> {
        // The case report that follows emits testFailed/testFinished.
        Ok(())
    }

    fn on_node_passed(&mut self, node: NodeIndex, message: Option<&str>) -> io::Result<()> {
        match message {
            Some(message) => writeln!(self.writer, "node {node} passed: {message}"),
            None => writeln!(self.writer, "node {node} passed"),
        }
    }

    fn on_node_failed(&mut self, node: NodeIndex, message: Option<&str>) -> io::Result<()> {
        match message {
            Some(message) => writeln!(self.writer, "node {node} failed: {message}"),
            None => writeln!(self.writer, "node {node} failed"),
        }
    }

    fn on_node_log(&mut self, line: &NodeLogLine) -> io::Result<()> {
        writeln!(self.writer, "{line}")
    }

    fn on_node_log_fragment(&mut self, fragment: &NodeLogFragment) -> io::Result<()> {
        writeln!(self.writer, "{fragment}")
    }

    fn on_runner_log(&mut self, line: &RunnerLogLine) -> io::Result<()> {
        writeln!(self.writer, "{line}")
    }

    fn on_run_ended(&mut self) -> io::Result<()> {
        // The final report carries the summary.
        Ok(())
    }

    fn handle_unknown(&mut self, description: &str) -> io::Result<()> {
        writeln!(self.writer, "unknown message: {description}")
    }

    fn report_case(&mut self, facts: &FactData) -> io::Result<()> {
        let name = facts.name.to_string();
        let name = teamcity_escape(&name);

        if !facts.is_pass() {
            let failed = facts.failed_nodes().count();
            let total = facts.node_facts.len();
            let message = format!("{failed} of {total} {} failed", plural::nodes_str(total));

            let mut details = String::new();
            for result in facts.failed_nodes() {
                swriteln!(details, "--- node {} ---", result.node);
                if result.messages.is_empty() {
                    swriteln!(details, "(none reported: silent failure)");
                } else {
                    for message in &result.messages {
                        swriteln!(details, "{message}");
                    }
                }
            }
            for note in &facts.anomalies {
                match note.node {
                    Some(node) => swriteln!(details, "anomaly (node {node}): {}", note.message),
                    None => swriteln!(details, "anomaly: {}", note.message),
                }
            }

            writeln!(
                self.writer,
                "##teamcity[testFailed name='{name}' message='{}' details='{}']",
                teamcity_escape(&message),
                teamcity_escape(&details),
            )?;
        }

        writeln!(
            self.writer,
            "##teamcity[testFinished name='{name}' duration='{}']",
            facts.elapsed.as_millis(),
        )
    }

    fn report_final(&mut self, tree: &RunTree) -> io::Result<()> {
        let total = tree.specs.len();
        writeln!(
            self.writer,
            "test run completed in {} with {}/{} {} passed",
            FormattedDuration(tree.elapsed),
            tree.passed_count(),
            total,
            plural::specs_str(total),
        )
    }
}

/// Escapes a value for embedding in a TeamCity service message attribute.
///
/// Returns the input unchanged when no escaping is needed.
fn teamcity_escape(input: &str) -> Cow<'_, str> {
    if !input.contains(['|', '\'', ']', '\n', '\r']) {
        return Cow::Borrowed(input);
    }
    let mut escaped = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '|' => escaped.push_str("||"),
            '\'' => escaped.push_str("|'"),
            ']' => escaped.push_str("|]"),
            '\n' => escaped.push_str("|n"),
            '\r' => escaped.push_str("|r"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}
