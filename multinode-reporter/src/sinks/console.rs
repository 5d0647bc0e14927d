// Copyright (c) The multinode-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable console output.

use crate::{
    events::{CaseName, LogLevel, NodeIndex, NodeLogFragment, NodeLogLine, RunnerLogLine, TestNode},
    helpers::plural,
    reporting::{FactData, RunTree},
    sinks::MessageSink,
};
use owo_colors::{OwoColorize, Style};
use std::{
    io::{self, Write},
    time::Duration,
};

/// A sink that renders events and reports as styled console lines.
///
/// Output is uncolored unless [`colorize`](Self::colorize) is called.
pub struct ConsoleSink<W> {
    writer: W,
    styles: Box<Styles>,
}

impl ConsoleSink<io::Stdout> {
    /// Creates a sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    /// Creates a sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            styles: Box::default(),
        }
    }

    /// Colorizes output.
    pub fn colorize(&mut self) {
        self.styles.colorize();
    }

    /// Consumes the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_duration(&mut self, duration: Duration) -> io::Result<()> {
        // Inside the curly braces:
        // * > means right-align.
        // * 8 is the number of characters to pad to.
        // * .3 means print three digits after the decimal point.
        write!(self.writer, "[{:>8.3?}s] ", duration.as_secs_f64())
    }
}

impl<W: Write> MessageSink for ConsoleSink<W> {
    fn on_case_started(&mut self, nodes: &[TestNode]) -> io::Result<()> {
        write!(self.writer, "{:>12} ", "Starting".style(self.styles.pass))?;
        match CaseName::from_nodes(nodes) {
            Some(name) => writeln!(
                self.writer,
                "{name} across {} {}",
                nodes.len().style(self.styles.count),
                plural::nodes_str(nodes.len()),
            ),
            None => writeln!(self.writer, "case with no nodes"),
        }
    }

    fn on_case_finished(&mut self, _nodes: Option<&[TestNode]>) -> io::Result<()> {
        // The case report that follows carries the content.
        Ok(())
    }

    fn on_node_passed(&mut self, node: NodeIndex, message: Option<&str>) -> io::Result<()> {
        write!(self.writer, "{:>12} ", "PASS".style(self.styles.pass))?;
        match message {
            Some(message) => writeln!(self.writer, "node {node}: {message}"),
            None => writeln!(self.writer, "node {node}"),
        }
    }

    fn on_node_failed(&mut self, node: NodeIndex, message: Option<&str>) -> io::Result<()> {
        write!(self.writer, "{:>12} ", "FAIL".style(self.styles.fail))?;
        match message {
            Some(message) => writeln!(self.writer, "node {node}: {message}"),
            None => writeln!(self.writer, "node {node}"),
        }
    }

    fn on_node_log(&mut self, line: &NodeLogLine) -> io::Result<()> {
        writeln!(
            self.writer,
            "{}",
            line.style(self.styles.for_level(line.level))
        )
    }

    fn on_node_log_fragment(&mut self, fragment: &NodeLogFragment) -> io::Result<()> {
        writeln!(self.writer, "{fragment}")
    }

    fn on_runner_log(&mut self, line: &RunnerLogLine) -> io::Result<()> {
        writeln!(
            self.writer,
            "{}",
            line.style(self.styles.for_level(line.level))
        )
    }

    fn on_run_ended(&mut self) -> io::Result<()> {
        write!(self.writer, "{:>12} ", "Finished".style(self.styles.count))?;
        writeln!(self.writer, "test run complete")
    }

    fn handle_unknown(&mut self, description: &str) -> io::Result<()> {
        write!(self.writer, "{:>12} ", "Unknown".style(self.styles.silent))?;
        writeln!(self.writer, "{description}")
    }

    fn report_case(&mut self, facts: &FactData) -> io::Result<()> {
        let (verdict, style) = if facts.is_pass() {
            ("PASS", self.styles.pass)
        } else {
            ("FAIL", self.styles.fail)
        };
        write!(self.writer, "{:>12} ", verdict.style(style))?;
        self.write_duration(facts.elapsed)?;
        writeln!(self.writer, "{}", facts.name)?;

        for result in facts.node_facts.values() {
            let (verdict, style) = match result.passed {
                Some(true) => ("PASS", self.styles.pass),
                Some(false) => ("FAIL", self.styles.fail),
                None => ("SILENT", self.styles.silent),
            };
            write!(self.writer, "{:>12} ", verdict.style(style))?;
            self.write_duration(result.elapsed)?;
            writeln!(self.writer, "node {}", result.node)?;
        }

        if !facts.is_pass() {
            for result in facts.failed_nodes() {
                writeln!(
                    self.writer,
                    "{}{}{}",
                    "--- ".style(self.styles.fail),
                    format!("MESSAGES: node {}", result.node).style(self.styles.fail),
                    " ---".style(self.styles.fail),
                )?;
                if result.messages.is_empty() {
                    writeln!(self.writer, "(none reported: silent failure)")?;
                } else {
                    for message in &result.messages {
                        writeln!(self.writer, "{message}")?;
                    }
                }
            }
        }

        if !facts.anomalies.is_empty() {
            let count = facts.anomalies.len();
            writeln!(
                self.writer,
                "{}",
                format!("--- {count} {} ---", plural::anomalies_str(count))
                    .style(self.styles.silent),
            )?;
            for note in &facts.anomalies {
                match note.node {
                    Some(node) => writeln!(self.writer, "node {node}: {}", note.message)?,
                    None => writeln!(self.writer, "{}", note.message)?,
                }
            }
        }

        Ok(())
    }

    fn report_final(&mut self, tree: &RunTree) -> io::Result<()> {
        let total = tree.specs.len();
        let passed = tree.passed_count();
        let failed = tree.failed_count();

        let summary_style = if failed > 0 {
            self.styles.fail
        } else {
            self.styles.pass
        };
        write!(self.writer, "{:>12} ", "Summary".style(summary_style))?;
        self.write_duration(tree.elapsed)?;
        write!(
            self.writer,
            "{} {} run: {} passed",
            total.style(self.styles.count),
            plural::specs_str(total),
            passed.style(self.styles.pass),
        )?;
        if failed > 0 {
            write!(
                self.writer,
                ", {} {}",
                failed.style(self.styles.count),
                "failed".style(self.styles.fail),
            )?;
        }
        writeln!(self.writer)?;

        for facts in &tree.specs {
            if !facts.is_pass() {
                write!(self.writer, "{:>12} ", "FAIL".style(self.styles.fail))?;
                writeln!(self.writer, "{}", facts.name)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    silent: Style,
    debug: Style,
    info: Style,
    warning: Style,
    error: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.silent = Style::new().yellow().bold();
        self.debug = Style::new().dimmed();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
    }

    fn for_level(&self, level: LogLevel) -> Style {
        match level {
            LogLevel::Debug => self.debug,
            LogLevel::Info => self.info,
            LogLevel::Warning => self.warning,
            LogLevel::Error => self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::RunEvent,
        reporting::{AnomalyNote, NodeResult},
    };
    use chrono::{DateTime, FixedOffset};
    use indexmap::IndexMap;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).expect("valid timestamp")
    }

    fn render(f: impl FnOnce(&mut ConsoleSink<Vec<u8>>)) -> String {
        let mut sink = ConsoleSink::new(Vec::new());
        f(&mut sink);
        String::from_utf8(sink.into_inner()).expect("console output is utf-8")
    }

    fn sample_nodes() -> Vec<TestNode> {
        (1..=2)
            .map(|index| TestNode {
                index: NodeIndex::new(index),
                role: format!("role-{index}"),
                class_name: "ClusterSpec".to_owned(),
                method_name: "converges".to_owned(),
            })
            .collect()
    }

    fn sample_failing_case() -> FactData {
        let mut passed = NodeResult::new(NodeIndex::new(1));
        passed.passed = Some(true);
        passed.elapsed = Duration::from_millis(1200);
        let mut silent = NodeResult::new(NodeIndex::new(2));
        silent.elapsed = Duration::from_millis(2500);

        let mut facts = FactData::new(
            CaseName::new("ClusterSpec", "converges"),
            ts("2026-08-22T10:15:30+00:00"),
        );
        facts.node_facts = IndexMap::from([
            (NodeIndex::new(1), passed),
            (NodeIndex::new(2), silent),
        ]);
        facts.elapsed = Duration::from_millis(2500);
        facts.end_time = Some(ts("2026-08-22T10:15:32.500+00:00"));
        facts.passed = Some(false);
        facts.anomalies.push(AnomalyNote {
            node: None,
            message: "the run ended while ClusterSpec.converges was still open".to_owned(),
        });
        facts
    }

    #[test]
    fn streaming_lines_render_without_color() {
        let output = render(|sink| {
            sink.dispatch(&RunEvent::CaseStarted {
                nodes: sample_nodes(),
            })
            .unwrap();
            sink.dispatch(&RunEvent::NodePassed {
                node: NodeIndex::new(1),
                message: None,
            })
            .unwrap();
            sink.dispatch(&RunEvent::NodeFailed {
                node: NodeIndex::new(2),
                message: Some("barrier timeout".to_owned()),
            })
            .unwrap();
            sink.dispatch(&RunEvent::NodeLog(NodeLogLine {
                node: NodeIndex::new(1),
                level: LogLevel::Info,
                when: ts("2026-08-22T10:15:30.250+00:00"),
                source: "node1".to_owned(),
                message: "joined cluster".to_owned(),
            }))
            .unwrap();
            sink.dispatch(&RunEvent::RunEnded).unwrap();
        });

        let expected = indoc! {"
                Starting ClusterSpec.converges across 2 nodes
                    PASS node 1
                    FAIL node 2: barrier timeout
            [NODE1][10:15:30.250][INFO][node1]: joined cluster
                Finished test run complete
        "};
        assert_eq!(output, expected);
    }

    #[test]
    fn case_report_lists_nodes_and_failure_messages() {
        let facts = sample_failing_case();
        let output = render(|sink| sink.report_case(&facts).unwrap());

        let expected = indoc! {"
                    FAIL [   2.500s] ClusterSpec.converges
                    PASS [   1.200s] node 1
                  SILENT [   2.500s] node 2
            --- MESSAGES: node 2 ---
            (none reported: silent failure)
            --- 1 anomaly ---
            the run ended while ClusterSpec.converges was still open
        "};
        assert_eq!(output, expected);
    }

    #[test]
    fn final_report_summarizes_and_lists_failed_cases() {
        let mut tree = RunTree::new(ts("2026-08-22T10:15:30+00:00"));
        tree.specs.push(sample_failing_case());
        let mut passing = FactData::new(
            CaseName::new("ClusterSpec", "rebalances"),
            ts("2026-08-22T10:15:33+00:00"),
        );
        passing.passed = Some(true);
        passing.elapsed = Duration::from_millis(1500);
        tree.specs.push(passing);
        tree.elapsed = Duration::from_millis(4000);

        let output = render(|sink| sink.report_final(&tree).unwrap());

        // Every line here starts with column padding, which indoc would
        // strip as the common margin.
        let expected = concat!(
            "     Summary [   4.000s] 2 specs run: 1 passed, 1 failed\n",
            "        FAIL ClusterSpec.converges\n",
        );
        assert_eq!(output, expected);
    }

    #[test]
    fn colorized_verdicts_carry_escape_codes() {
        let output = render(|sink| {
            sink.colorize();
            sink.on_node_passed(NodeIndex::new(1), None).unwrap();
        });
        assert!(output.contains("\u{1b}["), "expected ANSI escapes: {output:?}");
        assert!(output.contains("PASS"));
    }
}
