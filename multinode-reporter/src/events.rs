// Copyright (c) The multinode-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events flowing from test nodes and the runner into the reporting
//! pipeline.
//!
//! Nodes emit these concurrently over an out-of-band transport; by the time
//! they reach this crate they form one serial stream in arrival order. The
//! event set is closed: [`RunEvent`] is the whole inbound surface.

use crate::errors::LogLevelParseError;
use chrono::{DateTime, FixedOffset};
use std::{fmt, str::FromStr};

/// Identifies one participant process within a single test case.
///
/// Indexes are stable for the duration of that case only; the next case may
/// reuse them for different processes.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeIndex(u32);

impl NodeIndex {
    /// Creates a node index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the index as a plain integer.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a multi-node test case: a class name and a method name.
///
/// Derived from the first entry of the node list supplied with a case
/// start. All nodes of one case share this identity.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CaseName {
    class_name: String,
    method_name: String,
}

impl CaseName {
    /// Creates a case name from its parts.
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }

    /// Derives the case identity from a node list, taking the first entry.
    ///
    /// Returns `None` for an empty list: a case with no nodes has no
    /// identity.
    pub fn from_nodes(nodes: &[TestNode]) -> Option<Self> {
        nodes.first().map(TestNode::case_name)
    }

    /// The class name half of the identity.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The method name half of the identity.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }
}

impl fmt::Display for CaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)
    }
}

/// One entry of the node list supplied with a case start.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestNode {
    /// The node's index within the case.
    pub index: NodeIndex,

    /// The role assigned to this node by the launcher (e.g. `"first"`).
    pub role: String,

    /// The class name of the test case this node participates in.
    pub class_name: String,

    /// The method name of the test case this node participates in.
    pub method_name: String,
}

impl TestNode {
    /// Returns the case identity this node carries.
    pub fn case_name(&self) -> CaseName {
        CaseName::new(&self.class_name, &self.method_name)
    }
}

/// Severity of a log line.
#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
    /// Diagnostic chatter.
    Debug,

    /// Routine progress information.
    Info,

    /// Something surprising that did not fail the run.
    Warning,

    /// A failure report.
    Error,
}

impl LogLevel {
    /// String representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &["debug", "info", "warning", "error"]
    }

    /// Returns the uppercase form used in rendered log lines.
    pub fn as_upper_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LogLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let val = match s {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warning" => LogLevel::Warning,
            "error" => LogLevel::Error,
            other => return Err(LogLevelParseError::new(other)),
        };
        Ok(val)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// A complete log line attributed to one node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeLogLine {
    /// The node that produced the line.
    pub node: NodeIndex,

    /// Severity of the line.
    pub level: LogLevel,

    /// When the line was produced, per the node's clock.
    pub when: DateTime<FixedOffset>,

    /// The logger that produced the line on the node.
    pub source: String,

    /// The line itself.
    pub message: String,
}

impl fmt::Display for NodeLogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[NODE{}][{}][{}][{}]: {}",
            self.node,
            self.when.format("%H:%M:%S%.3f"),
            self.level.as_upper_str(),
            self.source,
            self.message,
        )
    }
}

/// A partial log line attributed to one node.
///
/// Fragments arrive when a node's output was split mid-line. They are
/// recorded as distinct entries; reassembly, if any, is a presentation
/// concern.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeLogFragment {
    /// The node that produced the fragment.
    pub node: NodeIndex,

    /// When the fragment was produced, per the node's clock.
    pub when: DateTime<FixedOffset>,

    /// The partial line.
    pub message: String,
}

impl fmt::Display for NodeLogFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[NODE{}][{}]: {}",
            self.node,
            self.when.format("%H:%M:%S%.3f"),
            self.message,
        )
    }
}

/// A log line from the runner itself, not attributed to any node.
///
/// Recorded at run scope rather than case scope.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunnerLogLine {
    /// Severity of the line.
    pub level: LogLevel,

    /// When the line was produced.
    pub when: DateTime<FixedOffset>,

    /// The logger that produced the line.
    pub source: String,

    /// The line itself.
    pub message: String,
}

impl fmt::Display for RunnerLogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[RUNNER][{}][{}][{}]: {}",
            self.when.format("%H:%M:%S%.3f"),
            self.level.as_upper_str(),
            self.source,
            self.message,
        )
    }
}

/// An event in the life of a multi-node test run.
///
/// Events are produced by the node launchers and workers and consumed by a
/// [`RunCoordinator`](crate::coordinator::RunCoordinator), which renders
/// them through attached sinks and folds them into a
/// [`RunAggregator`](crate::aggregator::RunAggregator).
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RunEvent {
    /// A test case began.
    CaseStarted {
        /// The nodes participating in the case, in launch order. Must be
        /// non-empty: the case identity is derived from the first entry.
        nodes: Vec<TestNode>,
    },

    /// The open test case ended.
    CaseFinished {
        /// The participating nodes, when known. `None` signals an abnormal
        /// end. Never used to derive the case identity; that comes from the
        /// matching [`CaseStarted`](Self::CaseStarted).
        nodes: Option<Vec<TestNode>>,
    },

    /// A node reported that it passed the open case.
    NodePassed {
        /// The reporting node.
        node: NodeIndex,

        /// An optional message accompanying the verdict.
        message: Option<String>,
    },

    /// A node reported that it failed the open case.
    NodeFailed {
        /// The reporting node.
        node: NodeIndex,

        /// An optional message accompanying the verdict.
        message: Option<String>,
    },

    /// A node produced a complete log line.
    NodeLog(NodeLogLine),

    /// A node produced a partial log line.
    NodeLogFragment(NodeLogFragment),

    /// The runner produced a log line of its own.
    RunnerLog(RunnerLogLine),

    /// No further events will arrive.
    RunEnded,
}
