// Copyright (c) The multinode-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by multinode-reporter.

use crate::events::{LogLevel, RunEvent};
use std::time::Duration;
use thiserror::Error;

/// An event that is structurally malformed and cannot be applied in any
/// phase of a run.
///
/// Rejected events never mutate aggregator state; the run continues.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum InvalidEventError {
    /// A case start arrived with an empty node list, so no case identity
    /// could be derived from it.
    #[error("case start arrived with an empty node list")]
    EmptyNodeList,
}

/// Error returned while parsing a [`LogLevel`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for log level: {input}\n(known values: {})",
    LogLevel::variants().join(", "),
)]
pub struct LogLevelParseError {
    input: String,
}

impl LogLevelParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An event arrived after the coordinator stopped consuming.
///
/// The rejected event is handed back so the producer can decide what to do
/// with it.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("the coordinator is no longer consuming events")]
pub struct IngestError(pub RunEvent);

impl IngestError {
    /// Returns the event that could not be delivered.
    pub fn into_event(self) -> RunEvent {
        self.0
    }
}

/// An error produced while waiting for the run to shut down.
///
/// Either way the final report was not confirmed, and the caller must not
/// treat the run as successfully reported.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum ShutdownError {
    /// The coordinator did not confirm the final report within the caller's
    /// deadline.
    #[error("the run was not confirmed complete within {timeout:?}")]
    Timeout {
        /// The deadline the caller allowed.
        timeout: Duration,
    },

    /// The coordinator went away without ever confirming the final report.
    #[error("the coordinator went away before confirming the final report")]
    Abandoned,
}
