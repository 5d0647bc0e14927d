// Copyright (c) The multinode-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Result aggregation and reporting for multi-node test runs.
//!
//! A multi-node test runner launches one process per node role and watches
//! their output streams. This crate is the collection side of such a
//! runner: events parsed from node output are sent through a
//! [`CoordinatorHandle`](coordinator::CoordinatorHandle) to a
//! [`RunCoordinator`](coordinator::RunCoordinator), which folds them into a
//! tree of per-case, per-node results, renders them through attached
//! [sinks](sinks::MessageSink), and answers the shutdown handshake once the
//! final report has been delivered.
//!
//! The crate does not launch processes or parse output streams. It begins
//! at [`RunEvent`](events::RunEvent) and ends at a
//! [`RunTree`](reporting::RunTree).

pub mod aggregator;
pub mod coordinator;
pub mod errors;
pub mod events;
mod helpers;
pub mod reporting;
pub mod sinks;
mod time;
