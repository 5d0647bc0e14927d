// Copyright (c) The multinode-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-keeping support.

mod stopwatch;

pub(crate) use stopwatch::{StopwatchStart, stopwatch};
