// Copyright (c) The multinode-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for multinode-reporter.

use std::{fmt, time::Duration};

/// Utilities for pluralizing various words based on count or plurality.
pub(crate) mod plural {
    /// Returns "spec" if `count` is 1, otherwise "specs".
    pub(crate) fn specs_str(count: usize) -> &'static str {
        if count == 1 { "spec" } else { "specs" }
    }

    /// Returns "node" if `count` is 1, otherwise "nodes".
    pub(crate) fn nodes_str(count: usize) -> &'static str {
        if count == 1 { "node" } else { "nodes" }
    }

    /// Returns "anomaly" if `count` is 1, otherwise "anomalies".
    pub(crate) fn anomalies_str(count: usize) -> &'static str {
        if count == 1 { "anomaly" } else { "anomalies" }
    }
}

#[derive(Debug)]
pub(crate) struct FormattedDuration(pub(crate) Duration);

impl fmt::Display for FormattedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = self.0.as_secs_f64();
        if duration > 60.0 {
            write!(f, "{}m {:.2}s", duration as u32 / 60, duration % 60.0)
        } else {
            write!(f, "{duration:.2}s")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_duration_switches_units_at_a_minute() {
        assert_eq!(
            FormattedDuration(Duration::from_millis(1230)).to_string(),
            "1.23s"
        );
        assert_eq!(
            FormattedDuration(Duration::from_secs(59)).to_string(),
            "59.00s"
        );
        assert_eq!(
            FormattedDuration(Duration::from_secs(61)).to_string(),
            "1m 1.00s"
        );
    }
}
