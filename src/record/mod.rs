use std::fmt;

/// A write port, the read port it is looped back to, and the label used in
/// the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPair {
    pub write_port: u8,
    pub read_port: u8,
    pub label: &'static str,
}

/// Directions exercised on every run, in order.
pub const PORT_PAIRS: [PortPair; 4] = [
    PortPair {
        write_port: 1,
        read_port: 3,
        label: "Port 1 -> Port 3",
    },
    PortPair {
        write_port: 3,
        read_port: 1,
        label: "Port 3 -> Port 1",
    },
    PortPair {
        write_port: 2,
        read_port: 4,
        label: "Port 2 -> Port 4",
    },
    PortPair {
        write_port: 4,
        read_port: 2,
        label: "Port 4 -> Port 2",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
    /// The write or the read raised a hardware error.
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Outcome::Pass => "PASS",
            Outcome::Fail => "FAIL",
            Outcome::Error => "ERROR",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    pub label: String,
    pub pattern: u8,
    pub expected: u8,
    /// Absent when the hardware raised an error.
    pub actual: Option<u8>,
    pub outcome: Outcome,
    pub error: Option<String>,
}

impl TestRecord {
    /// Compare a completed read against the driven pattern.
    pub fn compared(label: &str, pattern: u8, actual: u8) -> Self {
        let outcome = if actual == pattern {
            Outcome::Pass
        } else {
            Outcome::Fail
        };
        Self {
            label: label.to_string(),
            pattern,
            expected: pattern,
            actual: Some(actual),
            outcome,
            error: None,
        }
    }

    pub fn errored(label: &str, pattern: u8, message: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            pattern,
            expected: pattern,
            actual: None,
            outcome: Outcome::Error,
            error: Some(message.into()),
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }
}

/// Totals over a run. Errors count as failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    /// Percentage of passing tests, `None` when nothing ran.
    pub fn success_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(100.0 * self.passed as f64 / total as f64),
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}
