//! Text report of a loopback run.
//!
//! Formatting only; nothing here feeds back into pass/fail.

use crate::record::{Outcome, PortPair, RunSummary, TestRecord};
use std::io::{self, Write};

const TITLE: &str = "Digital Port Loopback Test";
const RULE_WIDTH: usize = 60;

pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn banner(
        &mut self,
        device: &str,
        backend: &str,
        pairs: &[PortPair],
        pattern_count: usize,
    ) -> io::Result<()> {
        writeln!(self.out, "{}", rule('='))?;
        writeln!(self.out, "{TITLE}")?;
        writeln!(self.out, "{}", rule('='))?;
        writeln!(self.out, "Device: {device}")?;
        writeln!(self.out, "Backend: {backend}")?;
        writeln!(self.out, "\nTest Configuration:")?;
        for pair in pairs.iter().filter(|p| p.write_port < p.read_port) {
            writeln!(
                self.out,
                "  - Port {} (output) <-> Port {} (input)",
                pair.write_port, pair.read_port
            )?;
        }
        writeln!(self.out, "\nTotal test patterns: {pattern_count}")
    }

    pub fn direction(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "\n{label}")?;
        writeln!(self.out, "{}", rule('-'))
    }

    pub fn record(&mut self, record: &TestRecord) -> io::Result<()> {
        writeln!(self.out, "{}", format_record(record))
    }

    /// Totals, success rate and, when anything failed, every non-PASS record.
    pub fn summary(&mut self, summary: &RunSummary, records: &[TestRecord]) -> io::Result<()> {
        writeln!(self.out, "\n{}", rule('='))?;
        writeln!(self.out, "Test Summary")?;
        writeln!(self.out, "{}", rule('='))?;
        writeln!(self.out, "Total Tests:  {}", summary.total())?;
        writeln!(self.out, "Passed:       {}", summary.passed)?;
        writeln!(self.out, "Failed:       {}", summary.failed)?;
        writeln!(self.out, "Success Rate: {}", format_success_rate(summary))?;
        writeln!(self.out, "{}", rule('='))?;

        if summary.failed > 0 {
            writeln!(self.out, "\nFailed Tests:")?;
            for record in records.iter().filter(|r| !r.passed()) {
                writeln!(self.out, "{}", format_failure(record))?;
            }
        }
        self.out.flush()
    }
}

fn rule(ch: char) -> String {
    std::iter::repeat_n(ch, RULE_WIDTH).collect()
}

/// Per-pattern progress line.
pub fn format_record(record: &TestRecord) -> String {
    match (record.outcome, record.actual) {
        (Outcome::Error, _) | (_, None) => format!(
            "  Pattern 0x{:02X}: ERROR - {}",
            record.pattern,
            record.error.as_deref().unwrap_or("unknown error")
        ),
        (outcome, Some(actual)) => format!(
            "  Pattern 0x{:02X}: Expected 0x{:02X}, Read 0x{actual:02X} [{outcome}]",
            record.pattern, record.expected
        ),
    }
}

/// Line in the "Failed Tests" listing.
pub fn format_failure(record: &TestRecord) -> String {
    let got = match record.actual {
        Some(actual) => format!("0x{actual:02X}"),
        None => "ERROR".to_string(),
    };
    format!(
        "  {}: Pattern 0x{:02X} - Expected 0x{:02X}, Got {got}",
        record.label, record.pattern, record.expected
    )
}

pub fn format_success_rate(summary: &RunSummary) -> String {
    match summary.success_rate() {
        Some(rate) => format!("{rate:.1}%"),
        None => "N/A (no tests run)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PORT_PAIRS;

    fn render(f: impl FnOnce(&mut Reporter<Vec<u8>>) -> io::Result<()>) -> String {
        let mut reporter = Reporter::new(Vec::new());
        f(&mut reporter).unwrap();
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn formats_pass_fail_and_error_lines() {
        assert_eq!(
            format_record(&TestRecord::compared("p", 0x0F, 0x0F)),
            "  Pattern 0x0F: Expected 0x0F, Read 0x0F [PASS]"
        );
        assert_eq!(
            format_record(&TestRecord::compared("p", 0xAA, 0x00)),
            "  Pattern 0xAA: Expected 0xAA, Read 0x00 [FAIL]"
        );
        assert_eq!(
            format_record(&TestRecord::errored("p", 0x01, "timeout")),
            "  Pattern 0x01: ERROR - timeout"
        );
    }

    #[test]
    fn failure_listing_distinguishes_errors() {
        assert_eq!(
            format_failure(&TestRecord::compared("Port 1 -> Port 3", 0xAA, 0x00)),
            "  Port 1 -> Port 3: Pattern 0xAA - Expected 0xAA, Got 0x00"
        );
        assert_eq!(
            format_failure(&TestRecord::errored("Port 4 -> Port 2", 0x80, "x")),
            "  Port 4 -> Port 2: Pattern 0x80 - Expected 0x80, Got ERROR"
        );
    }

    #[test]
    fn banner_lists_each_loop_once() {
        let text = render(|r| r.banner("Dev1", "sim", &PORT_PAIRS, 24));
        assert!(text.contains("Device: Dev1\nBackend: sim\n"));
        assert!(text.contains("  - Port 1 (output) <-> Port 3 (input)\n"));
        assert!(text.contains("  - Port 2 (output) <-> Port 4 (input)\n"));
        assert!(!text.contains("Port 3 (output)"));
        assert!(text.ends_with("Total test patterns: 24\n"));
    }

    #[test]
    fn summary_without_failures_has_no_listing() {
        let summary = RunSummary { passed: 96, failed: 0 };
        let text = render(|r| r.summary(&summary, &[]));
        assert!(text.contains("Total Tests:  96\n"));
        assert!(text.contains("Success Rate: 100.0%\n"));
        assert!(!text.contains("Failed Tests:"));
    }

    #[test]
    fn summary_reports_not_applicable_rate_for_empty_run() {
        let text = render(|r| r.summary(&RunSummary::default(), &[]));
        assert!(text.contains("Success Rate: N/A (no tests run)\n"));
    }

    #[test]
    fn summary_lists_only_non_passing_records() {
        let records = vec![
            TestRecord::compared("Port 1 -> Port 3", 0x55, 0x55),
            TestRecord::compared("Port 1 -> Port 3", 0xAA, 0x00),
        ];
        let summary = RunSummary { passed: 1, failed: 1 };
        let text = render(|r| r.summary(&summary, &records));
        let listing = text.split("Failed Tests:\n").nth(1).unwrap();
        assert_eq!(
            listing,
            "  Port 1 -> Port 3: Pattern 0xAA - Expected 0xAA, Got 0x00\n"
        );
        assert!(text.contains("Success Rate: 50.0%\n"));
    }

    #[test]
    fn direction_header_has_rule() {
        let text = render(|r| r.direction("Port 3 -> Port 1"));
        assert_eq!(text, format!("\nPort 3 -> Port 1\n{}\n", "-".repeat(60)));
    }
}
