use crate::error::LoopbackError;
use crate::pattern::test_patterns;
use crate::port_io::{DEFAULT_SETTLE, read_port, write_port};
use crate::record::{PORT_PAIRS, PortPair, RunSummary, TestRecord};
use crate::report::Reporter;
use loopback_hal::traits::{DigitalPortBackend, HalError};
use std::io::Write;
use std::time::Duration;

/// Drives the pattern sequence through each port pair on one device and
/// collects a record per pattern.
pub struct LoopbackTester<B: DigitalPortBackend, W: Write> {
    backend: B,
    device: String,
    settle: Duration,
    patterns: Vec<u8>,
    reporter: Reporter<W>,
    records: Vec<TestRecord>,
}

impl<B: DigitalPortBackend, W: Write> LoopbackTester<B, W> {
    pub fn new(backend: B, device: impl Into<String>, reporter: Reporter<W>) -> Self {
        Self {
            backend,
            device: device.into(),
            settle: DEFAULT_SETTLE,
            patterns: test_patterns(),
            reporter,
            records: Vec::new(),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    pub fn reporter(&self) -> &Reporter<W> {
        &self.reporter
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run every pattern through one direction. Returns `(passed, failed)`
    /// for that direction; a hardware error on a pattern is recorded and the
    /// loop moves on. Only a failure to write the report escapes.
    pub fn run_direction(&mut self, pair: &PortPair) -> Result<(usize, usize), LoopbackError> {
        self.reporter.direction(pair.label)?;

        let mut passed = 0;
        let mut failed = 0;
        for index in 0..self.patterns.len() {
            let pattern = self.patterns[index];
            let record = match self.exchange(pair, pattern) {
                Ok(actual) => TestRecord::compared(pair.label, pattern, actual),
                Err(err) => {
                    log::warn!("{}: pattern 0x{pattern:02X}: {err}", pair.label);
                    TestRecord::errored(pair.label, pattern, err.to_string())
                }
            };
            if record.passed() {
                passed += 1;
            } else {
                failed += 1;
            }
            self.reporter.record(&record)?;
            self.records.push(record);
        }

        log::info!("{}: {passed} passed, {failed} failed", pair.label);
        Ok((passed, failed))
    }

    /// Run the four fixed directions and print the summary.
    pub fn run_all(&mut self) -> Result<RunSummary, LoopbackError> {
        self.reporter.banner(
            &self.device,
            self.backend.name(),
            &PORT_PAIRS,
            self.patterns.len(),
        )?;
        log::info!(
            "Starting loopback run on {} via {} backend",
            self.device,
            self.backend.name()
        );

        let mut summary = RunSummary::default();
        for pair in &PORT_PAIRS {
            let (passed, failed) = self.run_direction(pair)?;
            summary.passed += passed;
            summary.failed += failed;
        }

        self.reporter.summary(&summary, &self.records)?;
        Ok(summary)
    }

    fn exchange(&mut self, pair: &PortPair, pattern: u8) -> Result<u8, HalError> {
        write_port(
            &mut self.backend,
            &self.device,
            pair.write_port,
            pattern,
            self.settle,
        )?;
        read_port(&mut self.backend, &self.device, pair.read_port, self.settle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PATTERN_COUNT;
    use crate::record::Outcome;
    use loopback_hal::sim::{SimBackend, SimFault};

    fn tester(sim: SimBackend) -> LoopbackTester<SimBackend, Vec<u8>> {
        LoopbackTester::new(sim, "Dev1", Reporter::new(Vec::new())).with_settle(Duration::ZERO)
    }

    fn output(t: &LoopbackTester<SimBackend, Vec<u8>>) -> String {
        String::from_utf8(t.reporter().get_ref().clone()).unwrap()
    }

    #[test]
    fn wired_board_passes_every_pattern() {
        let mut t = tester(SimBackend::new("Dev1"));
        let summary = t.run_all().unwrap();
        assert_eq!(summary, RunSummary { passed: 96, failed: 0 });
        assert!(summary.success());
        assert_eq!(t.records().len(), 4 * PATTERN_COUNT);
        assert!(t.records().iter().all(|r| r.outcome == Outcome::Pass));
        let text = output(&t);
        assert!(text.contains("Device: Dev1\nBackend: sim\n"));
        assert!(!text.contains("Failed Tests:"));
    }

    #[test]
    fn records_follow_direction_then_pattern_order() {
        let mut t = tester(SimBackend::new("Dev1"));
        t.run_all().unwrap();
        let patterns = test_patterns();
        for (i, pair) in PORT_PAIRS.iter().enumerate() {
            let chunk = &t.records()[i * PATTERN_COUNT..(i + 1) * PATTERN_COUNT];
            assert!(chunk.iter().all(|r| r.label == pair.label));
            let seen: Vec<u8> = chunk.iter().map(|r| r.pattern).collect();
            assert_eq!(seen, patterns);
        }
    }

    #[test]
    fn single_mismatch_fails_one_pattern() {
        let mut sim = SimBackend::new("Dev1");
        sim.inject(SimFault::Substitute {
            port: 3,
            expected: 0xAA,
            actual: 0x00,
        });
        let mut t = tester(sim);

        let (passed, failed) = t.run_direction(&PORT_PAIRS[0]).unwrap();
        assert_eq!((passed, failed), (23, 1));

        let text = output(&t);
        assert!(text.starts_with("\nPort 1 -> Port 3\n"));
        assert!(text.contains("  Pattern 0xAA: Expected 0xAA, Read 0x00 [FAIL]\n"));
        assert!(text.contains("  Pattern 0x55: Expected 0x55, Read 0x55 [PASS]\n"));
        assert_eq!(text.lines().count(), 2 + PATTERN_COUNT);
    }

    #[test]
    fn mismatch_in_one_direction_of_full_run() {
        let mut sim = SimBackend::new("Dev1");
        sim.inject(SimFault::Substitute {
            port: 3,
            expected: 0xAA,
            actual: 0x00,
        });
        let mut t = tester(sim);
        let summary = t.run_all().unwrap();
        assert_eq!(summary, RunSummary { passed: 95, failed: 1 });
        let failing: Vec<&TestRecord> = t.records().iter().filter(|r| !r.passed()).collect();
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].label, "Port 1 -> Port 3");
        assert_eq!(failing[0].expected, 0xAA);
        assert_eq!(failing[0].actual, Some(0x00));
        assert_eq!(failing[0].outcome, Outcome::Fail);
    }

    #[test]
    fn hardware_error_on_one_pattern_does_not_stop_direction() {
        let mut sim = SimBackend::new("Dev1");
        sim.inject(SimFault::WriteError { port: 2, value: 0x0F });
        let mut t = tester(sim);

        let (passed, failed) = t.run_direction(&PORT_PAIRS[2]).unwrap();
        assert_eq!((passed, failed), (23, 1));
        assert_eq!(t.records().len(), PATTERN_COUNT);

        let errors: Vec<&TestRecord> = t
            .records()
            .iter()
            .filter(|r| r.outcome == Outcome::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].pattern, 0x0F);
        assert_eq!(errors[0].actual, None);
        assert!(errors[0].error.as_deref().unwrap().contains("injected write fault"));

        // patterns after the faulty one still ran
        let last = t.records().last().unwrap();
        assert_eq!(last.pattern, 0xCC);
        assert_eq!(last.outcome, Outcome::Pass);
        assert!(!t.backend().is_claimed(2));
    }

    #[test]
    fn read_error_is_reported_as_error_not_fail() {
        let mut sim = SimBackend::new("Dev1");
        sim.inject(SimFault::ReadError { port: 1, value: 0x80 });
        let mut t = tester(sim);
        let summary = t.run_all().unwrap();
        assert_eq!(summary.failed, 1);
        let text = output(&t);
        assert!(text.contains(
            "  Pattern 0x80: ERROR - communication error: injected read fault on Dev1/port1"
        ));
        assert!(text.contains("  Port 3 -> Port 1: Pattern 0x80 - Expected 0x80, Got ERROR"));
    }

    #[test]
    fn stuck_line_fails_every_pattern_that_drives_it_high() {
        let mut sim = SimBackend::new("Dev1");
        sim.inject(SimFault::StuckLow { port: 4, mask: 0x01 });
        let mut t = tester(sim);
        let (passed, failed) = t.run_direction(&PORT_PAIRS[2]).unwrap();
        let expected_failures = test_patterns().iter().filter(|&&p| p & 0x01 != 0).count();
        assert_eq!(failed, expected_failures);
        assert_eq!(passed + failed, PATTERN_COUNT);
    }

    #[test]
    fn missing_wiring_fails_all_patterns_but_zero() {
        let mut t = tester(SimBackend::with_wiring("Dev1", &[(1, 3)]));
        let summary = t.run_all().unwrap();
        // 2<->4 unwired: only 0x00 reads back in those two directions
        assert_eq!(summary.passed, 2 * PATTERN_COUNT + 2);
        assert_eq!(summary.total(), 4 * PATTERN_COUNT);
    }
}
