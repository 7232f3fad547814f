use crate::error::LoopbackError;
use crate::record::RunSummary;
use crate::report::Reporter;
use crate::runner::LoopbackTester;
use loopback_orchestrator::{LoopbackConfig, create_backend};
use std::io::Write;
use std::path::Path;

pub const DEFAULT_DEVICE: &str = "Dev1";

pub const EXIT_PASS: i32 = 0;
pub const EXIT_FAIL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run { device: String },
    Help,
}

/// Parse the arguments after the program name.
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Command, String> {
    let mut device = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--device" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--device requires a device name".to_string())?;
                device = Some(value);
            }
            other => match other.strip_prefix("--device=") {
                Some(value) => device = Some(value.to_string()),
                None => return Err(format!("unexpected argument: {other}")),
            },
        }
    }

    let device = device.unwrap_or_else(|| DEFAULT_DEVICE.to_string());
    if device.is_empty() {
        return Err("--device requires a device name".to_string());
    }
    Ok(Command::Run { device })
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [--device <name>]\n\
         \n\
         Digital port loopback test.\n\
         \n\
         Options:\n\
         \x20 --device <name>  Device to test (default: {DEFAULT_DEVICE})\n\
         \x20 -h, --help       Show this help\n\
         \n\
         Hardware setup:\n\
         \x20 Connect the following ports for loopback testing:\n\
         \x20   - Port 1 to Port 3 (all 8 lines)\n\
         \x20   - Port 2 to Port 4 (all 8 lines)\n\
         \n\
         Devices are declared in the TOML file named by $LOOPBACK_CONFIG\n\
         (default: config/loopback.toml).\n\
         \n\
         Exit codes: 0 all patterns passed, 1 a pattern failed, 2 setup error."
    )
}

/// Load the config, build the device's backend and run the full test,
/// writing the report to `out`.
pub fn run_device<W: Write>(
    device: &str,
    config_path: &Path,
    out: W,
) -> Result<RunSummary, LoopbackError> {
    let config = LoopbackConfig::from_file(config_path)?;
    let backend = create_backend(&config, device)?;
    let mut tester =
        LoopbackTester::new(backend, device, Reporter::new(out)).with_settle(config.settle());
    tester.run_all()
}

pub fn exit_code(result: &Result<RunSummary, LoopbackError>) -> i32 {
    match result {
        Ok(summary) if summary.success() => EXIT_PASS,
        Ok(_) => EXIT_FAIL,
        Err(_) => EXIT_FATAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_to_dev1() {
        assert_eq!(
            parse_args(args(&[])).unwrap(),
            Command::Run {
                device: "Dev1".into()
            }
        );
    }

    #[test]
    fn accepts_both_device_forms() {
        assert_eq!(
            parse_args(args(&["--device", "Dev2"])).unwrap(),
            Command::Run {
                device: "Dev2".into()
            }
        );
        assert_eq!(
            parse_args(args(&["--device=PXI1Slot4"])).unwrap(),
            Command::Run {
                device: "PXI1Slot4".into()
            }
        );
    }

    #[test]
    fn rejects_unknown_and_incomplete_arguments() {
        assert!(parse_args(args(&["--verbose"])).is_err());
        assert!(parse_args(args(&["--device"])).is_err());
        assert!(parse_args(args(&["--device="])).is_err());
        assert_eq!(parse_args(args(&["--help"])).unwrap(), Command::Help);
    }

    #[test]
    fn exit_codes_follow_outcome() {
        assert_eq!(exit_code(&Ok(RunSummary { passed: 96, failed: 0 })), EXIT_PASS);
        assert_eq!(exit_code(&Ok(RunSummary { passed: 95, failed: 1 })), EXIT_FAIL);
        let missing = run_device("Dev1", Path::new("no/such/config.toml"), Vec::new());
        assert_eq!(exit_code(&missing), EXIT_FATAL);
    }
}
