use loopback_orchestrator::config_path;
use loopback_tester::cli::{self, Command, EXIT_FATAL, EXIT_PASS};
use loopback_tester::error::SETUP_HINTS;
use std::env;
use std::io;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "loopback_tester".to_string());

    let device = match cli::parse_args(args) {
        Ok(Command::Run { device }) => device,
        Ok(Command::Help) => {
            println!("{}", cli::usage(&program));
            process::exit(EXIT_PASS);
        }
        Err(message) => {
            eprintln!("{message}\n\n{}", cli::usage(&program));
            process::exit(EXIT_FATAL);
        }
    };

    let result = cli::run_device(&device, &config_path(), io::stdout().lock());
    if let Err(err) = &result {
        eprintln!("\nFATAL ERROR: {err}");
        eprintln!("\nPlease ensure:");
        for (index, hint) in SETUP_HINTS.iter().enumerate() {
            eprintln!("  {}. {hint}", index + 1);
        }
    }
    process::exit(cli::exit_code(&result));
}
