//! session-hub binary entry point.

use std::process::ExitCode;

use session_hub::cli::{self, Command};
use session_hub::config::Config;
use session_hub::{logging, FanOutReport, FileDriver, LocalEngine, SessionManager};
use tracing::{error, info};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'session-hub --help' for more information.");
            return ExitCode::FAILURE;
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_with_filter(config.log_filter()).ok();

    let Some(command) = args.command else {
        cli::print_help();
        return ExitCode::FAILURE;
    };

    match run(&config, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn manager(config: &Config) -> session_hub::Result<SessionManager<LocalEngine>> {
    let registry = config.build_registry()?;
    Ok(SessionManager::with_registry(
        registry,
        LocalEngine::new(),
        config.session_config(),
    ))
}

fn run(config: &Config, command: Command) -> session_hub::Result<()> {
    match command {
        Command::List => {
            for id in FileDriver::new(&config.drivers.file.dir).ids()? {
                println!("{}", id);
            }
        }
        Command::Gc => {
            let max_lifetime = config.session.gc_max_lifetime;
            info!(max_lifetime, "running gc on every driver");
            print_report("gc", &manager(config)?.gc_all(max_lifetime));
        }
        Command::Read(id) => {
            let data = manager(config)?.read(&id)?;
            println!("{}", String::from_utf8_lossy(&data));
        }
        Command::Destroy(id) => {
            print_report("destroy", &manager(config)?.destroy_all(Some(&id))?);
        }
    }

    Ok(())
}

fn print_report(op: &str, report: &FanOutReport) {
    for name in &report.succeeded {
        println!("{op} {name}: ok");
    }
    for name in &report.failed {
        println!("{op} {name}: failed");
    }
}
