use clap::Parser;
use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};
use gasvm::cli::Cli;
use gasvm::errors::GasvmError;
use gasvm::param::Param;
use gasvm::{cinfo, run};
use log::{error, info};
use std::path::Path;
use std::process::ExitCode;

fn start_logger(param: &Param) -> Result<LoggerHandle, GasvmError> {
    let logger = Logger::try_with_env_or_str(&param.general.log_level)
        .map_err(|e| GasvmError::Configuration(format!("invalid log level: {}", e)))?;

    let logger = if !param.general.log_base.is_empty() {
        logger
            .log_to_file(
                FileSpec::default()
                    .basename(&param.general.log_base)
                    .suffix(&param.general.log_suffix),
            )
            .duplicate_to_stderr(Duplicate::Info)
    } else {
        logger
    };

    logger
        .start()
        .map_err(|e| GasvmError::Resource(format!("cannot start logger: {}", e)))
}

fn execute(cli: Cli) -> Result<(), GasvmError> {
    // Validation happens here, before the logger and before any dataset is read
    let param = cli.into_param()?;
    let _logger = start_logger(&param)?;

    info!("gasvm v{} | scenario {} | seed {}", gasvm::version(), param.general.scenario, param.general.seed);

    let experiment = run(&param).map_err(|e| {
        error!("{}", e);
        e
    })?;
    cinfo!(param.general.display_colorful, "{}", experiment.display_results());

    experiment.save_auto(&param.data.destination)?;
    if param.general.save_traces {
        let destination = Path::new(&param.data.destination);
        let directory = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let stem = destination
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("experiment");
        experiment.save_traces_csv(directory, stem)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    match execute(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
