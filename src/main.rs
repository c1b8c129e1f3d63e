use std::process::ExitCode;

use eei_service::config::{self, PipelineConfig};
use eei_service::logging::{self, Stage};
use eei_service::model::EeiError;
use eei_service::pipeline;
use eei_service::report::summary;

fn load_configuration() -> Result<PipelineConfig, EeiError> {
    let path = config::config_path_from_env();
    let (config, from_file) = config::load_config_or_default(&path)?;
    if from_file {
        println!("Using configuration from {}", path.display());
    }
    Ok(config)
}

fn main() -> ExitCode {
    let config = match load_configuration() {
        Ok(config) => config,
        Err(e) => {
            // The logger is configured from the file that just failed to load.
            logging::init_logger(logging::LogLevel::Info, None, false);
            logging::log_stage_failure(Stage::System, "load configuration", &e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logger(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );
    logging::info(Stage::System, None, "Starting EEI analysis");

    match pipeline::run(&config) {
        Ok(outcome) => {
            summary::print_report(&outcome.sensitivity, &outcome.attribution, &outcome.normality);
            ExitCode::SUCCESS
        }
        Err(e) => {
            logging::error(Stage::System, None, &format!("run aborted: {}", e));
            ExitCode::FAILURE
        }
    }
}
