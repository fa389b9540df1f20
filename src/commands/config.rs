use std::path::Path;

use clap::{Args, Subcommand};

use crate::commands::CommandError;
use crate::config::AppConfig;
use crate::gateway::Provider;

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ConfigSubcommand {
    /// Validate the config file and report which providers are usable
    Check,
}

pub fn run(args: ConfigArgs, config_path: Option<&Path>) -> Result<(), CommandError> {
    match args.command {
        ConfigSubcommand::Check => {
            let config = AppConfig::load(config_path)?;
            match &config.path {
                Some(path) => println!("config OK: {}", path.display()),
                None => println!("config OK: no config file, using defaults"),
            }

            let credentials = config.credentials();
            let providers = Provider::ALL
                .iter()
                .map(|provider| {
                    let state = if credentials.is_present(*provider) {
                        "configured"
                    } else {
                        "missing"
                    };
                    format!("{provider}={state}")
                })
                .collect::<Vec<_>>()
                .join(" ");
            println!("providers: {providers}");

            let settings = config.gateway_settings();
            println!("models: {}", settings.registry.names().join(", "));
            println!("default model: {}", config.default_model());
            Ok(())
        }
    }
}
