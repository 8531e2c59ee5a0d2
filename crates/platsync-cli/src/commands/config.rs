use crate::errors::SyncError;
use crate::logger;
use crate::GlobalOpts;
use clap::Subcommand;
use colored::*;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print every setting with its effective value
    Show,
    /// Print the config file location
    Path,
    /// Set a value and save the config file
    Set { key: String, value: String },
}

pub fn handle_config(action: Option<ConfigAction>, opts: &GlobalOpts) -> Result<(), SyncError> {
    let config_path = opts.config_path();
    logger::debug(&format!("Reading config from: {}", config_path.display()));

    match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let config = opts.load_config()?;
            println!("{}", "Configuration:".bold().green());
            if opts.verbosity_level() > 0 && !config_path.exists() {
                println!("  {}", "(defaults, no config file)".yellow());
            }
            for (key, value) in config.values_iter() {
                println!("  {}: {}", key.cyan(), value);
            }
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
            if std::env::var_os(platsync_config::CONFIG_ENV).is_some() {
                println!("{} {}", "set-by".cyan(), platsync_config::CONFIG_ENV);
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = opts.load_config()?;
            config.set(&key, value.clone())?;
            config.save_to_path(&config_path)?;
            logger::success(&format!("Set {} = {}", key, value));
        }
    }
    Ok(())
}
