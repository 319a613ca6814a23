use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::{Config, ConfigLoader};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration (merged, secrets omitted)
    Show,
    /// Show configuration file paths
    Path,
}

pub fn run(args: ConfigArgs, config: &Config) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(config),
        ConfigCommands::Path => show_paths(),
    }
}

fn show_config(config: &Config) -> Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_paths() -> Result<()> {
    println!("User config:     {:?}", ConfigLoader::user_config_path());
    println!("Project config:  {:?}", ConfigLoader::project_config_path());
    println!("LEARNPATH_CONFIG: {:?}", ConfigLoader::explicit_config_path());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shown_config_never_contains_the_jwt_secret() {
        let mut config = Config::default();
        config.auth.secret = Some("do-not-print".into());
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(!rendered.contains("do-not-print"));
        assert!(rendered.contains("[gateway]"));
    }
}
