use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "touchify", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config_path: Option<String>,

    /// Gateway host (overrides both endpoints in the config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Gateway port (overrides both endpoints in the config)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the roster and follow attendance events until Ctrl-C
    Watch,

    /// Fetch the roster once and print it
    Snapshot,

    /// Generate sample configuration
    ConfigSample {
        /// Output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_is_optional_and_flags_are_global() {
        let cli = Cli::parse_from(["touchify", "--host", "10.0.0.2"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.host.as_deref(), Some("10.0.0.2"));

        let cli = Cli::parse_from(["touchify", "snapshot", "--port", "9000", "-v"]);
        assert!(matches!(cli.command, Some(Commands::Snapshot)));
        assert_eq!(cli.port, Some(9000));
        assert!(cli.verbose);
    }
}
