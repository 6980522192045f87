//! CLI argument parsing for the portfolio-worker binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "portfolio-worker", about = "Portfolio site backend worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Create or update an admin operator interactively
    CreateAdmin {
        /// Operator email address
        #[arg(long)]
        email: String,
        /// Operator display name
        #[arg(long, default_value = "Admin")]
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["portfolio-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["portfolio-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_create_admin_parses_email() {
        let cli = Cli::parse_from(["portfolio-worker", "create-admin", "--email", "a@b.com"]);
        match cli.command {
            Some(Command::CreateAdmin { email, name }) => {
                assert_eq!(email, "a@b.com");
                assert_eq!(name, "Admin");
            }
            _ => panic!("expected create-admin"),
        }
    }
}
