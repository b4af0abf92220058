use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ballot",
    about = "Ballot Ledger: tamper-evident vote ledger administration",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ledger file, overriding `ledger.path` from the configuration
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the ledger with its genesis block
    Init(InitArgs),
    /// Audit the full hash chain of the ledger file
    Verify(VerifyArgs),
    /// Look up the inclusion proof for a voter hash
    Proof(ProofArgs),
    /// Show the most recent blocks
    Log(LogArgs),
    /// Show one block in full
    Show(ShowArgs),
    /// Print the voter hash for a voter id
    HashVoter(HashVoterArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct InitArgs {}

#[derive(Args)]
pub struct VerifyArgs {}

#[derive(Args)]
pub struct ProofArgs {
    pub voter_hash: String,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ShowArgs {
    pub index: u64,
}

#[derive(Args)]
pub struct HashVoterArgs {
    pub voter_id: String,
}

#[derive(Args)]
pub struct ConfigArgs {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["ballot", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init(_)));
        assert!(cli.ledger.is_none());
    }

    #[test]
    fn parse_ledger_override() {
        let cli = Cli::try_parse_from(["ballot", "verify", "--ledger", "/tmp/chain.json"]).unwrap();
        assert!(matches!(cli.command, Command::Verify(_)));
        assert_eq!(cli.ledger, Some(PathBuf::from("/tmp/chain.json")));
    }

    #[test]
    fn parse_proof() {
        let cli = Cli::try_parse_from(["ballot", "proof", "abc123"]).unwrap();
        if let Command::Proof(args) = cli.command {
            assert_eq!(args.voter_hash, "abc123");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_log_limit() {
        let cli = Cli::try_parse_from(["ballot", "log", "-n", "5"]).unwrap();
        if let Command::Log(args) = cli.command {
            assert_eq!(args.limit, 5);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_log_default_limit() {
        let cli = Cli::try_parse_from(["ballot", "log"]).unwrap();
        if let Command::Log(args) = cli.command {
            assert_eq!(args.limit, 20);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_show_requires_number() {
        assert!(Cli::try_parse_from(["ballot", "show", "first"]).is_err());
        let cli = Cli::try_parse_from(["ballot", "show", "3"]).unwrap();
        assert!(matches!(cli.command, Command::Show(ShowArgs { index: 3 })));
    }

    #[test]
    fn parse_hash_voter() {
        let cli = Cli::try_parse_from(["ballot", "hash-voter", "V-1"]).unwrap();
        assert!(matches!(cli.command, Command::HashVoter(_)));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["ballot", "--verbose", "init"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["ballot", "--format", "json", "config"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
