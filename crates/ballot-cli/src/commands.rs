use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use ballot_crypto::ContentHasher;
use ballot_ledger::{
    Block, BlockStore, IntegrityVerifier, JsonFileStore, Ledger, LedgerReader, MemoryStore,
    ProofService,
};
use ballot_recorder::BallotConfig;
use colored::Colorize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Init(_) => cmd_init(&config, format),
        Command::Verify(_) => cmd_verify(&config, format),
        Command::Proof(args) => cmd_proof(&config, format, &args.voter_hash),
        Command::Log(args) => cmd_log(&config, format, args.limit),
        Command::Show(args) => cmd_show(&config, format, args.index),
        Command::HashVoter(args) => cmd_hash_voter(format, &args.voter_id),
        Command::Config(_) => cmd_config(&config, format),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<BallotConfig> {
    let mut config = match &cli.config {
        Some(path) => BallotConfig::load(path)?,
        None => BallotConfig::default(),
    };
    if let Some(path) = &cli.ledger {
        config.ledger.path = path.clone();
    }
    Ok(config)
}

/// Blocks as persisted, without opening the ledger for writing.
fn load_blocks(path: &Path) -> anyhow::Result<Vec<Block>> {
    JsonFileStore::new(path)
        .load()
        .with_context(|| format!("reading ledger {}", path.display()))?
        .ok_or_else(|| anyhow!("no ledger at {} (run `ballot init`)", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn short(hash: &str) -> &str {
    hash.char_indices().nth(12).map_or(hash, |(i, _)| &hash[..i])
}

fn cmd_init(config: &BallotConfig, format: OutputFormat) -> anyhow::Result<()> {
    let path: &PathBuf = &config.ledger.path;
    let existed = path.exists();
    let ledger = Ledger::open(JsonFileStore::new(path))
        .with_context(|| format!("opening ledger {}", path.display()))?;
    let genesis = ledger
        .block(0)?
        .ok_or_else(|| anyhow!("ledger at {} has no genesis block", path.display()))?;
    let blocks = ledger.block_count()?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "path": path.display().to_string(),
            "created": !existed,
            "blocks": blocks,
            "genesis_hash": genesis.hash,
        })),
        OutputFormat::Text => {
            if existed {
                println!(
                    "{} Ledger already present at {} ({} blocks)",
                    "•".yellow(),
                    path.display().to_string().bold(),
                    blocks
                );
            } else {
                println!(
                    "{} Initialized ballot ledger in {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                );
            }
            println!("  Genesis: {}", genesis.hash.cyan());
            Ok(())
        }
    }
}

fn cmd_verify(config: &BallotConfig, format: OutputFormat) -> anyhow::Result<()> {
    let path = &config.ledger.path;
    let report = IntegrityVerifier::audit_store(&JsonFileStore::new(path))
        .with_context(|| format!("auditing ledger {}", path.display()))?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            if report.valid {
                println!("{} Chain integrity verified", "✓".green().bold());
                println!("  Blocks: {}", report.total_blocks.to_string().bold());
                println!("  Hash chain: {}", "valid".green());
            } else {
                println!("{} Chain integrity violation", "✗".red().bold());
                println!("  Blocks: {}", report.total_blocks.to_string().bold());
                if let Some(index) = report.error_at_block {
                    println!("  First bad block: {}", index.to_string().red().bold());
                }
            }
        }
    }

    if !report.valid {
        bail!(
            "ledger {} failed verification at block {}",
            path.display(),
            report.error_at_block.unwrap_or_default()
        );
    }
    Ok(())
}

fn cmd_proof(config: &BallotConfig, format: OutputFormat, voter_hash: &str) -> anyhow::Result<()> {
    let blocks = load_blocks(&config.ledger.path)?;
    let ledger = Arc::new(Ledger::open(MemoryStore::with_blocks(blocks))?);
    let proof = ProofService::new(ledger).lookup(voter_hash)?;

    match (format, proof) {
        (OutputFormat::Json, proof) => print_json(&serde_json::json!({
            "found": proof.is_some(),
            "proof": proof,
        })),
        (OutputFormat::Text, Some(proof)) => {
            println!("{} Vote recorded", "✓".green().bold());
            println!("  Block: {}", proof.block_index.to_string().yellow());
            println!("  Block hash: {}", proof.block_hash.cyan());
            println!("  Vote hash: {}", proof.vote_hash);
            println!("  Recorded at: {}", proof.timestamp);
            Ok(())
        }
        (OutputFormat::Text, None) => {
            println!("{} No vote recorded for {}", "✗".red(), short(voter_hash));
            Ok(())
        }
    }
}

fn cmd_log(config: &BallotConfig, format: OutputFormat, limit: usize) -> anyhow::Result<()> {
    let blocks = load_blocks(&config.ledger.path)?;
    let skip = blocks.len().saturating_sub(limit);
    let recent: Vec<&Block> = blocks.iter().skip(skip).rev().collect();

    if format == OutputFormat::Json {
        return print_json(&recent);
    }
    for block in recent {
        let what = match block.vote() {
            Some(vote) => format!("voter {}  {}", short(&vote.voter_id_hash), vote.geolocation),
            None => "genesis".into(),
        };
        println!(
            "{}  {}  {}  {}",
            format!("#{}", block.index).yellow().bold(),
            short(&block.hash).dimmed(),
            block.timestamp,
            what
        );
    }
    Ok(())
}

fn cmd_show(config: &BallotConfig, format: OutputFormat, index: u64) -> anyhow::Result<()> {
    let blocks = load_blocks(&config.ledger.path)?;
    let block = usize::try_from(index)
        .ok()
        .and_then(|i| blocks.get(i))
        .ok_or_else(|| anyhow!("no block {index} (ledger has {} blocks)", blocks.len()))?;

    if format == OutputFormat::Json {
        return print_json(block);
    }
    let intact = block.compute_hash().to_hex() == block.hash;
    println!("Block {}", block.index.to_string().yellow().bold());
    println!("  Timestamp: {}", block.timestamp);
    println!("  Hash: {}", block.hash.cyan());
    println!("  Previous: {}", block.previous_hash.dimmed());
    println!(
        "  Digest: {}",
        if intact { "matches".green() } else { "MISMATCH".red().bold() }
    );
    match block.vote() {
        Some(vote) => {
            println!("  Voter hash: {}", vote.voter_id_hash);
            println!("  Vote hash: {}", vote.vote_hash);
            println!("  KYC reference: {}", vote.kyc_image_hash);
            println!("  Submitted: {}", vote.timestamp);
            println!("  Location: {}", vote.geolocation);
        }
        None => println!("  Payload: {}", "GENESIS_BLOCK".dimmed()),
    }
    Ok(())
}

fn cmd_hash_voter(format: OutputFormat, voter_id: &str) -> anyhow::Result<()> {
    let voter_hash = ContentHasher::hash_hex(voter_id);
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "voter_hash": voter_hash })),
        OutputFormat::Text => {
            println!("{voter_hash}");
            Ok(())
        }
    }
}

fn cmd_config(config: &BallotConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Text => {
            print!("{}", config.to_toml_string());
            Ok(())
        }
    }
}
