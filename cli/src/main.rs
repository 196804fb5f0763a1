//! `provenance`: command-line front end for the provenance engine.
//!
//! Usage:
//!   provenance manifest generate policies/ --name authz --version 2024.1 -o authz.manifest.json
//!   provenance manifest validate authz.manifest.json policies/
//!   provenance keygen --type ecdsa --purpose timestamping
//!   provenance --config engine.toml demo

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    key::{KeyPurpose, KeyType},
};
use provenance_engine::{EngineConfig, ProvenanceEngine};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Cryptographic integrity and provenance tooling.
#[derive(Parser)]
#[command(
    name = "provenance",
    about = "Hash chains, signatures, Merkle batches, timestamps, and dataset manifests"
)]
struct Cli {
    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or check dataset manifests.
    #[command(subcommand)]
    Manifest(ManifestCommand),
    /// Generate a key pair and print its metadata.
    Keygen {
        #[arg(long = "type", default_value = "ed25519")]
        key_type: KeyType,
        /// Modulus bits for RSA; 256 for ECDSA and Ed25519.
        #[arg(long)]
        size: Option<u32>,
        #[arg(long, default_value = "signing")]
        purpose: KeyPurpose,
    },
    /// Walk through append, seal, tamper detection, batching, and timestamping.
    Demo,
}

#[derive(Subcommand)]
enum ManifestCommand {
    /// Snapshot a dataset directory.
    Generate {
        dataset: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        version: String,
        /// Write the manifest here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare a saved manifest with a dataset directory.
    Validate { manifest: PathBuf, dataset: PathBuf },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    // Set RUST_LOG=info or debug for engine logs.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match load_config(cli.config.as_ref()) {
        Ok(config) => match cli.command {
            Command::Manifest(ManifestCommand::Generate {
                dataset,
                name,
                version,
                output,
            }) => generate_manifest(&dataset, &name, &version, output),
            Command::Manifest(ManifestCommand::Validate { manifest, dataset }) => {
                validate_manifest(&manifest, &dataset)
            }
            Command::Keygen {
                key_type,
                size,
                purpose,
            } => keygen(config, key_type, size, purpose),
            Command::Demo => demo(config).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> ProvenanceResult<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path),
        None => Ok(EngineConfig::default()),
    }
}

fn to_pretty(value: &impl serde::Serialize) -> ProvenanceResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| ProvenanceError::Encoding { reason: e.to_string() })
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn generate_manifest(
    dataset: &std::path::Path,
    name: &str,
    version: &str,
    output: Option<PathBuf>,
) -> ProvenanceResult<ExitCode> {
    let manifest = provenance_manifest::generate(dataset, name, version)?;
    match output {
        Some(path) => {
            provenance_manifest::write_manifest(&manifest, &path)?;
            println!(
                "wrote {} ({} files, {} records, dataset hash {})",
                path.display(),
                manifest.files.len(),
                manifest.total_records(),
                manifest.dataset_hash
            );
        }
        None => println!("{}", provenance_manifest::to_json(&manifest)?),
    }
    Ok(ExitCode::SUCCESS)
}

fn validate_manifest(manifest: &std::path::Path, dataset: &std::path::Path) -> ProvenanceResult<ExitCode> {
    let manifest = provenance_manifest::read_manifest(manifest)?;
    let result = provenance_manifest::validate(&manifest, dataset)?;

    for finding in &result.errors {
        println!("ERROR   {:<40} {}", finding.path, finding.message);
    }
    for finding in &result.warnings {
        println!("WARNING {:<40} {}", finding.path, finding.message);
    }
    if result.is_valid {
        println!("{} {}: valid", manifest.dataset_name, manifest.dataset_version);
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{} {}: INVALID ({} errors)",
            manifest.dataset_name,
            manifest.dataset_version,
            result.errors.len()
        );
        Ok(ExitCode::FAILURE)
    }
}

fn keygen(config: EngineConfig, key_type: KeyType, size: Option<u32>, purpose: KeyPurpose) -> ProvenanceResult<ExitCode> {
    let size = size.unwrap_or(match key_type {
        KeyType::Rsa => config.keys.min_rsa_bits,
        KeyType::Ecdsa | KeyType::Ed25519 => 256,
    });
    let engine = ProvenanceEngine::new(config)?;
    let key = engine.generate_key(key_type, size, purpose)?;
    println!(
        "{}",
        to_pretty(&json!({
            "key_id": key.key_id,
            "key_type": key.key_type,
            "key_size": key.key_size,
            "purpose": key.purpose,
            "created_at": key.created_at,
            "expires_at": key.expires_at,
            "public_key": key.public_key,
        }))?
    );
    Ok(ExitCode::SUCCESS)
}

async fn demo(config: EngineConfig) -> ProvenanceResult<ExitCode> {
    const LOG: &str = "audit_log";

    let engine = ProvenanceEngine::new(config)?.with_local_timestamping()?;
    let key = engine.generate_key(KeyType::Ed25519, 256, KeyPurpose::Signing)?;
    println!("[1] signing key {} ({})", key.key_id, key.key_type);

    let events = ["policy.load", "decision.allow", "decision.deny", "policy.reload", "decision.allow"];
    for (i, event) in events.iter().enumerate() {
        engine.append_entry(LOG, &json!({ "event": event, "actor": "gateway", "seq": i }))?;
    }
    let chain = engine.verify_chain(LOG, 0, events.len() as u64 - 1)?;
    println!("[2] appended {} entries, chain valid: {}", events.len(), chain.valid);

    let mut record = engine
        .log()
        .get(LOG, 2)?
        .ok_or_else(|| ProvenanceError::Storage {
            reason: "demo entry vanished".into(),
        })?;
    engine.seal_record(&mut record)?;
    println!(
        "[3] sealed entry 2 ({}), signature valid: {}",
        record.record_id(),
        engine.verify_record(&mut record)?
    );

    let mut entries = engine.log().entries(LOG, 0, events.len() as u64 - 1)?;
    entries[2].content = json!({ "event": "decision.allow", "actor": "gateway", "seq": 2 });
    let tampered = provenance_chain::verify_entries(LOG, 0, events.len() as u64 - 1, &entries);
    for link in &tampered.broken_links {
        println!("[4] tampered copy: {:?} break at index {}", link.kind, link.index);
    }

    if let Some(batch) = engine.batch_pending(LOG)? {
        let proof = engine.prove_record(LOG, 2)?;
        println!(
            "[5] batch {} root {} ({} leaves), proof for entry 2 valid: {}",
            batch.batch_id,
            batch.root_hash,
            batch.leaf_count(),
            proof.verify()
        );
    }

    let token = engine.stamp_record(&mut record).await?;
    println!(
        "[6] timestamp {} from {} at {}, valid: {}",
        token.serial_number,
        token.tsa_identifier,
        token.timestamp_value.to_rfc3339(),
        engine.verify_timestamp(&record.entry_hash(), &token)?
    );

    let rotated = engine.rotate_key(KeyPurpose::Signing, "demo rotation")?;
    let mut resealed = record.clone();
    println!(
        "[7] rotated to {}, old seal still valid: {}",
        rotated.key_id,
        engine.verify_record(&mut resealed)?
    );
    Ok(ExitCode::SUCCESS)
}
