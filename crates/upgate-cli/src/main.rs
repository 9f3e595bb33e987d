//! upgate: operator tool for the upload validation pipeline.
//!
//! Runs the pipeline on files, decrypts stored artifacts, generates keys,
//! securely erases files and manages a JSON blocklist file. Command results
//! are printed to stdout as JSON; logs go to stderr.

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use upgate_core::{InMemoryBlocklist, UploadCandidate};
use upgate_crypto::{ArtifactCipher, EncryptionKey};
use upgate_pipeline::{load_encryption_key, PipelineConfig, SecureEraser, UploadPipeline};

#[derive(Parser)]
#[command(name = "upgate")]
#[command(author, version, about = "Upload validation and secure storage")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a file and store it encrypted, or erase it (the input is consumed)
    Process {
        /// File holding the uploaded bytes
        #[arg(short, long)]
        input: PathBuf,

        /// Claimed file name (default: the input's file name)
        #[arg(short, long)]
        name: Option<String>,

        /// Blocklist JSON file (default: built-in catalogue, all inactive)
        #[arg(short, long)]
        blocklist: Option<PathBuf>,
    },

    /// Decrypt a stored artifact with the configured key
    Decrypt {
        /// Artifact file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the plaintext
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate a new random encryption key
    Keygen,

    /// Overwrite a file with random data and delete it
    Erase {
        /// File to erase
        path: PathBuf,
    },

    /// Manage a blocklist file
    Blocklist {
        /// Blocklist JSON file (created on first write)
        #[arg(short, long)]
        file: PathBuf,

        #[command(subcommand)]
        action: BlocklistAction,
    },
}

#[derive(Subcommand)]
enum BlocklistAction {
    /// Show fixed and custom extensions
    Show,

    /// Add a custom extension (e.g. ".zzz")
    Add { extension: String },

    /// Remove a custom extension
    Remove { extension: String },

    /// Activate or deactivate a fixed extension
    Toggle {
        extension: String,

        /// New state
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Process {
            input,
            name,
            blocklist,
        } => cmd_process(&input, name, blocklist.as_deref()).await,
        Commands::Decrypt { input, output } => {
            cmd_decrypt(&input, &output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Keygen => {
            cmd_keygen()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Erase { path } => cmd_erase(&path).await,
        Commands::Blocklist { file, action } => {
            cmd_blocklist(&file, action).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn load_blocklist(path: &Path) -> anyhow::Result<InMemoryBlocklist> {
    if tokio::fs::try_exists(path).await? {
        InMemoryBlocklist::load_json(path)
            .await
            .with_context(|| format!("loading blocklist {}", path.display()))
    } else {
        Ok(InMemoryBlocklist::new())
    }
}

async fn cmd_process(
    input: &Path,
    name: Option<String>,
    blocklist_path: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let config = PipelineConfig::from_env()?;
    let key = load_encryption_key()?;
    let blocklist = match blocklist_path {
        Some(path) => load_blocklist(path).await?,
        None => InMemoryBlocklist::new(),
    };

    let pipeline = UploadPipeline::new(&config, key, Arc::new(blocklist));
    if let Err(e) = pipeline.validate_storage().await {
        bail!("storage root {} failed validation: {}", config.storage_root.display(), e);
    }

    let size = tokio::fs::metadata(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?
        .len();
    let claimed_name = name.unwrap_or_else(|| {
        input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let outcome = pipeline
        .process_candidate(UploadCandidate::new(claimed_name, input, size))
        .await;

    let output = serde_json::json!({
        "status": outcome.http_status(),
        "message": outcome.message(),
        "outcome": outcome,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(if outcome.reason.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_decrypt(input: &Path, output_path: &Path) -> anyhow::Result<()> {
    let cipher = ArtifactCipher::new(load_encryption_key()?);

    let stored = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let plaintext = cipher
        .decrypt_bytes(&stored)
        .with_context(|| format!("decrypting {}", input.display()))?;

    std::fs::write(output_path, &plaintext)
        .with_context(|| format!("writing {}", output_path.display()))?;

    let output = serde_json::json!({
        "input": input.to_string_lossy(),
        "output": output_path.to_string_lossy(),
        "input_size": stored.len(),
        "output_size": plaintext.len(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn cmd_keygen() -> anyhow::Result<()> {
    let key = EncryptionKey::generate();
    let output = serde_json::json!({
        "key": key.to_hex().as_str(),
        "encoding": "hex",
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_erase(path: &Path) -> anyhow::Result<ExitCode> {
    let config = PipelineConfig::from_env()?;
    let eraser = SecureEraser::new(config.erase_block_size);

    let outcome = eraser.secure_delete(path).await?;
    let output = serde_json::json!({
        "path": path.to_string_lossy(),
        "result": outcome,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_blocklist(path: &Path, action: BlocklistAction) -> anyhow::Result<()> {
    let blocklist = load_blocklist(path).await?;

    let changed = match action {
        BlocklistAction::Show => false,
        BlocklistAction::Add { extension } => {
            let added = blocklist.add_custom(&extension).await?;
            info!(extension = %added.extension, "Custom extension added");
            true
        }
        BlocklistAction::Remove { extension } => {
            blocklist.remove_custom(&extension).await?;
            info!(extension = %extension, "Custom extension removed");
            true
        }
        BlocklistAction::Toggle { extension, active } => {
            blocklist.set_fixed_active(&extension, active).await?;
            info!(extension = %extension, active, "Fixed extension toggled");
            true
        }
    };

    if changed {
        blocklist
            .save_json(path)
            .await
            .with_context(|| format!("saving blocklist {}", path.display()))?;
    }

    let output = serde_json::json!({
        "file": path.to_string_lossy(),
        "fixed": blocklist.list_fixed().await,
        "custom": blocklist.list_custom().await,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
