//! `model` command - manifest signature verification and an offline
//! (local-file) download/verify cycle, for exercising `ModelManager`
//! outside the host app.

use std::path::{Path, PathBuf};

use aegis_common::model_manager::{self, LocalFileDownloader, ModelManager, ModelManifest};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;

#[derive(Args)]
pub struct ModelArgs {
    #[command(subcommand)]
    action: ModelAction,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Verify a manifest's HMAC-SHA256 signature
    VerifySignature {
        manifest_path: PathBuf,
        #[arg(long)]
        signature: String,
        #[arg(long)]
        key: String,
    },
    /// Copy a local file in as the model artifact and verify its integrity
    Download { manifest_path: PathBuf, target_dir: PathBuf },
}

pub fn run(args: ModelArgs) -> Result<()> {
    match args.action {
        ModelAction::VerifySignature {
            manifest_path,
            signature,
            key,
        } => verify_signature(&manifest_path, &signature, &key),
        ModelAction::Download {
            manifest_path,
            target_dir,
        } => download(&manifest_path, &target_dir),
    }
}

fn load_manifest(path: &Path) -> Result<ModelManifest> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading manifest at {}", path.display()))?;
    serde_json::from_str(&contents).context("parsing model manifest")
}

fn verify_signature(manifest_path: &Path, signature: &str, key: &str) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let valid = model_manager::verify_manifest_signature(&manifest, signature, key.as_bytes());
    if valid {
        println!("{}  manifest signature is valid", "ok".bright_green());
        Ok(())
    } else {
        println!("{}  manifest signature does not verify", "failed".bright_red());
        std::process::exit(1);
    }
}

fn download(manifest_path: &Path, target_dir: &Path) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let manager = ModelManager::new(vec!["arm64-v8a".to_string()]);
    match manager.download_model(&manifest, target_dir, &LocalFileDownloader) {
        Ok(path) => {
            println!("{}  model ready at {}", "ok".bright_green(), path.display());
            Ok(())
        }
        Err(e) => {
            println!("{}  {}", "failed".bright_red(), e);
            std::process::exit(1);
        }
    }
}
