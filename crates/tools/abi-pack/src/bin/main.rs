//! abi-pack CLI - validate and hash ABI manifest documents.

use abi_pack::{engine_build_hash, verify_manifest_doc, ManifestDoc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "abi-pack")]
#[command(about = "Validate and hash ABI manifest documents for deterministic evaluation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter manifest document
    Init {
        /// ABI namespace identifier (e.g., "workflow.host")
        #[arg(short, long)]
        abi_id: String,

        /// Output file path [default: ./abi-manifest.json]
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Verify a manifest document and print a report
    Validate {
        /// Path to the manifest document [default: ./abi-manifest.json]
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Print the pinned manifest hash (canonical bytes, SHA-256, hex)
    Hash {
        /// Path to the manifest document [default: ./abi-manifest.json]
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Print the engine build hash of an artifact file
    EngineHash {
        /// Path to the engine artifact (e.g., the wasm binary)
        #[arg(short, long)]
        artifact: PathBuf,
    },
}

fn default_manifest_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| PathBuf::from("./abi-manifest.json"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { abi_id, out } => {
            let path = out.unwrap_or_else(|| PathBuf::from("./abi-manifest.json"));
            let doc = ManifestDoc::template(abi_id);
            if let Err(e) = doc.to_file(&path) {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
            println!("Wrote manifest template to {}", path.display());
            ExitCode::SUCCESS
        }

        Commands::Validate { manifest } => {
            let path = default_manifest_path(manifest);
            let doc = match ManifestDoc::from_file(&path) {
                Ok(doc) => doc,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let report = verify_manifest_doc(&doc);
            println!("{}", report);
            if report.passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }

        Commands::Hash { manifest } => {
            let path = default_manifest_path(manifest);
            let result = ManifestDoc::from_file(&path)
                .map_err(|e| e.to_string())
                .and_then(|doc| doc.into_manifest().map_err(|e| e.to_string()))
                .and_then(|m| m.manifest_hash().map_err(|e| format!("{}", e)));
            match result {
                Ok(hash) => {
                    println!("{}", hash);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }

        Commands::EngineHash { artifact } => match engine_build_hash(&artifact) {
            Ok(hash) => {
                println!("{}", hash);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}
