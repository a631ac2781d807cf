use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;

use apiscan_cfamily::CFamilyAnalyzer;
use apiscan_core::config::{Config, CONFIG_FILE_NAME};
use apiscan_core::routing::{self, FileKind};
use apiscan_core::types::FileRecord;
use apiscan_python::PythonAnalyzer;

mod scan;

use scan::ScanOptions;

#[derive(Parser)]
#[command(name = "apiscan")]
#[command(about = "Survey how a target library is used across repository source archives")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan archives and append one JSON record per repository
    Scan {
        /// Directory walked for .tgz/.tar.gz archives, or a single archive
        path: PathBuf,
        /// Result stream, one repository record per line
        #[arg(short, long, default_value = "results.jsonl")]
        output: PathBuf,
        /// Error stream for archives that could not be read
        #[arg(long, default_value = "errors.jsonl")]
        errors: PathBuf,
        /// Worker threads (defaults to available parallelism)
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Reprocess archives already present in the output
        #[arg(long)]
        no_resume: bool,
        /// Config file path (defaults to .apiscan.toml near the scan path)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Analyze a single source file and print its analysis as JSON
    File {
        /// A .py/.pyi/.ipynb or C-family source file
        path: PathBuf,
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Create a default .apiscan.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan {
            path,
            output,
            errors,
            jobs,
            no_resume,
            config,
        } => cmd_scan(
            &path,
            ScanOptions {
                output,
                errors,
                jobs,
                resume: !no_resume,
            },
            config.as_deref(),
        ),
        Commands::File { path, config } => cmd_file(&path, config.as_deref()),
        Commands::Init { force } => cmd_init(force),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(2);
    }
}

fn cmd_scan(path: &Path, options: ScanOptions, config_path: Option<&Path>) -> Result<()> {
    let anchor = if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent().unwrap_or(Path::new(".")).to_path_buf()
    };
    let config = load_config(&anchor, config_path)?;

    let archives = scan::discover_archives(path);
    if archives.is_empty() {
        anyhow::bail!("no archives found under '{}'", path.display());
    }

    let summary = scan::run_scan(&anchor, &archives, &config, &options)?;
    println!(
        "{} {} analyzed, {} failed, {} skipped",
        "scan complete:".green().bold(),
        summary.completed,
        summary.failed,
        summary.skipped
    );
    Ok(())
}

/// Single-file report: the file record plus, for notebooks, the markdown
/// commentary the transcoder set aside.
#[derive(Serialize)]
struct FileReport<A> {
    #[serde(flatten)]
    record: FileRecord<A>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commentary: Option<Vec<String>>,
}

fn cmd_file(path: &Path, config_path: Option<&Path>) -> Result<()> {
    let anchor = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let config = load_config(&anchor, config_path)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    let suffix = routing::member_suffix(&file_name)
        .with_context(|| format!("'{file_name}' has no recognizable suffix"))?;
    let kind = routing::route(&suffix)
        .with_context(|| format!("no analyzer handles '.{suffix}' files"))?;

    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;

    let report = match kind {
        FileKind::Python => {
            let python = PythonAnalyzer::new(&config.library);
            let source = String::from_utf8_lossy(&bytes);
            let analysis = match python.analyze_source(&source) {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    eprintln!("Warning: {file_name}: {e}");
                    None
                }
            };
            serde_json::to_string_pretty(&FileReport {
                record: FileRecord {
                    path: file_name,
                    suffix,
                    analysis,
                },
                commentary: None,
            })?
        }
        FileKind::Notebook => {
            let python = PythonAnalyzer::new(&config.library);
            let (analysis, commentary) = match apiscan_python::to_script(&bytes) {
                Ok(script) => {
                    let analysis = match python.analyze_source(&script.code) {
                        Ok(analysis) => Some(analysis),
                        Err(e) => {
                            eprintln!("Warning: {file_name}: {e}");
                            None
                        }
                    };
                    (analysis, Some(script.commentary))
                }
                Err(e) => {
                    eprintln!("Warning: {file_name}: {e}");
                    (None, None)
                }
            };
            serde_json::to_string_pretty(&FileReport {
                record: FileRecord {
                    path: file_name,
                    suffix,
                    analysis,
                },
                commentary,
            })?
        }
        FileKind::CFamily => {
            let cfamily = CFamilyAnalyzer::new()?;
            let text = String::from_utf8_lossy(&bytes);
            // no surrounding archive, so every include is external here
            let analysis = cfamily.analyze(&text, &Default::default());
            serde_json::to_string_pretty(&FileReport {
                record: FileRecord {
                    path: file_name,
                    suffix,
                    analysis: Some(analysis),
                },
                commentary: None,
            })?
        }
        FileKind::Other(language) => {
            anyhow::bail!("'.{suffix}' files are only tallied (language: {language})")
        }
    };

    println!("{report}");
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let target = PathBuf::from(CONFIG_FILE_NAME);
    if target.exists() && !force {
        anyhow::bail!("{CONFIG_FILE_NAME} already exists. Use --force to overwrite.");
    }
    std::fs::write(&target, Config::default_toml())?;
    println!("Created {CONFIG_FILE_NAME} with default configuration.");
    Ok(())
}

fn load_config(anchor: &Path, config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default(anchor)),
    }
}
