//! Repository-level orchestration.
//!
//! One archive becomes one record: members are routed by suffix to the
//! Python analyzer, the C-family classifier, or a language tally, and the
//! batch runner fans archives out over a worker pool with a single writer
//! appending finished records.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rayon::prelude::*;
use walkdir::WalkDir;

use apiscan_cfamily::CFamilyAnalyzer;
use apiscan_core::archive::{Archive, TarGzArchive};
use apiscan_core::config::Config;
use apiscan_core::routing::{self, FileKind};
use apiscan_core::types::{FileRecord, RepositoryRecord};
use apiscan_python::PythonAnalyzer;

/// Batch runner knobs, straight from the CLI.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub output: PathBuf,
    pub errors: PathBuf,
    pub jobs: Option<usize>,
    pub resume: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum ScanEvent {
    Completed {
        record: Box<RepositoryRecord>,
    },
    Failed {
        name: String,
        error: String,
    },
}

/// Analyze every member of one archive into a repository record. Unreadable
/// members and files that fail to parse degrade per-file; nothing here fails
/// the archive.
pub fn analyze_archive(
    archive: &dyn Archive,
    name: &str,
    python: &PythonAnalyzer,
    cfamily: &CFamilyAnalyzer,
) -> RepositoryRecord {
    let members = archive.member_names();
    let mut record = RepositoryRecord::new(name);
    record.num_files = members.len();

    let basenames: HashSet<String> = members
        .iter()
        .map(|m| m.rsplit('/').next().unwrap_or(m).to_string())
        .collect();

    for member in members {
        let Some(suffix) = routing::member_suffix(member) else {
            continue;
        };
        let Some(kind) = routing::route(&suffix) else {
            continue;
        };
        let path = display_path(member, name);
        match kind {
            FileKind::Python => {
                let Some(bytes) = archive.read_member(member) else {
                    continue;
                };
                let source = String::from_utf8_lossy(bytes);
                let analysis = match python.analyze_source(&source) {
                    Ok(analysis) => Some(analysis),
                    Err(e) => {
                        eprintln!("Warning: {name}: {path}: {e}");
                        None
                    }
                };
                record.python.push(FileRecord {
                    path,
                    suffix,
                    analysis,
                });
            }
            FileKind::Notebook => {
                let Some(bytes) = archive.read_member(member) else {
                    continue;
                };
                let analysis = match python.analyze_notebook(bytes) {
                    Ok(analysis) => Some(analysis),
                    Err(e) => {
                        eprintln!("Warning: {name}: {path}: {e}");
                        None
                    }
                };
                record.python.push(FileRecord {
                    path,
                    suffix,
                    analysis,
                });
            }
            FileKind::CFamily => {
                let Some(bytes) = archive.read_member(member) else {
                    continue;
                };
                let text = String::from_utf8_lossy(bytes);
                record.c.push(FileRecord {
                    path,
                    suffix,
                    analysis: Some(cfamily.analyze(&text, &basenames)),
                });
            }
            FileKind::Other(language) => {
                *record
                    .other_language
                    .entry(language.to_string())
                    .or_insert(0) += 1;
            }
        }
    }
    record
}

/// Run the batch: filter already-completed archives, fan the rest out over a
/// worker pool, and let a single writer thread append records and errors.
pub fn run_scan(
    root: &Path,
    archives: &[PathBuf],
    config: &Config,
    options: &ScanOptions,
) -> Result<ScanSummary> {
    let python = PythonAnalyzer::new(&config.library);
    let cfamily = CFamilyAnalyzer::new().context("failed to initialize C-family analyzer")?;

    let done: HashSet<String> = if options.resume && options.output.exists() {
        let file = std::fs::File::open(&options.output).with_context(|| {
            format!(
                "failed to read existing output '{}'",
                options.output.display()
            )
        })?;
        apiscan_report::completed_names(std::io::BufReader::new(file))
    } else {
        HashSet::new()
    };

    let mut pending: Vec<(String, PathBuf)> = Vec::new();
    let mut skipped = 0usize;
    for path in archives {
        let name = repository_name(root, path);
        if done.contains(&name) {
            skipped += 1;
            continue;
        }
        pending.push((name, path.clone()));
    }

    let mut results = open_append(&options.output)?;
    let mut errors = open_append(&options.errors)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.unwrap_or(0))
        .build()
        .context("failed to build worker pool")?;

    let total = pending.len();
    let started = Instant::now();
    let finished = AtomicUsize::new(0);
    let (sender, receiver) = mpsc::channel::<ScanEvent>();

    let (completed, failed) = std::thread::scope(|scope| {
        let writer = scope.spawn(move || -> Result<(usize, usize)> {
            let mut completed = 0usize;
            let mut failed = 0usize;
            for event in receiver {
                match event {
                    ScanEvent::Completed { record } => {
                        apiscan_report::write_record(&mut results, &record)?;
                        completed += 1;
                    }
                    ScanEvent::Failed { name, error } => {
                        apiscan_report::write_error(&mut errors, &name, &error)?;
                        failed += 1;
                    }
                }
            }
            Ok((completed, failed))
        });

        pool.install(|| {
            pending.par_iter().for_each_with(sender, |sender, (name, path)| {
                let event = match TarGzArchive::open(path) {
                    Ok(archive) => ScanEvent::Completed {
                        record: Box::new(analyze_archive(&archive, name, &python, &cfamily)),
                    },
                    Err(e) => ScanEvent::Failed {
                        name: name.clone(),
                        error: format!("{e:#}"),
                    },
                };
                let done_count = finished.fetch_add(1, Ordering::SeqCst) + 1;
                eprintln!(
                    "{} {done_count}/{total} {name}",
                    format_elapsed(started.elapsed())
                );
                // send fails only if the writer already bailed; its error
                // surfaces below
                let _ = sender.send(event);
            });
        });

        writer.join().expect("writer thread panicked")
    })?;

    Ok(ScanSummary {
        completed,
        failed,
        skipped,
    })
}

/// Find `.tgz` / `.tar.gz` archives under a directory, sorted for stable
/// scheduling; a direct archive path is accepted as-is.
pub fn discover_archives(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    let mut archives: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let p = entry.path();
            p.is_file() && {
                let name = p
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                name.ends_with(".tgz") || name.ends_with(".tar.gz")
            }
        })
        .map(|entry| entry.into_path())
        .collect();
    archives.sort();
    archives
}

/// Repository identifier: archive path relative to the scan root, extension
/// stripped, `/` separators. Self-describing in the output, so records can
/// be written in any completion order.
pub fn repository_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut name = relative.to_string_lossy().replace('\\', "/");
    for extension in [".tar.gz", ".tgz", ".tar"] {
        if let Some(stripped) = name.strip_suffix(extension) {
            name = stripped.to_string();
            break;
        }
    }
    name
}

/// Member path as recorded: leading `./` and the repository's own top-level
/// directory stripped.
fn display_path(member: &str, repo: &str) -> String {
    let mut path = member.strip_prefix("./").unwrap_or(member);
    let repo_dir = repo.rsplit('/').next().unwrap_or(repo);
    if let Some(rest) = path.strip_prefix(repo_dir) {
        if let Some(rest) = rest.strip_prefix('/') {
            path = rest;
        }
    }
    path.to_string()
}

fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

fn open_append(path: &Path) -> Result<std::io::BufWriter<std::fs::File>> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open '{}'", path.display()))?;
    Ok(std::io::BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiscan_core::archive::MemoryArchive;
    use apiscan_core::config::LibraryConfig;

    fn analyzers() -> (PythonAnalyzer, CFamilyAnalyzer) {
        (
            PythonAnalyzer::new(&LibraryConfig::default()),
            CFamilyAnalyzer::new().unwrap(),
        )
    }

    #[test]
    fn test_archive_with_python_and_c_members() {
        let mut archive = MemoryArchive::new();
        archive.push(
            "sample/main.py",
            &b"import numba\n@numba.njit\ndef f(x):\n    return x\n"[..],
        );
        archive.push("sample/util.c", &b"#include <stdio.h>\nint main(){return 0;}\n"[..]);

        let (python, cfamily) = analyzers();
        let record = analyze_archive(&archive, "owner/sample", &python, &cfamily);

        assert_eq!(record.name, "owner/sample");
        assert_eq!(record.num_files, 2);

        assert_eq!(record.python.len(), 1);
        let main = &record.python[0];
        assert_eq!(main.path, "main.py");
        assert_eq!(main.suffix, "py");
        let analysis = main.analysis.as_ref().unwrap();
        assert_eq!(analysis.references["@numba.njit"], 1);

        assert_eq!(record.c.len(), 1);
        let util = record.c[0].analysis.as_ref().unwrap();
        assert_eq!(util.external_includes["stdio.h"], 1);
        assert!(util.is_strict_c);
        assert_eq!(util.kernel_launches, 0);

        assert!(record.other_language.is_empty());
    }

    #[test]
    fn test_unparseable_python_member_yields_null_analysis() {
        let mut archive = MemoryArchive::new();
        archive.push("sample/broken.py", &b"def f(:\n"[..]);

        let (python, cfamily) = analyzers();
        let record = analyze_archive(&archive, "sample", &python, &cfamily);

        assert_eq!(record.python.len(), 1, "record is still produced");
        assert!(record.python[0].analysis.is_none());
    }

    #[test]
    fn test_unreadable_member_is_skipped_but_counted() {
        let mut archive = MemoryArchive::new();
        archive.push_unreadable("sample/ghost.py");
        archive.push("sample/ok.py", &b"x = 1\n"[..]);

        let (python, cfamily) = analyzers();
        let record = analyze_archive(&archive, "sample", &python, &cfamily);

        assert_eq!(record.num_files, 2);
        assert_eq!(record.python.len(), 1);
        assert_eq!(record.python[0].path, "ok.py");
    }

    #[test]
    fn test_local_include_detected_across_members() {
        let mut archive = MemoryArchive::new();
        archive.push("sample/kernel.cu", &b"#include \"util.h\"\nk<<<1,2>>>(x);\n"[..]);
        archive.push("sample/util.h", &b"int helper(void);\n"[..]);

        let (python, cfamily) = analyzers();
        let record = analyze_archive(&archive, "sample", &python, &cfamily);

        assert_eq!(record.c.len(), 2);
        let kernel = record
            .c
            .iter()
            .find(|f| f.path == "kernel.cu")
            .unwrap()
            .analysis
            .as_ref()
            .unwrap();
        assert_eq!(kernel.local_includes["util.h"], 1);
        assert_eq!(kernel.kernel_launches, 1);
    }

    #[test]
    fn test_other_languages_tallied_and_unknown_ignored() {
        let mut archive = MemoryArchive::new();
        archive.push("sample/lib.f90", &b"end\n"[..]);
        archive.push("sample/ext.jl", &b"f(x) = x\n"[..]);
        archive.push("sample/notes.txt", &b"hello\n"[..]);
        archive.push_unreadable("sample/");

        let (python, cfamily) = analyzers();
        let record = analyze_archive(&archive, "sample", &python, &cfamily);

        assert_eq!(record.other_language["Fortran"], 1);
        assert_eq!(record.other_language["Julia"], 1);
        assert!(!record.other_language.contains_key("txt"));
        assert_eq!(record.num_files, 4);
    }

    #[test]
    fn test_notebook_member_routes_through_transcoder() {
        let mut archive = MemoryArchive::new();
        archive.push(
            "sample/demo.ipynb",
            &br#"{"nbformat": 4, "cells": [{"cell_type": "code", "source": ["import numba\n"]}]}"#
                [..],
        );
        archive.push("sample/bad.ipynb", &b"not json"[..]);

        let (python, cfamily) = analyzers();
        let record = analyze_archive(&archive, "sample", &python, &cfamily);

        assert_eq!(record.python.len(), 2);
        let demo = record.python.iter().find(|f| f.path == "demo.ipynb").unwrap();
        assert_eq!(demo.analysis.as_ref().unwrap().top_imports["numba"], 1);
        let bad = record.python.iter().find(|f| f.path == "bad.ipynb").unwrap();
        assert!(bad.analysis.is_none(), "transcode failure is a null analysis");
    }

    #[test]
    fn test_repository_name_strips_root_and_extension() {
        let root = Path::new("/data/archives");
        assert_eq!(
            repository_name(root, Path::new("/data/archives/owner/repo.tgz")),
            "owner/repo"
        );
        assert_eq!(
            repository_name(root, Path::new("/data/archives/single.tar.gz")),
            "single"
        );
    }

    #[test]
    fn test_display_path_strips_repo_prefix() {
        assert_eq!(display_path("repo/src/a.py", "owner/repo"), "src/a.py");
        assert_eq!(display_path("./repo/a.py", "repo"), "a.py");
        assert_eq!(display_path("other/a.py", "repo"), "other/a.py");
    }
}
