//! `dynjava check`: parse every file, then check the parsed units together.

use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::Result;
use dj_check::{CompilationUnitChecker, ExecutionError};
use dj_core::{LineIndex, NodeIdGen, Options};
use dj_syntax::parse_compilation_unit;
use dj_types::LibraryContext;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Diagnostic {
    /// `None` when the failure could not be tied to a file.
    pub file: Option<PathBuf>,
    pub line: u32,
    pub column: u32,
    pub key: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub files: usize,
    pub errors: usize,
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub summary: Summary,
    pub diagnostics: Vec<Diagnostic>,
}

/// A parsed file and the node ids its syntax tree received.
struct Source {
    path: PathBuf,
    lines: LineIndex,
    ids: Range<u32>,
}

/// `.java` files under `roots`, sorted per root. A root that is not a directory is taken
/// as a file as given.
pub fn discover(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in roots {
        if !root.is_dir() {
            files.push(root.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "java"))
            .collect();
        found.sort();
        files.extend(found);
    }
    files
}

pub fn check_roots(roots: &[PathBuf], env: LibraryContext, options: Options) -> CheckReport {
    let files = discover(roots);
    let mut ids = NodeIdGen::new();
    let mut sources = Vec::new();
    let mut units = Vec::new();
    let mut diagnostics = Vec::new();

    for path in &files {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                diagnostics.push(Diagnostic {
                    file: Some(path.clone()),
                    line: 0,
                    column: 0,
                    key: "io.error",
                    message: err.to_string(),
                });
                continue;
            }
        };
        let lines = LineIndex::new(&text);
        let start = ids.peek().0;
        match parse_compilation_unit(&text, &options, &mut ids) {
            Ok(unit) => {
                sources.push(Source {
                    path: path.clone(),
                    lines,
                    ids: start..ids.peek().0,
                });
                units.push(unit);
            }
            Err(err) => {
                let at = lines.line_col(err.span.start);
                diagnostics.push(Diagnostic {
                    file: Some(path.clone()),
                    line: at.line,
                    column: at.col,
                    key: err.key(),
                    message: err.message,
                });
            }
        }
    }
    tracing::info!(target: "dj.cli", files = files.len(), parsed = units.len(), "parsed sources");

    let mut checker = CompilationUnitChecker::new(env, options);
    if let Err(errors) = checker.check(&units) {
        diagnostics.extend(errors.errors.into_iter().map(|err| locate(&sources, err)));
    }

    CheckReport {
        summary: Summary {
            files: files.len(),
            errors: diagnostics.len(),
        },
        diagnostics,
    }
}

fn locate(sources: &[Source], err: ExecutionError) -> Diagnostic {
    let source = err
        .node
        .and_then(|node| sources.iter().find(|source| source.ids.contains(&node.0)));
    let (file, line, column) = match source {
        Some(source) => {
            let at = source.lines.line_col(err.span.start);
            (Some(source.path.clone()), at.line, at.col)
        }
        None => (None, 0, 0),
    };
    Diagnostic {
        file,
        line,
        column,
        key: err.key(),
        message: err.message,
    }
}

pub fn print_report(report: &CheckReport, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(report)?;
        println!("{out}");
        return Ok(());
    }
    if report.diagnostics.is_empty() {
        println!("Completed checking successfully");
        return Ok(());
    }
    for d in &report.diagnostics {
        println!(
            "{}:{}:{}: [{}] {}",
            d.file.as_deref().map_or_else(|| "<unknown>".into(), Path::to_string_lossy),
            d.line,
            d.column,
            d.key,
            d.message
        );
    }
    Ok(())
}
