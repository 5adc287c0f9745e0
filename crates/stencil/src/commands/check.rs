//! Check command - Report template syntax errors

use clap::{Args, ValueEnum};
use ignore::Walk;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use stencil_armature::parse_with_options;
use stencil_relief::CompilerError;

use crate::config::StencilConfig;

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `file:line:column: message` lines
    #[default]
    Text,
    /// JSON array of files with their errors
    Json,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Directories or files to check (default: the views directory)
    pub paths: Vec<PathBuf>,

    /// View file extension (default: `.stencil.html`)
    #[arg(long)]
    pub ext: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Quiet mode - only show errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    errors: Vec<CompilerError>,
}

pub fn run(args: CheckArgs, config: &StencilConfig) {
    let start = Instant::now();
    let extension = args.ext.as_deref().unwrap_or_else(|| config.extension());
    let roots = if args.paths.is_empty() {
        vec![config.views_root()]
    } else {
        args.paths.clone()
    };

    // Walk directories (respects .gitignore)
    let files: Vec<PathBuf> = roots
        .iter()
        .flat_map(|root| {
            Walk::new(root)
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
                .filter(|e| e.path().to_string_lossy().ends_with(extension))
                .map(|e| e.into_path())
                .collect::<Vec<_>>()
        })
        .collect();

    if files.is_empty() {
        eprintln!("No {extension} files found in {roots:?}");
        return;
    }

    let parser_options = config.render_options().parser;
    let error_count = AtomicUsize::new(0);
    let unreadable = AtomicUsize::new(0);

    // Parse all files in parallel
    let mut reports: Vec<FileReport> = files
        .par_iter()
        .filter_map(|path| {
            let source = match fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Failed to read {}: {}", path.display(), e);
                    unreadable.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            };
            let (_, errors) = parse_with_options(&source, &parser_options);
            if errors.is_empty() {
                return None;
            }
            error_count.fetch_add(errors.len(), Ordering::Relaxed);
            Some(FileReport {
                file: path.display().to_string(),
                errors,
            })
        })
        .collect();
    reports.sort_by(|a, b| a.file.cmp(&b.file));

    let total_errors = error_count.load(Ordering::Relaxed);
    let unreadable = unreadable.load(Ordering::Relaxed);

    match args.format {
        OutputFormat::Text => {
            for report in &reports {
                for error in &report.errors {
                    match &error.loc {
                        Some(loc) => println!(
                            "{}:{}:{}: {}",
                            report.file, loc.start.line, loc.start.column, error.message
                        ),
                        None => println!("{}: {}", report.file, error.message),
                    }
                }
            }
            if !args.quiet {
                println!(
                    "\nChecked {} files in {:.4?}: {} error(s) in {} file(s)",
                    files.len(),
                    start.elapsed(),
                    total_errors,
                    reports.len()
                );
            }
        }
        OutputFormat::Json => match serde_json::to_string_pretty(&reports) {
            Ok(json) => println!("{json}"),
            Err(e) => super::fail(e),
        },
    }

    if total_errors > 0 || unreadable > 0 {
        std::process::exit(1);
    }
}
