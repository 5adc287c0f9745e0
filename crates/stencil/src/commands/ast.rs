//! AST command - Print the parsed template tree

use clap::Args;
use std::fs;
use std::path::PathBuf;
use stencil_armature::parse_with_options;

use super::fail;
use crate::config::StencilConfig;

#[derive(Args)]
pub struct AstArgs {
    /// Template file to parse
    pub file: PathBuf,

    /// Print compact JSON on a single line
    #[arg(long)]
    pub compact: bool,
}

pub fn run(args: AstArgs, config: &StencilConfig) {
    let source = match fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(e) => fail(format_args!("failed to read {}: {e}", args.file.display())),
    };

    let (root, errors) = parse_with_options(&source, &config.render_options().parser);
    for error in &errors {
        let (line, column) = error
            .loc
            .map_or((0, 0), |loc| (loc.start.line, loc.start.column));
        eprintln!(
            "\x1b[33mWarning:\x1b[0m {}:{line}:{column}: {}",
            args.file.display(),
            error.message
        );
    }

    let json = if args.compact {
        serde_json::to_string(&root)
    } else {
        serde_json::to_string_pretty(&root)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => fail(e),
    }
}
