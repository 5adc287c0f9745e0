//! # stencil
//!
//! Stencil - Directive-based HTML templates in Rust.
//!
//! ## Name Origin
//!
//! A **stencil** is a cut sheet that lays the same pattern down again and
//! again, leaving fresh paint each time. Templates work the same way: one
//! cut, many renders with different data.

mod commands;
mod config;

use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(name = "stencil")]
#[command(about = "Render and check Stencil templates", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a view to stdout or a file
    #[command(visible_alias = "atelier")]
    Render(commands::render::RenderArgs),

    /// Parse templates and report syntax errors
    Check(commands::check::CheckArgs),

    /// Print the parsed AST of a template as JSON
    #[command(visible_alias = "relief")]
    Ast(commands::ast::AstArgs),
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::load_config(None);

    match cli.command {
        Commands::Render(args) => commands::render::run(args, &config),
        Commands::Check(args) => commands::check::run(args, &config),
        Commands::Ast(args) => commands::ast::run(args, &config),
    }
}
