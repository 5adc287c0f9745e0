//! CLI subcommands.

pub mod ast;
pub mod check;
pub mod render;

/// Print an error and exit with status 1.
pub(crate) fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("\x1b[31mError:\x1b[0m {message}");
    std::process::exit(1);
}
