//! Render command - Render a view with JSON data

use clap::Args;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use stencil_atelier::{
    FileViewLoader, MemorySession, RenderError, Renderer, StaticAssetResolver, TokenCsrf,
};

use super::fail;
use crate::config::StencilConfig;

#[derive(Args)]
pub struct RenderArgs {
    /// View name in dot notation (e.g. `pages.home`)
    pub view: String,

    /// Views directory (default: `views`, or `views.root` from the config)
    #[arg(long)]
    pub views: Option<PathBuf>,

    /// View file extension (default: `.stencil.html`)
    #[arg(long)]
    pub ext: Option<String>,

    /// JSON object file with the template data
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// JSON object file with validation errors, keyed by field
    #[arg(long)]
    pub errors: Option<PathBuf>,

    /// JSON object file with old form input
    #[arg(long)]
    pub old: Option<PathBuf>,

    /// CSRF token emitted by `@csrf`
    #[arg(long)]
    pub csrf_token: Option<String>,

    /// Base URL for `@asset` and `@vite` tags
    #[arg(long)]
    pub asset_base: Option<String>,

    /// Emit the Vite client script from `@vite`
    #[arg(long)]
    pub dev_server: bool,

    /// Fail on template syntax errors instead of rendering what was recovered
    #[arg(long)]
    pub strict: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: RenderArgs, config: &StencilConfig) {
    let start = Instant::now();

    let data = read_object(args.data.as_deref());
    let session = MemorySession {
        errors: read_object(args.errors.as_deref()),
        old: read_object(args.old.as_deref()),
    };

    let mut options = config.render_options();
    if args.strict {
        options.strict = true;
    }

    let root = args.views.unwrap_or_else(|| config.views_root());
    let extension = args.ext.as_deref().unwrap_or_else(|| config.extension());
    let loader = FileViewLoader::new(root).with_extension(extension);

    let mut renderer = Renderer::new(loader)
        .with_options(options)
        .with_session(session);
    if let Some(token) = args.csrf_token {
        renderer = renderer.with_csrf(TokenCsrf(token));
    }
    if let Some(base) = args.asset_base.or_else(|| config.render.asset_base.clone()) {
        let dev_server = args.dev_server || config.render.dev_server;
        renderer = renderer.with_assets(StaticAssetResolver::new(base).with_dev_server(dev_server));
    }

    tracing::debug!(
        strict = renderer.options().strict,
        max_depth = renderer.options().max_depth,
        "renderer ready"
    );

    let html = match renderer.render(&args.view, Value::Object(data)) {
        Ok(html) => html,
        Err(RenderError::Parse { view, errors }) => {
            for error in &errors {
                match &error.loc {
                    Some(loc) => eprintln!(
                        "{view}:{}:{}: {}",
                        loc.start.line, loc.start.column, error.message
                    ),
                    None => eprintln!("{view}: {}", error.message),
                }
            }
            fail(format_args!("view [{view}] has {} template error(s)", errors.len()));
        }
        Err(e) => fail(e),
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = fs::write(path, &html) {
                fail(format_args!("failed to write {}: {e}", path.display()));
            }
            tracing::info!(
                view = %args.view,
                output = %path.display(),
                bytes = html.len(),
                elapsed = ?start.elapsed(),
                "rendered"
            );
        }
        None => {
            print!("{html}");
            tracing::info!(view = %args.view, bytes = html.len(), elapsed = ?start.elapsed(), "rendered");
        }
    }
}

/// Read a JSON object from `path`, or an empty object without one.
fn read_object(path: Option<&Path>) -> Map<String, Value> {
    let Some(path) = path else {
        return Map::new();
    };
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => fail(format_args!("failed to read {}: {e}", path.display())),
    };
    match serde_json::from_str(&content) {
        Ok(Value::Object(map)) => map,
        Ok(_) => fail(format_args!("{} must hold a JSON object", path.display())),
        Err(e) => fail(format_args!("failed to parse {}: {e}", path.display())),
    }
}
