//! Configuration file loading for stencil.
//!
//! Reads the nearest `stencil.config.json`, searching upward from the
//! current working directory.

use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use stencil_atelier::{collaborators::DEFAULT_EXTENSION, RenderOptions};

pub const CONFIG_FILE: &str = "stencil.config.json";

/// Top-level stencil configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StencilConfig {
    /// JSON Schema reference (for editor autocompletion).
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Where views live.
    #[serde(default)]
    pub views: ViewsConfig,

    /// Render behavior.
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ViewsConfig {
    /// Views directory (default: `views`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// View file extension (default: `.stencil.html`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    /// Treat template syntax errors as fatal (default: false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    /// Maximum include/layout nesting (default: 64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    /// Raw output delimiters, e.g. `["{{", "}}"]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_delimiters: Option<(String, String)>,

    /// Escaped output delimiters, e.g. `["{!!", "!!}"]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escaped_delimiters: Option<(String, String)>,

    /// Base URL for `@asset` and `@vite` tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_base: Option<String>,

    /// Emit the Vite client script from `@vite`
    #[serde(default)]
    pub dev_server: bool,
}

impl StencilConfig {
    pub fn views_root(&self) -> PathBuf {
        self.views
            .root
            .clone()
            .unwrap_or_else(|| PathBuf::from("views"))
    }

    pub fn extension(&self) -> &str {
        self.views.extension.as_deref().unwrap_or(DEFAULT_EXTENSION)
    }

    pub fn render_options(&self) -> RenderOptions {
        let mut options = RenderOptions::default();
        if let Some(strict) = self.render.strict {
            options.strict = strict;
        }
        if let Some(max_depth) = self.render.max_depth {
            options.max_depth = max_depth;
        }
        if let Some((open, close)) = &self.render.raw_delimiters {
            options.parser.raw_delimiters = (open.as_str().into(), close.as_str().into());
        }
        if let Some((open, close)) = &self.render.escaped_delimiters {
            options.parser.escaped_delimiters = (open.as_str().into(), close.as_str().into());
        }
        options
    }
}

/// Error reading or parsing a config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Find the nearest `stencil.config.json` in `start` or one of its ancestors.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|path| path.is_file())
}

/// Read a config file. A relative `views.root` is resolved against the
/// directory holding the file.
pub fn read_config(path: &Path) -> Result<StencilConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: StencilConfig =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if let (Some(root), Some(base)) = (config.views.root.as_mut(), path.parent()) {
        if root.is_relative() {
            *root = base.join(&*root);
        }
    }
    Ok(config)
}

/// Load the project config found from `dir` (or the CWD), falling back to
/// defaults with a warning when it cannot be used.
pub fn load_config(dir: Option<&Path>) -> StencilConfig {
    let start = dir.map_or_else(|| env::current_dir().unwrap_or_default(), Path::to_path_buf);
    let Some(path) = find_config(&start) else {
        return StencilConfig::default();
    };

    match read_config(&path) {
        Ok(config) => {
            tracing::debug!(path = %path.display(), "loaded config");
            config
        }
        Err(e) => {
            eprintln!("\x1b[33mWarning:\x1b[0m {e}");
            StencilConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path()));
        assert_eq!(config.views_root(), PathBuf::from("views"));
        assert_eq!(config.extension(), ".stencil.html");
        assert!(!config.render_options().strict);
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{
                "views": { "root": "resources/views", "extension": ".html" },
                "render": { "strict": true, "maxDepth": 8, "rawDelimiters": ["[[", "]]"], "devServer": true }
            }"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()));
        assert_eq!(config.views_root(), dir.path().join("resources/views"));
        assert_eq!(config.extension(), ".html");
        assert!(config.render.dev_server);

        let options = config.render_options();
        assert!(options.strict);
        assert_eq!(options.max_depth, 8);
        assert_eq!(options.parser.raw_delimiters.0, "[[");
        assert_eq!(options.parser.escaped_delimiters.0, "{!!");
    }

    #[test]
    fn test_config_found_in_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "views": { "root": "templates" } }"#,
        )
        .unwrap();
        let nested = dir.path().join("pages/admin");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config(&nested), Some(dir.path().join(CONFIG_FILE)));
        let config = load_config(Some(&nested));
        assert_eq!(config.views_root(), dir.path().join("templates"));
    }

    #[test]
    fn test_absolute_views_root_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let views = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let content = serde_json::json!({ "views": { "root": views.path() } });
        std::fs::write(&path, content.to_string()).unwrap();
        let config = read_config(&path).unwrap();
        assert_eq!(config.views_root(), views.path());
    }

    #[test]
    fn test_invalid_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        let err = read_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("failed to parse"));

        let config = load_config(Some(dir.path()));
        assert!(config.views.root.is_none());
    }
}
