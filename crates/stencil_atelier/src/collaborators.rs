//! Services the renderer calls out to.
//!
//! Views are loaded through a [`ViewLoader`]. CSRF fields, session data and
//! asset tags come from the host application through the other traits; each
//! has a no-op default and a simple concrete implementation.

use std::{
    io,
    path::{Path, PathBuf},
};

use stencil_carton::{escape_html, FxHashMap};
use stencil_relief::{Map, Value};

pub const DEFAULT_EXTENSION: &str = ".stencil.html";

/// Template text together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSource {
    pub path: String,
    pub source: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("view not found at {path}")]
    NotFound { path: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl LoadError {
    pub fn path(&self) -> &str {
        match self {
            Self::NotFound { path } | Self::Io { path, .. } => path,
        }
    }
}

/// Resolves a dotted view name such as `layouts.app` to template source.
pub trait ViewLoader {
    fn load(&self, name: &str) -> Result<ViewSource, LoadError>;
}

/// Loads `a.b` from `<root>/a/b<extension>`.
#[derive(Debug, Clone)]
pub struct FileViewLoader {
    root: PathBuf,
    extension: String,
}

impl FileViewLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = if extension.is_empty() || extension.starts_with('.') {
            extension
        } else {
            format!(".{extension}")
        };
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for a view name. Names with empty segments (which also
    /// covers `..`) have no path.
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        let mut segments = name.split(['.', '/']).peekable();
        while let Some(segment) = segments.next() {
            if segment.is_empty() || segment.contains('\\') {
                return None;
            }
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{segment}{}", self.extension));
            }
        }
        Some(path)
    }
}

impl ViewLoader for FileViewLoader {
    fn load(&self, name: &str) -> Result<ViewSource, LoadError> {
        let Some(path) = self.path_for(name) else {
            return Err(LoadError::NotFound {
                path: self.root.join(name).display().to_string(),
            });
        };
        let display = path.display().to_string();
        match std::fs::read_to_string(&path) {
            Ok(source) => Ok(ViewSource {
                path: display,
                source,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(LoadError::NotFound { path: display })
            }
            Err(source) => Err(LoadError::Io {
                path: display,
                source,
            }),
        }
    }
}

/// In-memory views keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryViewLoader {
    views: FxHashMap<String, String>,
}

impl MemoryViewLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.views.insert(name.into(), source.into());
    }
}

impl ViewLoader for MemoryViewLoader {
    fn load(&self, name: &str) -> Result<ViewSource, LoadError> {
        match self.views.get(name) {
            Some(source) => Ok(ViewSource {
                path: format!("memory:{name}"),
                source: source.clone(),
            }),
            None => Err(LoadError::NotFound {
                path: format!("memory:{name}"),
            }),
        }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MemoryViewLoader {
    fn from(views: [(&str, &str); N]) -> Self {
        Self {
            views: views
                .into_iter()
                .map(|(name, source)| (name.to_string(), source.to_string()))
                .collect(),
        }
    }
}

/// Produces the hidden form field for `@csrf`.
pub trait CsrfProvider {
    fn field(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCsrf;

impl CsrfProvider for NoCsrf {
    fn field(&self) -> String {
        String::new()
    }
}

/// A fixed token.
#[derive(Debug, Clone)]
pub struct TokenCsrf(pub String);

impl CsrfProvider for TokenCsrf {
    fn field(&self) -> String {
        format!(
            r#"<input type="hidden" name="_token" value="{}">"#,
            escape_html(&self.0)
        )
    }
}

/// Flashed validation errors and old form input.
pub trait SessionStore {
    /// Field name to message (or list of messages).
    fn errors(&self) -> Map<String, Value>;

    /// Old input for `key`, or `default` when there is none.
    fn old(&self, key: &str, default: Value) -> Value;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySession;

impl SessionStore for EmptySession {
    fn errors(&self) -> Map<String, Value> {
        Map::new()
    }

    fn old(&self, _key: &str, default: Value) -> Value {
        default
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    pub errors: Map<String, Value>,
    pub old: Map<String, Value>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error(mut self, field: impl Into<String>, message: impl Into<Value>) -> Self {
        self.errors.insert(field.into(), message.into());
        self
    }

    pub fn with_old(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.old.insert(key.into(), value.into());
        self
    }
}

impl SessionStore for MemorySession {
    fn errors(&self) -> Map<String, Value> {
        self.errors.clone()
    }

    fn old(&self, key: &str, default: Value) -> Value {
        match self.old.get(key) {
            Some(Value::Null) | None => default,
            Some(value) => value.clone(),
        }
    }
}

/// Builds the tags emitted by `@asset` and `@vite`.
pub trait AssetResolver {
    fn script_tag(&self, path: &str) -> String;
    fn css_tags(&self, path: &str) -> String;
    fn client_script(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

impl AssetResolver for NoAssets {
    fn script_tag(&self, _path: &str) -> String {
        String::new()
    }

    fn css_tags(&self, _path: &str) -> String {
        String::new()
    }

    fn client_script(&self) -> String {
        String::new()
    }
}

/// Serves entries from a fixed base URL, optionally through a dev server.
#[derive(Debug, Clone, Default)]
pub struct StaticAssetResolver {
    pub base_url: String,
    pub dev_server: bool,
}

impl StaticAssetResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            dev_server: false,
        }
    }

    pub fn with_dev_server(mut self, dev_server: bool) -> Self {
        self.dev_server = dev_server;
        self
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn is_stylesheet(path: &str) -> bool {
    path.ends_with(".css") || path.ends_with(".scss")
}

impl AssetResolver for StaticAssetResolver {
    fn script_tag(&self, path: &str) -> String {
        if is_stylesheet(path) {
            return String::new();
        }
        format!(
            r#"<script type="module" src="{}"></script>"#,
            escape_html(&self.url(path))
        )
    }

    fn css_tags(&self, path: &str) -> String {
        if !is_stylesheet(path) {
            return String::new();
        }
        format!(
            r#"<link rel="stylesheet" href="{}">"#,
            escape_html(&self.url(path))
        )
    }

    fn client_script(&self) -> String {
        if self.dev_server {
            self.script_tag("@vite/client")
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_loader_paths() {
        let loader = FileViewLoader::new("/views");
        assert_eq!(
            loader.path_for("layouts.app"),
            Some(PathBuf::from("/views/layouts/app.stencil.html"))
        );
        assert_eq!(loader.path_for("../secret"), None);
        assert_eq!(loader.path_for(""), None);

        let html = FileViewLoader::new("/views").with_extension("html");
        assert_eq!(html.path_for("home"), Some(PathBuf::from("/views/home.html")));
    }

    #[test]
    fn test_file_loader_reads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("partials")).unwrap();
        std::fs::write(dir.path().join("partials/nav.stencil.html"), "<nav/>").unwrap();

        let loader = FileViewLoader::new(dir.path());
        let view = loader.load("partials.nav").unwrap();
        assert_eq!(view.source, "<nav/>");
        assert!(view.path.ends_with("nav.stencil.html"));

        let err = loader.load("partials.footer").unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
        assert!(err.path().ends_with("footer.stencil.html"));
    }

    #[test]
    fn test_empty_file_is_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blank.stencil.html"), "").unwrap();
        let view = FileViewLoader::new(dir.path()).load("blank").unwrap();
        assert_eq!(view.source, "");
    }

    #[test]
    fn test_memory_loader() {
        let loader = MemoryViewLoader::from([("home", "hi")]);
        assert_eq!(loader.load("home").unwrap().source, "hi");
        assert!(loader.load("away").is_err());
    }

    #[test]
    fn test_csrf_field() {
        assert_eq!(NoCsrf.field(), "");
        assert_eq!(
            TokenCsrf("a\"b".into()).field(),
            r#"<input type="hidden" name="_token" value="a&quot;b">"#
        );
    }

    #[test]
    fn test_session_old_falls_back() {
        let session = MemorySession::new().with_old("email", "a@b.c");
        assert_eq!(session.old("email", Value::Null), json!("a@b.c"));
        assert_eq!(session.old("name", json!("Guest")), json!("Guest"));
        assert_eq!(EmptySession.old("name", Value::Null), Value::Null);
    }

    #[test]
    fn test_static_assets() {
        let assets = StaticAssetResolver::new("/build/").with_dev_server(true);
        assert_eq!(
            assets.script_tag("app.js"),
            r#"<script type="module" src="/build/app.js"></script>"#
        );
        assert_eq!(assets.script_tag("app.css"), "");
        assert_eq!(
            assets.css_tags("/app.css"),
            r#"<link rel="stylesheet" href="/build/app.css">"#
        );
        assert_eq!(
            assets.client_script(),
            r#"<script type="module" src="/build/@vite/client"></script>"#
        );
        assert_eq!(StaticAssetResolver::new("").client_script(), "");
    }
}
