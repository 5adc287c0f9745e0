//! Render errors.

use stencil_relief::CompilerError;

use crate::collaborators::LoadError;

/// Failure that aborts a render.
///
/// Problems local to one expression or include (unresolved variables,
/// failing functions, missing partials) are not errors; they render empty.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("view [{name}] not found at {path}")]
    ViewNotFound { name: String, path: String },

    #[error("failed to read view [{name}] at {path}: {source}")]
    Io {
        name: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("circular view reference: {chain}")]
    CircularReference { chain: String },

    #[error("views nested deeper than {max} levels")]
    DepthExceeded { max: usize },

    #[error("view [{view}] has {} template error(s): {}", .errors.len(), summarize(.errors))]
    Parse {
        view: String,
        errors: Vec<CompilerError>,
    },
}

impl RenderError {
    pub(crate) fn from_load(name: &str, error: LoadError) -> Self {
        match error {
            LoadError::NotFound { path } => Self::ViewNotFound {
                name: name.to_string(),
                path,
            },
            LoadError::Io { path, source } => Self::Io {
                name: name.to_string(),
                path,
                source,
            },
        }
    }
}

fn summarize(errors: &[CompilerError]) -> String {
    errors
        .iter()
        .map(|e| match &e.loc {
            Some(loc) => format!("{} at {}:{}", e.message, loc.start.line, loc.start.column),
            None => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_relief::{ErrorCode, Position, SourceLocation};

    #[test]
    fn test_parse_error_message() {
        let loc = SourceLocation::new(Position::new(0, 2, 5), Position::new(3, 2, 8));
        let err = RenderError::Parse {
            view: "home".into(),
            errors: vec![CompilerError::new(ErrorCode::UnclosedBlock, Some(loc))],
        };
        let message = err.to_string();
        assert!(message.starts_with("view [home] has 1 template error(s): "));
        assert!(message.ends_with(" at 2:5"));
    }

    #[test]
    fn test_cycle_message() {
        let err = RenderError::CircularReference {
            chain: "a -> b -> a".into(),
        };
        assert_eq!(err.to_string(), "circular view reference: a -> b -> a");
    }
}
