//! Paths that may only be known once a task runs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A file path given either up front or as a provider evaluated on demand.
///
/// Build scripts often declare output locations before the directories they
/// live in exist. The deferred form runs its provider on the first
/// `resolve()` and returns that same path afterwards.
pub enum ResolvablePath {
    Literal(PathBuf),
    Deferred {
        provider: Box<dyn Fn() -> PathBuf + Send + Sync>,
        resolved: OnceLock<PathBuf>,
    },
}

impl ResolvablePath {
    pub fn deferred(provider: impl Fn() -> PathBuf + Send + Sync + 'static) -> Self {
        ResolvablePath::Deferred {
            provider: Box::new(provider),
            resolved: OnceLock::new(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        match self {
            ResolvablePath::Literal(path) => path.clone(),
            ResolvablePath::Deferred { provider, resolved } => {
                resolved.get_or_init(|| provider()).clone()
            }
        }
    }
}

impl fmt::Debug for ResolvablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvablePath::Literal(path) => f.debug_tuple("Literal").field(path).finish(),
            ResolvablePath::Deferred { resolved, .. } => match resolved.get() {
                Some(path) => f.debug_tuple("Deferred").field(path).finish(),
                None => f.write_str("Deferred(..)"),
            },
        }
    }
}

impl From<PathBuf> for ResolvablePath {
    fn from(path: PathBuf) -> Self {
        ResolvablePath::Literal(path)
    }
}

impl From<&Path> for ResolvablePath {
    fn from(path: &Path) -> Self {
        ResolvablePath::Literal(path.to_path_buf())
    }
}

impl From<&str> for ResolvablePath {
    fn from(path: &str) -> Self {
        ResolvablePath::Literal(PathBuf::from(path))
    }
}
