//! Asset size lookup.
//!
//! The planner needs each candidate's size to stay inside the flow-control
//! budget. Sizes come from a [`SizeLookup`] collaborator so the planner does
//! not care where assets live.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use thiserror::Error;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors looking up an asset size.
#[derive(Debug, Error)]
pub enum SizeLookupError {
    /// No asset at this path.
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Path resolves to something other than a regular file.
    #[error("Not a regular file: {0}")]
    NotAFile(String),

    /// Path escapes the asset root or is otherwise unusable.
    #[error("Invalid asset path: {0}")]
    InvalidPath(String),

    /// I/O error reading metadata.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Resolves a request path to the size of the asset it names.
///
/// # Dyn Compatibility
///
/// Uses `Pin<Box<dyn Future>>` so planners can hold `&dyn SizeLookup` or
/// `Arc<dyn SizeLookup>`.
pub trait SizeLookup: Send + Sync {
    /// Size in bytes of the asset at `path`.
    fn size_of<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<u64, SizeLookupError>>;
}

/// Sizes of files under a static asset root.
///
/// Request paths are resolved relative to the root. Query strings are
/// ignored, and paths containing `..` or other non-normal components are
/// rejected.
#[derive(Debug, Clone)]
pub struct FsSizeLookup {
    root: PathBuf,
}

impl FsSizeLookup {
    /// Serve sizes for files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The asset root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto the filesystem.
    pub fn resolve(&self, request_path: &str) -> Result<PathBuf, SizeLookupError> {
        let without_query = request_path.split(['?', '#']).next().unwrap_or_default();
        let relative = without_query.trim_start_matches('/');

        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(SizeLookupError::InvalidPath(request_path.to_string())),
            }
        }
        Ok(resolved)
    }
}

impl SizeLookup for FsSizeLookup {
    fn size_of<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<u64, SizeLookupError>> {
        Box::pin(async move {
            let resolved = self.resolve(path)?;
            let metadata = tokio::fs::metadata(&resolved).await.map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    SizeLookupError::NotFound(path.to_string())
                } else {
                    SizeLookupError::Io(e)
                }
            })?;
            if !metadata.is_file() {
                return Err(SizeLookupError::NotAFile(path.to_string()));
            }
            Ok(metadata.len())
        })
    }
}

/// In-memory size table.
///
/// Useful for tests and for replaying traffic without the asset tree.
#[derive(Debug, Clone, Default)]
pub struct FixedSizeLookup {
    sizes: HashMap<String, u64>,
}

impl FixedSizeLookup {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn with(mut self, path: impl Into<String>, size: u64) -> Self {
        self.sizes.insert(path.into(), size);
        self
    }

    /// Add or replace an entry in place.
    pub fn insert(&mut self, path: impl Into<String>, size: u64) {
        self.sizes.insert(path.into(), size);
    }
}

impl SizeLookup for FixedSizeLookup {
    fn size_of<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<u64, SizeLookupError>> {
        let result = self
            .sizes
            .get(path)
            .copied()
            .ok_or_else(|| SizeLookupError::NotFound(path.to_string()));
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_strips_leading_slash_and_query() {
        let lookup = FsSizeLookup::new("/srv/static");
        assert_eq!(
            lookup.resolve("/css/site.css?v=3").unwrap(),
            PathBuf::from("/srv/static/css/site.css")
        );
        assert_eq!(
            lookup.resolve("./img/./logo.png#top").unwrap(),
            PathBuf::from("/srv/static/img/logo.png")
        );
    }

    #[test]
    fn test_resolve_rejects_parent_components() {
        let lookup = FsSizeLookup::new("/srv/static");
        assert!(matches!(
            lookup.resolve("/../etc/passwd"),
            Err(SizeLookupError::InvalidPath(_))
        ));
        assert!(matches!(
            lookup.resolve("/a/../../b"),
            Err(SizeLookupError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_lookup_reads_file_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bar.js"), b"console.log(1);").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let lookup = FsSizeLookup::new(dir.path());
        assert_eq!(lookup.size_of("/bar.js").await.unwrap(), 15);
        assert!(matches!(
            lookup.size_of("/missing.js").await,
            Err(SizeLookupError::NotFound(_))
        ));
        assert!(matches!(
            lookup.size_of("/sub").await,
            Err(SizeLookupError::NotAFile(_))
        ));
    }

    #[tokio::test]
    async fn test_fixed_lookup() {
        let lookup = FixedSizeLookup::new().with("/a.css", 10);
        assert_eq!(lookup.size_of("/a.css").await.unwrap(), 10);
        assert!(lookup.size_of("/b.css").await.is_err());
    }
}
