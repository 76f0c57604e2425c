//! External metadata service seam
//!
//! URL-based entry creation asks an external service to turn a URL into
//! record text. This crate only consumes that function; the HTTP client
//! behind it lives elsewhere. Failures are reported, never retried here.

use imshelf_bibtex::{parse, ParseError};

use crate::path::RefPath;
use crate::store::{Store, StoreError};

/// Metadata service failure
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("service returned no usable record: {0}")]
    BadResponse(String),
}

/// A source of record text for a URL
pub trait MetadataSource {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Failure creating a reference from fetched record text
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("fetched text is not a valid record: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fetch record text for `url` and create a new reference from it.
///
/// The fetched text must parse; a service that answers with an error page
/// instead of a record fails here rather than polluting the store.
pub fn create_from_source(
    store: &Store,
    path: &RefPath,
    source: &dyn MetadataSource,
    url: &str,
) -> Result<(), CreateError> {
    let text = source.fetch(url)?;
    parse(&text)?;
    store.create(path, &text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct StaticSource(&'static str);

    impl MetadataSource for StaticSource {
        fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingSource;

    impl MetadataSource for FailingSource {
        fn fetch(&self, url: &str) -> Result<String, FetchError> {
            Err(FetchError::Network(format!("connection refused: {url}")))
        }
    }

    #[test]
    fn test_create_from_source() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path(), "bib");
        let path = RefPath::new("cs/fetched").unwrap();
        let source = StaticSource("@article{Fetched2024,\n    title = {From the Service},\n}\n");

        create_from_source(&store, &path, &source, "https://example.org/paper").unwrap();
        assert_eq!(store.read(&path).unwrap()[0].key, "Fetched2024");
    }

    #[test]
    fn test_non_record_response_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path(), "bib");
        let path = RefPath::new("cs/fetched").unwrap();
        let source = StaticSource("@article{Broken, title = {never closed");

        let err =
            create_from_source(&store, &path, &source, "https://example.org/paper").unwrap_err();
        assert!(matches!(err, CreateError::Parse(_)));
        assert!(!store.exists(&path));
    }

    #[test]
    fn test_network_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path(), "bib");
        let path = RefPath::new("cs/fetched").unwrap();

        let err = create_from_source(&store, &path, &FailingSource, "https://example.org")
            .unwrap_err();
        assert!(matches!(err, CreateError::Fetch(FetchError::Network(_))));
    }
}
