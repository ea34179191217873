use std::path::PathBuf;

use serde_json::Value;

use crate::LoadError;

/// The fetch collaborator. Loaders suspend only at these boundaries; all
/// parsing between fetches is synchronous. Implementations wrap transport
/// failures with the offending URL.
pub trait AssetSource {
    fn fetch_binary(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, LoadError>>;
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, LoadError>>;
    fn fetch_json(&self, url: &str) -> impl Future<Output = Result<Value, LoadError>>;
}

/// Filesystem-backed source; URLs are paths relative to the root directory.
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> FileSource {
        FileSource { root: root.into() }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        self.root.join(url)
    }
}

impl AssetSource for FileSource {
    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        tokio::fs::read(self.resolve(url))
            .await
            .map_err(|source| LoadError::Fetch {
                url: url.to_owned(),
                source,
            })
    }

    async fn fetch_text(&self, url: &str) -> Result<String, LoadError> {
        tokio::fs::read_to_string(self.resolve(url))
            .await
            .map_err(|source| LoadError::Fetch {
                url: url.to_owned(),
                source,
            })
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, LoadError> {
        let text = self.fetch_text(url).await?;
        serde_json::from_str(&text).map_err(|source| LoadError::Json {
            url: url.to_owned(),
            source,
        })
    }
}
