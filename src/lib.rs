use thiserror::Error;

pub mod io;
pub mod loader;
pub mod model;

/// Failures of a whole `load` call. Parse-level errors pass through with
/// their file/offset context; everything the loaders add on top (transport,
/// image decoding, flattening) carries the offending URL or material.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Parser(#[from] meshgate_files::ParserError),

    #[error("failed to fetch {url}")]
    Fetch {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON from {url}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode image {url}")]
    Image {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("flattening: polygons sharing material '{material}' have incompatible {attribute} layouts")]
    IncompatibleStride {
        material: String,
        attribute: &'static str,
    },
}
