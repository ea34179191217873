use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Vec4};
use itertools::Itertools;
use meshgate_files::common::types::ColorRgba;
use meshgate_files::ParserError;

use crate::io::image::ImageDecoder;
use crate::io::source::AssetSource;
use crate::model::geometry;
use crate::model::types::{Filter, Model, Polygon, Texture};
use crate::LoadError;

pub mod document_loader;
pub mod gltf_loader;
pub mod obj_loader;
pub mod tds_loader;

/// Per-load configuration shared by every entry point.
#[derive(Debug, Default, Clone)]
pub struct LoadOptions {
    /// Applied to the root meshes during finalization.
    pub transform: Option<Mat4>,
    /// Text-format object-name filter; other formats ignore it.
    pub object_filter: Option<String>,
}

/// Per-load texture dedup cache, keyed by resolved URL. Passed down
/// explicitly so concurrent loads never share state and the cache dies with
/// its `load` call.
pub(crate) struct TextureCache {
    entries: HashMap<String, Arc<Texture>>,
}

impl TextureCache {
    pub(crate) fn new() -> TextureCache {
        TextureCache {
            entries: HashMap::new(),
        }
    }

    pub(crate) fn get(&self, url: &str) -> Option<Arc<Texture>> {
        self.entries.get(url).cloned()
    }
}

/// Fetch and decode a set of texture URLs into the cache. The fetches are
/// structurally independent and awaited together; decoding is synchronous.
pub(crate) async fn fetch_textures<S: AssetSource, D: ImageDecoder>(
    source: &S,
    decoder: &D,
    cache: &mut TextureCache,
    urls: &[String],
) -> Result<(), LoadError> {
    let missing = urls
        .iter()
        .unique()
        .filter(|url| !cache.entries.contains_key(url.as_str()))
        .collect_vec();

    let fetched = futures::future::try_join_all(missing.iter().map(|url| source.fetch_binary(url.as_str()))).await?;

    for (url, bytes) in missing.into_iter().zip(fetched) {
        let image = decoder.decode(&bytes, None, url)?;
        cache.entries.insert(
            url.clone(),
            Arc::new(Texture {
                image: Arc::new(image),
                filter: Filter::default(),
            }),
        );
    }
    Ok(())
}

/// Fill in missing derived geometry and apply the optional root transform.
pub(crate) fn finalize(model: &mut Model, options: &LoadOptions) {
    geometry::derive_missing(model);
    if let Some(transform) = options.transform {
        model.apply_root_transform(transform);
    }
}

pub(crate) fn color_to_vec4(color: ColorRgba) -> Vec4 {
    Vec4::new(color.r, color.g, color.b, color.a)
}

/// Enforce the polygon invariant: every triangle index addresses a vertex.
pub(crate) fn check_indices(file: &str, element: &str, polygon: &Polygon) -> Result<(), LoadError> {
    let limit = polygon.positions.len() as u32;
    for triangle in &polygon.indices {
        for &index in triangle {
            if index >= limit {
                return Err(ParserError::InvalidReference {
                    file: file.to_owned(),
                    element: element.to_owned(),
                    pool: "positions",
                    reason: format!("triangle index {} out of range ({} vertices)", index, limit),
                }
                .into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;
    use std::io::ErrorKind;

    use serde_json::Value;

    use crate::io::source::AssetSource;
    use crate::LoadError;

    /// In-memory stand-in for the fetch collaborator.
    #[derive(Default)]
    pub struct MemorySource {
        files: HashMap<String, Vec<u8>>,
    }

    impl MemorySource {
        pub fn new() -> MemorySource {
            MemorySource::default()
        }

        pub fn insert(&mut self, url: &str, bytes: Vec<u8>) {
            self.files.insert(url.to_owned(), bytes);
        }

        fn lookup(&self, url: &str) -> Result<&Vec<u8>, LoadError> {
            self.files.get(url).ok_or_else(|| LoadError::Fetch {
                url: url.to_owned(),
                source: std::io::Error::new(ErrorKind::NotFound, "no such entry"),
            })
        }
    }

    impl AssetSource for MemorySource {
        async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, LoadError> {
            self.lookup(url).cloned()
        }

        async fn fetch_text(&self, url: &str) -> Result<String, LoadError> {
            let bytes = self.lookup(url)?;
            String::from_utf8(bytes.clone()).map_err(|error| LoadError::Fetch {
                url: url.to_owned(),
                source: std::io::Error::new(ErrorKind::InvalidData, error),
            })
        }

        async fn fetch_json(&self, url: &str) -> Result<Value, LoadError> {
            let bytes = self.lookup(url)?;
            serde_json::from_slice(bytes).map_err(|source| LoadError::Json {
                url: url.to_owned(),
                source,
            })
        }
    }

    /// A 1x1 24-bit red BMP, the smallest image the decoder accepts.
    pub fn tiny_bmp() -> Vec<u8> {
        let mut bytes = Vec::with_capacity(58);
        bytes.extend_from_slice(b"BM");
        bytes.extend_from_slice(&58u32.to_le_bytes());
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend_from_slice(&54u32.to_le_bytes());
        bytes.extend_from_slice(&40u32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&24u16.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&2835i32.to_le_bytes());
        bytes.extend_from_slice(&2835i32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&[0, 0, 255, 0]); // BGR + row padding
        bytes
    }
}
