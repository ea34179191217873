use std::collections::HashMap;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use itertools::Itertools;
use log::debug;
use serde_json::Value;

use meshgate_files::document::reader::DocumentReader;
use meshgate_files::document::types::DocumentMaterial;
use meshgate_files::ParserError;

use crate::io::image::{CrateImageDecoder, ImageDecoder};
use crate::io::path;
use crate::io::source::AssetSource;
use crate::loader::{check_indices, color_to_vec4, fetch_textures, finalize, LoadOptions, TextureCache};
use crate::model::types::{Material, Mesh, Model, Polygon, Texture};
use crate::LoadError;

/// Loads the schema-validated plain-data format, either from a URL or from
/// an already-parsed document.
pub struct DocumentLoader {}

impl DocumentLoader {
    pub async fn load<S: AssetSource>(source: &S, file: &str, options: &LoadOptions) -> Result<Model, LoadError> {
        let document = source.fetch_json(file).await?;
        Self::load_parsed(source, &CrateImageDecoder, &document, file, options).await
    }

    /// `file` names the document for error messages and anchors relative
    /// texture references.
    pub async fn load_parsed<S: AssetSource, D: ImageDecoder>(
        source: &S,
        decoder: &D,
        document: &Value,
        file: &str,
        options: &LoadOptions,
    ) -> Result<Model, LoadError> {
        let asset = DocumentReader::parse_document(file, document)?;
        debug!(
            "Parsed {}: {} polygons, {} materials",
            file,
            asset.polygons.len(),
            asset.materials.len()
        );

        let directory = path::directory(file);
        let mut cache = TextureCache::new();
        let texture_urls = asset
            .materials
            .iter()
            .flat_map(|material| {
                Self::texture_references(material)
                    .into_iter()
                    .flatten()
                    .map(|relative| path::combine(directory, relative))
                    .collect_vec()
            })
            .collect_vec();
        fetch_textures(source, decoder, &mut cache, &texture_urls).await?;

        let mut materials: HashMap<&str, Arc<Material>> = HashMap::with_capacity(asset.materials.len());
        for material in &asset.materials {
            materials.insert(
                material.name.as_str(),
                Arc::new(Self::import_material(material, directory, &cache)),
            );
        }

        let mut mesh = Mesh::new(file_label(file));
        for (index, polygon) in asset.polygons.iter().enumerate() {
            let material = match &polygon.material_name {
                Some(name) => Some(materials.get(name.as_str()).cloned().ok_or_else(|| {
                    ParserError::InvalidReference {
                        file: file.to_owned(),
                        element: format!("polygons[{}]", index),
                        pool: "materials",
                        reason: format!("no material named '{}'", name),
                    }
                })?),
                None => None,
            };

            let imported = Polygon {
                positions: polygon.positions.iter().map(|p| Vec3::new(p.x, p.y, p.z)).collect(),
                indices: polygon.indices.clone(),
                normals: polygon
                    .normals
                    .as_ref()
                    .map(|normals| normals.iter().map(|n| Vec3::new(n.x, n.y, n.z)).collect())
                    .unwrap_or_default(),
                coordinates: polygon
                    .coordinates
                    .as_ref()
                    .map(|coordinates| coordinates.iter().map(|uv| Vec2::new(uv.x, uv.y)).collect())
                    .unwrap_or_default(),
                tints: polygon
                    .tints
                    .as_ref()
                    .map(|tints| tints.iter().map(|&tint| color_to_vec4(tint)).collect())
                    .unwrap_or_default(),
                material,
                ..Default::default()
            };

            check_indices(file, &format!("polygons[{}]", index), &imported)?;
            mesh.polygons.push(imported);
        }

        let mut model = Model::default();
        model.meshes.push(mesh);
        finalize(&mut model, options);
        Ok(model)
    }

    fn texture_references(material: &DocumentMaterial) -> [Option<&str>; 7] {
        [
            material.diffuse_map.as_deref(),
            material.normal_map.as_deref(),
            material.metalness_map.as_deref(),
            material.roughness_map.as_deref(),
            material.occlusion_map.as_deref(),
            material.emissive_map.as_deref(),
            material.height_map.as_deref(),
        ]
    }

    fn import_material(definition: &DocumentMaterial, directory: &str, cache: &TextureCache) -> Material {
        let resolve = |reference: &Option<String>| -> Option<Arc<Texture>> {
            reference
                .as_deref()
                .map(|relative| cache.get(&path::combine(directory, relative)).expect("texture was prefetched"))
        };

        Material {
            name: Some(definition.name.clone()),
            diffuse_color: definition.diffuse_color.map(color_to_vec4),
            emissive_color: definition.emissive_color.map(color_to_vec4),
            shininess: definition.shininess,
            diffuse_map: resolve(&definition.diffuse_map),
            normal_map: resolve(&definition.normal_map),
            metalness_map: resolve(&definition.metalness_map),
            roughness_map: resolve(&definition.roughness_map),
            occlusion_map: resolve(&definition.occlusion_map),
            emissive_map: resolve(&definition.emissive_map),
            height_map: resolve(&definition.height_map),
            normal_scale: definition.normal_scale,
            occlusion_strength: definition.occlusion_strength,
            height_scale: definition.height_scale,
            height_bias: definition.height_bias,
            ..Default::default()
        }
    }
}

fn file_label(file: &str) -> String {
    file.rsplit('/').next().unwrap_or(file).to_owned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::DocumentLoader;
    use crate::io::image::CrateImageDecoder;
    use crate::loader::testutil::{tiny_bmp, MemorySource};
    use crate::loader::LoadOptions;
    use crate::LoadError;

    fn sphere_slice_document() -> serde_json::Value {
        json!({
            "polygons": [ {
                "positions": [
                    { "x": 0.0, "y": 0.0, "z": 0.0 },
                    { "x": 1.0, "y": 0.0, "z": 0.0 },
                    { "x": 0.0, "y": 1.0, "z": 0.0 }
                ],
                "indices": [ { "x": 0, "y": 1, "z": 2 } ],
                "materialName": "default"
            } ],
            "materials": {
                "default": {
                    "diffuseColor": { "r": 0.8, "g": 0.8, "b": 0.8 },
                    "diffuseMap": "default.bmp"
                }
            }
        })
    }

    #[tokio::test]
    async fn loads_from_a_url() -> Result<(), anyhow::Error> {
        let mut source = MemorySource::new();
        source.insert("model/sphere.json", serde_json::to_vec(&sphere_slice_document())?);
        source.insert("model/default.bmp", tiny_bmp());

        let model = DocumentLoader::load(&source, "model/sphere.json", &LoadOptions::default()).await?;

        let polygon = &model.meshes[0].polygons[0];
        assert_eq!(polygon.positions.len(), 3);
        assert_eq!(polygon.normals.len(), 3);
        let material = polygon.material.as_ref().expect("material");
        assert_eq!(material.name.as_deref(), Some("default"));
        assert!(material.diffuse_map.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn loads_an_already_parsed_document() -> Result<(), anyhow::Error> {
        let mut source = MemorySource::new();
        source.insert("model/default.bmp", tiny_bmp());

        let document = sphere_slice_document();
        let model = DocumentLoader::load_parsed(
            &source,
            &CrateImageDecoder,
            &document,
            "model/sphere.json",
            &LoadOptions::default(),
        )
        .await?;

        assert_eq!(model.meshes[0].polygons.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_material_names_are_fatal() {
        let mut document = sphere_slice_document();
        document["polygons"][0]["materialName"] = json!("ghost");

        let mut source = MemorySource::new();
        source.insert("sphere.json", serde_json::to_vec(&document).unwrap());
        source.insert("default.bmp", tiny_bmp());

        let result = DocumentLoader::load(&source, "sphere.json", &LoadOptions::default()).await;
        assert!(matches!(
            result,
            Err(LoadError::Parser(meshgate_files::ParserError::InvalidReference { .. }))
        ));
    }

    #[tokio::test]
    async fn schema_violations_surface_with_their_path() {
        let mut document = sphere_slice_document();
        document["polygons"][0]["positions"][0]["x"] = json!("zero");

        let mut source = MemorySource::new();
        source.insert("sphere.json", serde_json::to_vec(&document).unwrap());

        match DocumentLoader::load(&source, "sphere.json", &LoadOptions::default()).await {
            Err(LoadError::Parser(meshgate_files::ParserError::SchemaViolation { path, .. })) => {
                assert_eq!(path, "polygons[0].positions[0].x");
            }
            other => panic!("expected SchemaViolation, got {:?}", other.map(|_| ())),
        }
    }
}
