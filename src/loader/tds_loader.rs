use std::collections::HashMap;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use itertools::Itertools;
use log::{debug, warn};

use meshgate_files::tds::reader::TdsReader;
use meshgate_files::ParserError;

use crate::io::image::{CrateImageDecoder, ImageDecoder};
use crate::io::path;
use crate::io::source::AssetSource;
use crate::loader::{check_indices, color_to_vec4, fetch_textures, finalize, LoadOptions, TextureCache};
use crate::model::types::{Material, Mesh, Model, Polygon};
use crate::LoadError;

/// Loads the chunked binary format: one mesh node per object, a name-keyed
/// material table resolved onto the polygons.
pub struct TdsLoader {}

impl TdsLoader {
    pub async fn load<S: AssetSource>(source: &S, file: &str, options: &LoadOptions) -> Result<Model, LoadError> {
        Self::load_with(source, &CrateImageDecoder, file, options).await
    }

    pub async fn load_with<S: AssetSource, D: ImageDecoder>(
        source: &S,
        decoder: &D,
        file: &str,
        options: &LoadOptions,
    ) -> Result<Model, LoadError> {
        let bytes = source.fetch_binary(file).await?;
        let asset = TdsReader::parse_asset(&bytes, file)?;
        debug!(
            "Parsed {}: {} objects, {} materials",
            file,
            asset.objects.len(),
            asset.materials.len()
        );

        let directory = path::directory(file);
        let mut cache = TextureCache::new();
        let texture_urls = asset
            .materials
            .iter()
            .filter_map(|material| material.texture_path.as_deref())
            .map(|relative| path::combine(directory, relative))
            .collect_vec();
        fetch_textures(source, decoder, &mut cache, &texture_urls).await?;

        let mut materials: HashMap<&str, Arc<Material>> = HashMap::with_capacity(asset.materials.len());
        for material in &asset.materials {
            let diffuse_map = material
                .texture_path
                .as_deref()
                .map(|relative| cache.get(&path::combine(directory, relative)).expect("texture was prefetched"));

            materials.insert(
                material.name.as_str(),
                Arc::new(Material {
                    name: Some(material.name.clone()),
                    diffuse_color: material.diffuse.map(color_to_vec4),
                    shininess: material.shininess,
                    diffuse_map,
                    ..Default::default()
                }),
            );
        }

        let mut model = Model::default();
        for object in &asset.objects {
            let material = match &object.material_name {
                Some(name) => Some(materials.get(name.as_str()).cloned().ok_or_else(|| {
                    ParserError::InvalidReference {
                        file: file.to_owned(),
                        element: format!("object '{}'", object.name),
                        pool: "materials",
                        reason: format!("no material named '{}'", name),
                    }
                })?),
                None => None,
            };

            let mut polygon = Polygon {
                positions: object
                    .vertices
                    .iter()
                    .map(|vertex| Vec3::new(vertex.x, vertex.y, vertex.z))
                    .collect(),
                indices: object
                    .faces
                    .iter()
                    .map(|&[a, b, c]| [a as u32, b as u32, c as u32])
                    .collect(),
                material,
                ..Default::default()
            };

            if !object.uvs.is_empty() {
                if object.uvs.len() == object.vertices.len() {
                    polygon.coordinates = object.uvs.iter().map(|uv| Vec2::new(uv.x, uv.y)).collect();
                } else {
                    warn!(
                        "{}: object '{}' has {} UVs for {} vertices, dropping the UV list",
                        file,
                        object.name,
                        object.uvs.len(),
                        object.vertices.len()
                    );
                }
            }

            check_indices(file, &format!("object '{}'", object.name), &polygon)?;

            let mut mesh = Mesh::new(object.name.clone());
            mesh.polygons.push(polygon);
            model.meshes.push(mesh);
        }

        finalize(&mut model, options);
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::TdsLoader;
    use crate::loader::testutil::{tiny_bmp, MemorySource};
    use crate::loader::LoadOptions;
    use crate::LoadError;

    fn chunk(tag: u16, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(6 + body.len());
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&((6 + body.len()) as u32).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    /// Root -> edit -> object "Box" -> trimesh with a unit quad.
    fn quad_file(material: Option<&str>) -> Vec<u8> {
        let mut vertices = 4u16.to_le_bytes().to_vec();
        for vertex in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]] {
            for component in vertex {
                vertices.extend_from_slice(&component.to_le_bytes());
            }
        }

        let mut faces = 2u16.to_le_bytes().to_vec();
        for face in [[0u16, 1, 2], [0, 2, 3]] {
            for index in face {
                faces.extend_from_slice(&index.to_le_bytes());
            }
            faces.extend_from_slice(&0u16.to_le_bytes());
        }
        if let Some(name) = material {
            let mut assignment = name.as_bytes().to_vec();
            assignment.push(0);
            assignment.extend_from_slice(&0u16.to_le_bytes());
            faces.extend_from_slice(&chunk(0x4130, &assignment));
        }

        let mut trimesh_body = chunk(0x4110, &vertices);
        trimesh_body.extend_from_slice(&chunk(0x4120, &faces));

        let mut object_body = b"Box\0".to_vec();
        object_body.extend_from_slice(&chunk(0x4100, &trimesh_body));

        let mut edit_body = chunk(0x4000, &object_body);
        if let Some(name) = material {
            let mut material_name = name.as_bytes().to_vec();
            material_name.push(0);
            let mut material_body = chunk(0xA000, &material_name);
            material_body.extend_from_slice(&chunk(0xA020, &chunk(0x0011, &[200, 30, 30])));
            material_body.extend_from_slice(&chunk(0xA200, &chunk(0xA300, b"red.bmp\0")));
            edit_body.extend_from_slice(&chunk(0xAFFF, &material_body));
        }

        chunk(0x4D4D, &chunk(0x3D3D, &edit_body))
    }

    #[tokio::test]
    async fn loads_a_quad_and_derives_normals() -> Result<(), anyhow::Error> {
        let mut source = MemorySource::new();
        source.insert("model/box.3ds", quad_file(None));

        let model = TdsLoader::load(&source, "model/box.3ds", &LoadOptions::default()).await?;

        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.name, "Box");
        assert_eq!(mesh.polygons.len(), 1);

        let polygon = &mesh.polygons[0];
        assert_eq!(polygon.positions.len(), 4);
        assert_eq!(polygon.indices.len(), 2);
        assert_eq!(polygon.normals.len(), 4);
        for normal in &polygon.normals {
            assert!((*normal - Vec3::Z).length() < 1e-6, "normal: {normal}");
        }

        Ok(())
    }

    #[tokio::test]
    async fn resolves_materials_and_textures_by_name() -> Result<(), anyhow::Error> {
        let mut source = MemorySource::new();
        source.insert("model/box.3ds", quad_file(Some("Red")));
        source.insert("model/red.bmp", tiny_bmp());

        let model = TdsLoader::load(&source, "model/box.3ds", &LoadOptions::default()).await?;

        let material = model.meshes[0].polygons[0].material.as_ref().expect("material");
        assert_eq!(material.name.as_deref(), Some("Red"));
        let diffuse = material.diffuse_color.expect("diffuse color");
        assert!((diffuse.x - 200.0 / 255.0).abs() < 1e-6);

        let texture = material.diffuse_map.as_ref().expect("diffuse map");
        assert_eq!(texture.image.width, 1);
        assert_eq!(texture.image.pixels, vec![255, 0, 0, 255]);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_material_name_is_fatal() {
        // An object binding a material name while the file defines no materials.
        let mut faces = 1u16.to_le_bytes().to_vec();
        for index in [0u16, 1, 2] {
            faces.extend_from_slice(&index.to_le_bytes());
        }
        faces.extend_from_slice(&0u16.to_le_bytes());
        let mut assignment = b"Ghost\0".to_vec();
        assignment.extend_from_slice(&0u16.to_le_bytes());
        faces.extend_from_slice(&chunk(0x4130, &assignment));

        let mut vertices = 3u16.to_le_bytes().to_vec();
        for vertex in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for component in vertex {
                vertices.extend_from_slice(&component.to_le_bytes());
            }
        }

        let mut trimesh_body = chunk(0x4110, &vertices);
        trimesh_body.extend_from_slice(&chunk(0x4120, &faces));
        let mut object_body = b"Box\0".to_vec();
        object_body.extend_from_slice(&chunk(0x4100, &trimesh_body));
        let data = chunk(0x4D4D, &chunk(0x3D3D, &chunk(0x4000, &object_body)));

        let mut source = MemorySource::new();
        source.insert("box.3ds", data);

        let result = TdsLoader::load(&source, "box.3ds", &LoadOptions::default()).await;
        assert!(matches!(
            result,
            Err(LoadError::Parser(meshgate_files::ParserError::InvalidReference { .. }))
        ));
    }

    #[tokio::test]
    async fn applies_the_root_transform() -> Result<(), anyhow::Error> {
        let mut source = MemorySource::new();
        source.insert("box.3ds", quad_file(None));

        let options = LoadOptions {
            transform: Some(glam::Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0))),
            ..Default::default()
        };
        let model = TdsLoader::load(&source, "box.3ds", &options).await?;

        // The transform lands on the root mesh, not in the vertex data.
        assert_eq!(model.meshes[0].polygons[0].positions[0], Vec3::ZERO);
        let translated = model.meshes[0].transform.transform_point3(Vec3::ZERO);
        assert_eq!(translated, Vec3::new(0.0, 0.0, 3.0));

        Ok(())
    }
}
