use std::collections::HashMap;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use itertools::Itertools;
use log::debug;

use meshgate_files::obj::reader::ObjReader;
use meshgate_files::obj::types::MtlMaterial;
use meshgate_files::ParserError;

use crate::io::image::{CrateImageDecoder, ImageDecoder};
use crate::io::path;
use crate::io::source::AssetSource;
use crate::loader::{color_to_vec4, fetch_textures, finalize, LoadOptions, TextureCache};
use crate::model::types::{Material, Mesh, Model, Polygon, Texture};
use crate::LoadError;

/// Loads the text-based geometry format plus its companion material
/// libraries. Produces one root mesh whose polygons are the contiguous
/// material-binding groups.
pub struct ObjLoader {}

impl ObjLoader {
    pub async fn load<S: AssetSource>(source: &S, file: &str, options: &LoadOptions) -> Result<Model, LoadError> {
        Self::load_with(source, &CrateImageDecoder, file, options).await
    }

    pub async fn load_with<S: AssetSource, D: ImageDecoder>(
        source: &S,
        decoder: &D,
        file: &str,
        options: &LoadOptions,
    ) -> Result<Model, LoadError> {
        let text = source.fetch_text(file).await?;
        let asset = ObjReader::parse_geometry(&text, file, options.object_filter.as_deref())?;
        debug!(
            "Parsed {}: {} groups, {} material libraries",
            file,
            asset.groups.len(),
            asset.material_libraries.len()
        );

        let directory = path::directory(file);

        // Library paths come out of directives, so these fetches are
        // sequenced; later definitions override earlier ones.
        let mut definitions: HashMap<String, (MtlMaterial, String)> = HashMap::new();
        for library in &asset.material_libraries {
            let library_url = path::combine(directory, library);
            let library_text = source.fetch_text(&library_url).await?;
            let library_directory = path::directory(&library_url).to_owned();
            for material in ObjReader::parse_material_library(&library_text, &library_url)? {
                definitions.insert(material.name.clone(), (material, library_directory.clone()));
            }
        }

        // Texture paths resolve against the library that referenced them.
        let mut cache = TextureCache::new();
        let texture_urls = definitions
            .values()
            .flat_map(|(material, library_directory)| {
                [
                    material.diffuse_map.as_deref(),
                    material.emissive_map.as_deref(),
                    material.normal_map.as_deref(),
                    material.height_map.as_deref(),
                ]
                .into_iter()
                .flatten()
                .map(|relative| path::combine(library_directory, relative))
                .collect_vec()
            })
            .collect_vec();
        fetch_textures(source, decoder, &mut cache, &texture_urls).await?;

        let mut materials: HashMap<&str, Arc<Material>> = HashMap::with_capacity(definitions.len());
        for (name, (definition, library_directory)) in &definitions {
            materials.insert(
                name.as_str(),
                Arc::new(Self::import_material(definition, library_directory, &cache)),
            );
        }

        let mut mesh = Mesh::new(file_stem(file));
        for group in &asset.groups {
            let material = match &group.material {
                Some(name) => Some(materials.get(name.as_str()).cloned().ok_or_else(|| {
                    ParserError::InvalidReference {
                        file: file.to_owned(),
                        element: format!("material binding '{}'", name),
                        pool: "materials",
                        reason: format!("no library defines '{}'", name),
                    }
                })?),
                None => None,
            };

            mesh.polygons.push(Polygon {
                positions: group.positions.iter().map(|p| Vec3::new(p.x, p.y, p.z)).collect(),
                normals: group.normals.iter().map(|n| Vec3::new(n.x, n.y, n.z)).collect(),
                coordinates: group.coordinates.iter().map(|uv| Vec2::new(uv.x, uv.y)).collect(),
                indices: group.triangles.clone(),
                material,
                ..Default::default()
            });
        }

        let mut model = Model::default();
        model.meshes.push(mesh);
        finalize(&mut model, options);
        Ok(model)
    }

    fn import_material(definition: &MtlMaterial, library_directory: &str, cache: &TextureCache) -> Material {
        let resolve = |reference: &Option<String>| -> Option<Arc<Texture>> {
            reference
                .as_deref()
                .map(|relative| cache.get(&path::combine(library_directory, relative)).expect("texture was prefetched"))
        };

        Material {
            name: Some(definition.name.clone()),
            diffuse_color: definition.diffuse.map(color_to_vec4),
            emissive_color: definition.emissive.map(color_to_vec4),
            shininess: definition.shininess,
            diffuse_map: resolve(&definition.diffuse_map),
            emissive_map: resolve(&definition.emissive_map),
            normal_map: resolve(&definition.normal_map),
            height_map: resolve(&definition.height_map),
            ..Default::default()
        }
    }
}

fn file_stem(file: &str) -> String {
    let name = file.rsplit('/').next().unwrap_or(file);
    name.rsplit_once('.').map(|(stem, _)| stem.to_owned()).unwrap_or_else(|| name.to_owned())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec3;

    use super::ObjLoader;
    use crate::loader::testutil::{tiny_bmp, MemorySource};
    use crate::loader::LoadOptions;
    use crate::LoadError;

    fn scene_source() -> MemorySource {
        let mut source = MemorySource::new();
        source.insert(
            "model/scene.obj",
            b"\
mtllib scene.mtl
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
usemtl Red
f 1 2 3
usemtl Red
f 2 4 3
"
            .to_vec(),
        );
        source.insert(
            "model/scene.mtl",
            b"\
newmtl Red
Kd 1 0 0
map_Kd tex/red.bmp
"
            .to_vec(),
        );
        source.insert("model/tex/red.bmp", tiny_bmp());
        source
    }

    #[tokio::test]
    async fn distinct_groups_share_one_material_by_identity() -> Result<(), anyhow::Error> {
        let source = scene_source();
        let model = ObjLoader::load(&source, "model/scene.obj", &LoadOptions::default()).await?;

        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.name, "scene");
        assert_eq!(mesh.polygons.len(), 2);

        let first = mesh.polygons[0].material.as_ref().expect("first material");
        let second = mesh.polygons[1].material.as_ref().expect("second material");
        assert!(Arc::ptr_eq(first, second));

        // The texture path resolved against the library's own directory.
        assert_eq!(first.diffuse_map.as_ref().expect("map").image.width, 1);

        Ok(())
    }

    #[tokio::test]
    async fn derives_normals_for_plain_faces() -> Result<(), anyhow::Error> {
        let mut source = MemorySource::new();
        source.insert("tri.obj", b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n".to_vec());

        let model = ObjLoader::load(&source, "tri.obj", &LoadOptions::default()).await?;
        let polygon = &model.meshes[0].polygons[0];
        assert_eq!(polygon.normals.len(), 3);
        assert!((polygon.normals[0] - Vec3::Z).length() < 1e-6);

        Ok(())
    }

    #[tokio::test]
    async fn object_filter_restricts_the_output() -> Result<(), anyhow::Error> {
        let mut source = MemorySource::new();
        source.insert(
            "two.obj",
            b"\
o First
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o Second
v 0 0 1
v 1 0 1
v 0 1 1
f 4 5 6
"
            .to_vec(),
        );

        let options = LoadOptions {
            object_filter: Some("Second".to_owned()),
            ..Default::default()
        };
        let model = ObjLoader::load(&source, "two.obj", &options).await?;

        let mesh = &model.meshes[0];
        assert_eq!(mesh.polygons.len(), 1);
        assert_eq!(mesh.polygons[0].positions[0].z, 1.0);

        Ok(())
    }

    #[tokio::test]
    async fn binding_an_undefined_material_is_fatal() {
        let mut source = MemorySource::new();
        source.insert("bad.obj", b"v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl Ghost\nf 1 2 3\n".to_vec());

        let result = ObjLoader::load(&source, "bad.obj", &LoadOptions::default()).await;
        assert!(matches!(
            result,
            Err(LoadError::Parser(meshgate_files::ParserError::InvalidReference { .. }))
        ));
    }

    #[tokio::test]
    async fn errors_inside_the_library_name_the_library_file() {
        let mut source = MemorySource::new();
        source.insert("scene.obj", b"mtllib scene.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n".to_vec());
        source.insert("scene.mtl", b"newmtl Red\nglitter 1\n".to_vec());

        match ObjLoader::load(&source, "scene.obj", &LoadOptions::default()).await {
            Err(LoadError::Parser(meshgate_files::ParserError::UnrecognizedDirective { file, line, .. })) => {
                assert_eq!(file, "scene.mtl");
                assert_eq!(line, 2);
            }
            other => panic!("expected UnrecognizedDirective, got {:?}", other.map(|_| ())),
        }
    }
}
