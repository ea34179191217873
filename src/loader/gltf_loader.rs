use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};
use itertools::Itertools;
use log::debug;

use meshgate_files::gltf::reader::GltfReader;
use meshgate_files::gltf::types::{
    ElementKind, FilterCode, GltfDocument, GltfMaterial, GltfNodeTransform, GltfSampler, GltfTextureRef, WrapCode,
};
use meshgate_files::ParserError;

use crate::io::image::{CrateImageDecoder, ImageData, ImageDecoder};
use crate::io::path;
use crate::io::source::AssetSource;
use crate::loader::{check_indices, finalize, LoadOptions};
use crate::model::types::{Filter, Interpolation, Material, Mesh, Model, Polygon, Texture, WrapMode};
use crate::LoadError;

/// Loads the binary/JSON container format. The source node graph may be a
/// DAG; the exported model is strictly a tree, with shared nodes duplicated.
pub struct GltfLoader {}

impl GltfLoader {
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
        let (document_json, embedded) = GltfReader::split_container(&bytes, file)?;
        let document = GltfReader::parse_document(file, &document_json)?;
        debug!(
            "Parsed {}: {} nodes, {} meshes, {} materials, embedded buffer: {}",
            file,
            document.nodes.len(),
            document.meshes.len(),
            document.materials.len(),
            embedded.is_some()
        );

        let directory = path::directory(file);
        let buffers = Self::fetch_buffers(source, &document, embedded, file, directory).await?;
        let textures = Self::load_textures(source, decoder, &document, &buffers, file, directory).await?;

        let materials = document
            .materials
            .iter()
            .map(|material| Arc::new(Self::import_material(material, &textures)))
            .collect_vec();

        let meshes = (0..document.meshes.len())
            .map(|index| Self::import_mesh(file, &document, &buffers, &materials, index))
            .collect::<Result<Vec<_>, _>>()?;

        let mut built = HashMap::new();
        let mut model = Model::default();
        for &root in &document.scenes[document.scene].nodes {
            let mesh = Self::build_node(file, &document, &meshes, &mut built, root, &mut Vec::new())?;
            model.meshes.push(mesh);
        }

        finalize(&mut model, options);
        Ok(model)
    }

    /// External buffers are fetched relative to the file's own directory and
    /// awaited together; a uri-less buffer consumes the embedded chunk.
    async fn fetch_buffers<S: AssetSource>(
        source: &S,
        document: &GltfDocument,
        embedded: Option<Vec<u8>>,
        file: &str,
        directory: &str,
    ) -> Result<Vec<Vec<u8>>, LoadError> {
        let urls = document
            .buffers
            .iter()
            .map(|buffer| buffer.uri.as_deref().map(|uri| path::combine(directory, uri)))
            .collect_vec();

        let mut fetched =
            futures::future::try_join_all(urls.iter().flatten().map(|url| source.fetch_binary(url.as_str())))
                .await?
                .into_iter();

        let mut embedded = embedded;
        let mut buffers = Vec::with_capacity(document.buffers.len());
        for (index, url) in urls.iter().enumerate() {
            let bytes = match url {
                Some(_) => fetched.next().expect("one fetch per external buffer"),
                None => embedded.take().ok_or_else(|| ParserError::FormatError {
                    file: file.to_owned(),
                    reason: format!("buffers[{}] has no uri and the container provides no embedded chunk", index),
                })?,
            };
            buffers.push(bytes);
        }
        Ok(buffers)
    }

    /// Decode every image referenced through a material, once per image
    /// index, then wire sampler state onto per-texture handles.
    async fn load_textures<S: AssetSource, D: ImageDecoder>(
        source: &S,
        decoder: &D,
        document: &GltfDocument,
        buffers: &[Vec<u8>],
        file: &str,
        directory: &str,
    ) -> Result<HashMap<usize, Arc<Texture>>, LoadError> {
        let referenced = document
            .materials
            .iter()
            .flat_map(|material| {
                [
                    &material.base_color_texture,
                    &material.metallic_roughness_texture,
                    &material.normal_texture,
                    &material.occlusion_texture,
                    &material.emissive_texture,
                ]
                .into_iter()
                .flatten()
                .map(|reference| reference.texture)
                .collect_vec()
            })
            .unique()
            .collect_vec();

        let image_indices = referenced
            .iter()
            .map(|&texture| document.textures[texture].source)
            .unique()
            .collect_vec();

        let external = image_indices
            .iter()
            .filter_map(|&image| {
                document.images[image]
                    .uri
                    .as_deref()
                    .map(|uri| (image, path::combine(directory, uri)))
            })
            .collect_vec();
        let fetched =
            futures::future::try_join_all(external.iter().map(|(_, url)| source.fetch_binary(url.as_str()))).await?;

        let mut images: HashMap<usize, Arc<ImageData>> = HashMap::new();
        for ((image, url), bytes) in external.iter().zip(fetched) {
            let decoded = decoder.decode(&bytes, document.images[*image].mime_type.as_deref(), url)?;
            images.insert(*image, Arc::new(decoded));
        }

        for &image in &image_indices {
            if images.contains_key(&image) {
                continue;
            }
            // Validated during parsing: an image carries a uri or a view.
            let view = document.images[image].buffer_view.expect("image without uri has a bufferView");
            let bytes = GltfReader::view_bytes(file, document, buffers, view)?;
            let label = format!("{}#images[{}]", file, image);
            let decoded = decoder.decode(bytes, document.images[image].mime_type.as_deref(), &label)?;
            images.insert(image, Arc::new(decoded));
        }

        let mut textures = HashMap::new();
        for &index in &referenced {
            let texture = &document.textures[index];
            let filter = texture
                .sampler
                .map(|sampler| Self::import_filter(&document.samplers[sampler]))
                .unwrap_or_default();
            textures.insert(
                index,
                Arc::new(Texture {
                    image: images[&texture.source].clone(),
                    filter,
                }),
            );
        }
        Ok(textures)
    }

    fn import_filter(sampler: &GltfSampler) -> Filter {
        let magnify = match sampler.mag_filter {
            Some(FilterCode::Nearest) => Interpolation::Nearest,
            _ => Interpolation::Linear,
        };
        let (minify, mipmaps) = match sampler.min_filter {
            Some(FilterCode::Nearest) => (Interpolation::Nearest, false),
            Some(FilterCode::NearestMipmapNearest) | Some(FilterCode::NearestMipmapLinear) => {
                (Interpolation::Nearest, true)
            }
            Some(FilterCode::LinearMipmapNearest) | Some(FilterCode::LinearMipmapLinear) => {
                (Interpolation::Linear, true)
            }
            Some(FilterCode::Linear) | None => (Interpolation::Linear, false),
        };
        let wrap = match sampler.wrap {
            Some(WrapCode::ClampToEdge) => WrapMode::ClampToEdge,
            Some(WrapCode::MirroredRepeat) => WrapMode::MirroredRepeat,
            _ => WrapMode::Repeat,
        };
        Filter {
            magnify,
            minify,
            mipmaps,
            wrap,
        }
    }

    fn import_material(material: &GltfMaterial, textures: &HashMap<usize, Arc<Texture>>) -> Material {
        let resolve =
            |reference: &Option<GltfTextureRef>| reference.as_ref().map(|reference| textures[&reference.texture].clone());

        Material {
            name: material.name.clone(),
            diffuse_color: Some(Vec4::from(material.base_color_factor)),
            emissive_color: Some(Vec4::new(
                material.emissive_factor[0],
                material.emissive_factor[1],
                material.emissive_factor[2],
                1.0,
            )),
            metalness: Some(material.metallic_factor),
            roughness: Some(material.roughness_factor),
            diffuse_map: resolve(&material.base_color_texture),
            // One combined map feeds both channels.
            metalness_map: resolve(&material.metallic_roughness_texture),
            roughness_map: resolve(&material.metallic_roughness_texture),
            normal_map: resolve(&material.normal_texture),
            occlusion_map: resolve(&material.occlusion_texture),
            emissive_map: resolve(&material.emissive_texture),
            normal_scale: material.normal_texture.as_ref().and_then(|reference| reference.factor),
            occlusion_strength: material.occlusion_texture.as_ref().and_then(|reference| reference.factor),
            ..Default::default()
        }
    }

    /// Expand one document mesh into polygon groups, one per primitive.
    fn import_mesh(
        file: &str,
        document: &GltfDocument,
        buffers: &[Vec<u8>],
        materials: &[Arc<Material>],
        mesh_index: usize,
    ) -> Result<Vec<Polygon>, LoadError> {
        let mut polygons = Vec::new();
        for primitive in &document.meshes[mesh_index].primitives {
            Self::expect_kind(file, document, primitive.positions, &[ElementKind::Vec3], "POSITION")?;
            let positions = Self::group_vec3(&GltfReader::expand_accessor(file, document, buffers, primitive.positions)?);

            let flat_indices = GltfReader::expand_indices(file, document, buffers, primitive.indices)?;
            if flat_indices.len() % 3 != 0 {
                return Err(ParserError::FormatError {
                    file: file.to_owned(),
                    reason: format!(
                        "accessors[{}]: {} indices do not form whole triangles",
                        primitive.indices,
                        flat_indices.len()
                    ),
                }
                .into());
            }
            let indices = flat_indices
                .chunks_exact(3)
                .map(|triangle| [triangle[0], triangle[1], triangle[2]])
                .collect_vec();

            let mut polygon = Polygon {
                positions,
                indices,
                material: primitive.material.map(|index| materials[index].clone()),
                ..Default::default()
            };

            if let Some(accessor) = primitive.normals {
                Self::expect_kind(file, document, accessor, &[ElementKind::Vec3], "NORMAL")?;
                polygon.normals = Self::group_vec3(&GltfReader::expand_accessor(file, document, buffers, accessor)?);
            }
            if let Some(accessor) = primitive.tangents {
                let kind = Self::expect_kind(
                    file,
                    document,
                    accessor,
                    &[ElementKind::Vec3, ElementKind::Vec4],
                    "TANGENT",
                )?;
                let values = GltfReader::expand_accessor(file, document, buffers, accessor)?;
                // A fourth component only carries handedness; the tangent is xyz.
                polygon.tangents = values
                    .chunks_exact(kind.arity())
                    .map(|tangent| Vec3::new(tangent[0], tangent[1], tangent[2]))
                    .collect();
            }
            if let Some(accessor) = primitive.coordinates {
                Self::expect_kind(file, document, accessor, &[ElementKind::Vec2], "TEXCOORD_0")?;
                let values = GltfReader::expand_accessor(file, document, buffers, accessor)?;
                polygon.coordinates = values.chunks_exact(2).map(|uv| Vec2::new(uv[0], uv[1])).collect();
            }
            if let Some(accessor) = primitive.tints {
                let kind = Self::expect_kind(
                    file,
                    document,
                    accessor,
                    &[ElementKind::Vec3, ElementKind::Vec4],
                    "COLOR_0",
                )?;
                let values = GltfReader::expand_accessor(file, document, buffers, accessor)?;
                polygon.tints = values
                    .chunks_exact(kind.arity())
                    .map(|tint| match kind {
                        ElementKind::Vec3 => Vec4::new(tint[0], tint[1], tint[2], 1.0),
                        _ => Vec4::new(tint[0], tint[1], tint[2], tint[3]),
                    })
                    .collect();
            }

            check_indices(file, &format!("meshes[{}]", mesh_index), &polygon)?;
            polygons.push(polygon);
        }
        Ok(polygons)
    }

    fn expect_kind(
        file: &str,
        document: &GltfDocument,
        accessor: usize,
        allowed: &[ElementKind],
        attribute: &str,
    ) -> Result<ElementKind, LoadError> {
        let kind = document.accessors[accessor].kind;
        if !allowed.contains(&kind) {
            return Err(ParserError::FormatError {
                file: file.to_owned(),
                reason: format!("accessors[{}]: {} attribute has element kind {:?}", accessor, attribute, kind),
            }
            .into());
        }
        Ok(kind)
    }

    fn group_vec3(values: &[f32]) -> Vec<Vec3> {
        values
            .chunks_exact(3)
            .map(|value| Vec3::new(value[0], value[1], value[2]))
            .collect()
    }

    /// Resolve one node into an owned subtree. Shared nodes come back out of
    /// the index-keyed cache as fresh clones, so a diamond in the source
    /// graph turns into duplicated tree nodes. A cycle is fatal.
    fn build_node(
        file: &str,
        document: &GltfDocument,
        meshes: &[Vec<Polygon>],
        built: &mut HashMap<usize, Mesh>,
        index: usize,
        visiting: &mut Vec<usize>,
    ) -> Result<Mesh, LoadError> {
        if let Some(mesh) = built.get(&index) {
            return Ok(mesh.clone());
        }
        if visiting.contains(&index) {
            return Err(ParserError::InvalidReference {
                file: file.to_owned(),
                element: format!("nodes[{}]", index),
                pool: "nodes",
                reason: "the node graph contains a cycle".to_owned(),
            }
            .into());
        }

        visiting.push(index);
        let node = &document.nodes[index];

        let mut mesh = Mesh::new(node.name.clone().unwrap_or_default());
        mesh.transform = Self::node_transform(&node.transform);
        if let Some(mesh_index) = node.mesh {
            mesh.polygons = meshes[mesh_index].clone();
        }
        for &child in &node.children {
            let subtree = Self::build_node(file, document, meshes, built, child, visiting)?;
            mesh.children.push(subtree);
        }
        visiting.pop();

        built.insert(index, mesh.clone());
        Ok(mesh)
    }

    /// Local transform: the explicit column-major matrix, or
    /// translate ∘ rotate(axis, angle) ∘ scale in that fixed order.
    fn node_transform(transform: &GltfNodeTransform) -> Mat4 {
        match transform {
            GltfNodeTransform::Matrix(values) => Mat4::from_cols_array(values),
            GltfNodeTransform::Composed {
                translation,
                rotation,
                scale,
            } => {
                let translation = Mat4::from_translation(translation.map(Vec3::from).unwrap_or(Vec3::ZERO));
                let rotation = match rotation {
                    Some([x, y, z, angle]) => match Vec3::new(*x, *y, *z).try_normalize() {
                        Some(axis) => Mat4::from_axis_angle(axis, *angle),
                        None => Mat4::IDENTITY,
                    },
                    None => Mat4::IDENTITY,
                };
                let scale = Mat4::from_scale(scale.map(Vec3::from).unwrap_or(Vec3::ONE));
                translation * rotation * scale
            }
        }
    }
}
