use byteorder::{ByteOrder, LittleEndian};
use serde_json::Value;

use crate::common::cursor::{ByteCursor, Endian};
use crate::common::schema::Node;
use crate::gltf::types::{
    ComponentType, ElementKind, FilterCode, GltfAccessor, GltfBuffer, GltfBufferView, GltfDocument, GltfImage,
    GltfMaterial, GltfMesh, GltfNode, GltfNodeTransform, GltfPrimitive, GltfSampler, GltfScene, GltfTexture,
    GltfTextureRef, WrapCode, CHUNK_TYPE_BINARY, CHUNK_TYPE_JSON, CONTAINER_MAGIC, CONTAINER_VERSION,
    SUPPORTED_ASSET_VERSION,
};
use crate::ParserError;

pub struct GltfReader {}

impl GltfReader {
    /// Sniff the physical encoding: a document starting with `{` is raw JSON,
    /// anything else must be the binary container (magic, version, one JSON
    /// chunk, optionally one binary chunk holding the embedded buffer).
    pub fn split_container(data: &[u8], file: &str) -> Result<(Value, Option<Vec<u8>>), ParserError> {
        if data.first() == Some(&b'{') {
            return Ok((Self::parse_json(data, file)?, None));
        }

        let mut cursor = ByteCursor::new(data, Endian::Little, file);
        let magic = cursor.read_bytes(4)?;
        if magic != CONTAINER_MAGIC {
            return Err(ParserError::MalformedContainer {
                file: file.to_owned(),
                reason: "wrong magic value".to_owned(),
            });
        }

        let version = cursor.read_u32()?;
        if version != CONTAINER_VERSION {
            return Err(ParserError::MalformedContainer {
                file: file.to_owned(),
                reason: format!("unsupported container version {}", version),
            });
        }

        let total_length = cursor.read_u32()? as usize;
        if total_length != data.len() {
            return Err(ParserError::MalformedContainer {
                file: file.to_owned(),
                reason: format!("declared length {} does not match file size {}", total_length, data.len()),
            });
        }

        let (json_type, json_payload) = Self::read_container_chunk(&mut cursor)?;
        if json_type != CHUNK_TYPE_JSON {
            return Err(ParserError::MalformedContainer {
                file: file.to_owned(),
                reason: "first chunk is not the JSON chunk".to_owned(),
            });
        }
        let document = Self::parse_json(json_payload, file)?;

        let embedded = if cursor.remaining() > 0 {
            let (binary_type, payload) = Self::read_container_chunk(&mut cursor)?;
            if binary_type != CHUNK_TYPE_BINARY {
                return Err(ParserError::MalformedContainer {
                    file: file.to_owned(),
                    reason: "second chunk is not the binary chunk".to_owned(),
                });
            }
            Some(payload.to_vec())
        } else {
            None
        };

        if cursor.remaining() > 0 {
            return Err(ParserError::MalformedContainer {
                file: file.to_owned(),
                reason: "trailing data after the binary chunk".to_owned(),
            });
        }

        Ok((document, embedded))
    }

    fn parse_json(data: &[u8], file: &str) -> Result<Value, ParserError> {
        serde_json::from_slice(data).map_err(|error| ParserError::MalformedContainer {
            file: file.to_owned(),
            reason: format!("invalid JSON document: {}", error),
        })
    }

    fn read_container_chunk<'a>(cursor: &mut ByteCursor<'a>) -> Result<(u32, &'a [u8]), ParserError> {
        let length = cursor.read_u32()? as usize;
        let chunk_type = cursor.read_u32()?;
        let payload = cursor.read_bytes(length)?;
        Ok((chunk_type, payload))
    }

    /// Resolve the logical schema: buffers, then views, accessors, images,
    /// samplers, textures, materials, meshes, nodes, scenes. Later pools
    /// reference earlier ones by index; every reference is validated here so
    /// consumers can index the document without further checks.
    pub fn parse_document(file: &str, document: &Value) -> Result<GltfDocument, ParserError> {
        let root = Node::root(file, document);

        let asset_version = root.member("asset")?.member("version")?.expect_string()?;
        if asset_version != SUPPORTED_ASSET_VERSION {
            return Err(ParserError::MalformedContainer {
                file: file.to_owned(),
                reason: format!("unsupported asset version '{}'", asset_version),
            });
        }

        let buffers = Self::parse_pool(&root, "buffers", |node| {
            Ok(GltfBuffer {
                uri: node.optional("uri").map(|uri| uri.expect_string().map(str::to_owned)).transpose()?,
                byte_length: node.member("byteLength")?.expect_usize()?,
            })
        })?;

        let buffer_views = Self::parse_pool(&root, "bufferViews", |node| {
            let view = GltfBufferView {
                buffer: node.member("buffer")?.expect_usize()?,
                byte_offset: Self::optional_usize(node, "byteOffset")?.unwrap_or(0),
                byte_length: node.member("byteLength")?.expect_usize()?,
                byte_stride: Self::optional_usize(node, "byteStride")?,
            };

            let buffer = Self::checked_index(file, node.path(), "buffers", view.buffer, buffers.len())?;
            let available = buffers[buffer].byte_length;
            if view.byte_offset + view.byte_length > available {
                return Err(ParserError::InvalidReference {
                    file: file.to_owned(),
                    element: node.path().to_owned(),
                    pool: "buffers",
                    reason: format!(
                        "needs {} bytes but buffers[{}] holds {}",
                        view.byte_offset + view.byte_length,
                        view.buffer,
                        available
                    ),
                });
            }
            Ok(view)
        })?;

        let accessors = Self::parse_pool(&root, "accessors", |node| {
            if node.optional("sparse").is_some() {
                return Err(node.member("sparse")?.violation("no sparse storage (unsupported)"));
            }

            let component_tag = node.member("componentType")?;
            let component_type = ComponentType::try_from(component_tag.expect_u32()?)
                .map_err(|_| component_tag.violation("a supported component type"))?;

            let kind_tag = node.member("type")?;
            let kind = ElementKind::from_tag(kind_tag.expect_string()?)
                .ok_or_else(|| kind_tag.violation("one of SCALAR, VEC2, VEC3, VEC4"))?;

            let count_node = node.member("count")?;
            let count = count_node.expect_usize()?;
            if count == 0 {
                return Err(count_node.violation("a positive element count"));
            }

            let accessor = GltfAccessor {
                buffer_view: node.member("bufferView")?.expect_usize()?,
                byte_offset: Self::optional_usize(node, "byteOffset")?.unwrap_or(0),
                component_type,
                normalized: match node.optional("normalized") {
                    Some(flag) => flag.expect_bool()?,
                    None => false,
                },
                count,
                kind,
            };

            let view_index =
                Self::checked_index(file, node.path(), "bufferViews", accessor.buffer_view, buffer_views.len())?;
            let view = &buffer_views[view_index];
            let element_size = accessor.element_size();
            if let Some(stride) = view.byte_stride {
                if stride < element_size {
                    return Err(node.violation(format!(
                        "an element size of at most the view stride {}",
                        stride
                    )));
                }
            }

            let stride = view.byte_stride.unwrap_or(element_size);
            let needed = accessor.byte_offset + stride * (accessor.count - 1) + element_size;
            if needed > view.byte_length {
                return Err(ParserError::InvalidReference {
                    file: file.to_owned(),
                    element: node.path().to_owned(),
                    pool: "bufferViews",
                    reason: format!(
                        "requires {} bytes but bufferViews[{}] holds {} ({} bytes short)",
                        needed,
                        accessor.buffer_view,
                        view.byte_length,
                        needed - view.byte_length
                    ),
                });
            }
            Ok(accessor)
        })?;

        let images = Self::parse_pool(&root, "images", |node| {
            let image = GltfImage {
                uri: node.optional("uri").map(|uri| uri.expect_string().map(str::to_owned)).transpose()?,
                buffer_view: Self::optional_usize(node, "bufferView")?,
                mime_type: node
                    .optional("mimeType")
                    .map(|mime| mime.expect_string().map(str::to_owned))
                    .transpose()?,
            };
            if image.uri.is_none() && image.buffer_view.is_none() {
                return Err(node.violation("either a uri or a bufferView"));
            }
            if let Some(view) = image.buffer_view {
                Self::checked_index(file, node.path(), "bufferViews", view, buffer_views.len())?;
            }
            Ok(image)
        })?;

        let samplers = Self::parse_pool(&root, "samplers", |node| {
            Ok(GltfSampler {
                mag_filter: Self::optional_code::<FilterCode>(node, "magFilter", "a supported filter code")?,
                min_filter: Self::optional_code::<FilterCode>(node, "minFilter", "a supported filter code")?,
                wrap: Self::optional_code::<WrapCode>(node, "wrapS", "a supported wrap code")?,
            })
        })?;

        let textures = Self::parse_pool(&root, "textures", |node| {
            let texture = GltfTexture {
                sampler: Self::optional_usize(node, "sampler")?,
                source: node.member("source")?.expect_usize()?,
            };
            Self::checked_index(file, node.path(), "images", texture.source, images.len())?;
            if let Some(sampler) = texture.sampler {
                Self::checked_index(file, node.path(), "samplers", sampler, samplers.len())?;
            }
            Ok(texture)
        })?;

        let materials = Self::parse_pool(&root, "materials", |node| {
            let pbr = node.optional("pbrMetallicRoughness");

            let mut base_color_factor = [1.0, 1.0, 1.0, 1.0];
            let mut metallic_factor = 1.0;
            let mut roughness_factor = 1.0;
            let mut base_color_texture = None;
            let mut metallic_roughness_texture = None;
            if let Some(pbr) = &pbr {
                if let Some(factor) = pbr.optional("baseColorFactor") {
                    base_color_factor = factor.expect_f32s::<4>()?;
                }
                if let Some(factor) = pbr.optional("metallicFactor") {
                    metallic_factor = factor.expect_f32()?;
                }
                if let Some(factor) = pbr.optional("roughnessFactor") {
                    roughness_factor = factor.expect_f32()?;
                }
                base_color_texture = Self::optional_texture_ref(file, pbr, "baseColorTexture", None, textures.len())?;
                metallic_roughness_texture =
                    Self::optional_texture_ref(file, pbr, "metallicRoughnessTexture", None, textures.len())?;
            }

            let emissive_factor = match node.optional("emissiveFactor") {
                Some(factor) => factor.expect_f32s::<3>()?,
                None => [0.0, 0.0, 0.0],
            };

            Ok(GltfMaterial {
                name: node.optional("name").map(|name| name.expect_string().map(str::to_owned)).transpose()?,
                base_color_factor,
                emissive_factor,
                metallic_factor,
                roughness_factor,
                base_color_texture,
                metallic_roughness_texture,
                normal_texture: Self::optional_texture_ref(file, node, "normalTexture", Some("scale"), textures.len())?,
                occlusion_texture: Self::optional_texture_ref(
                    file,
                    node,
                    "occlusionTexture",
                    Some("strength"),
                    textures.len(),
                )?,
                emissive_texture: Self::optional_texture_ref(file, node, "emissiveTexture", None, textures.len())?,
            })
        })?;

        let meshes = Self::parse_pool(&root, "meshes", |node| {
            let primitives = node
                .member("primitives")?
                .elements()?
                .iter()
                .map(|primitive| {
                    let attributes = primitive.member("attributes")?;
                    let accessor_index = |key: &str| -> Result<Option<usize>, ParserError> {
                        match attributes.optional(key) {
                            Some(attr) => {
                                let index = attr.expect_usize()?;
                                Self::checked_index(file, attr.path(), "accessors", index, accessors.len())?;
                                Ok(Some(index))
                            }
                            None => Ok(None),
                        }
                    };

                    let positions = accessor_index("POSITION")?
                        .ok_or_else(|| attributes.violation("a POSITION attribute"))?;

                    let indices_node = primitive.member("indices")?;
                    let indices = indices_node.expect_usize()?;
                    Self::checked_index(file, indices_node.path(), "accessors", indices, accessors.len())?;

                    let material = match primitive.optional("material") {
                        Some(material_node) => {
                            let index = material_node.expect_usize()?;
                            Self::checked_index(file, material_node.path(), "materials", index, materials.len())?;
                            Some(index)
                        }
                        None => None,
                    };

                    Ok(GltfPrimitive {
                        positions,
                        indices,
                        normals: accessor_index("NORMAL")?,
                        tangents: accessor_index("TANGENT")?,
                        coordinates: accessor_index("TEXCOORD_0")?,
                        tints: accessor_index("COLOR_0")?,
                        material,
                    })
                })
                .collect::<Result<Vec<_>, ParserError>>()?;

            Ok(GltfMesh {
                name: node.optional("name").map(|name| name.expect_string().map(str::to_owned)).transpose()?,
                primitives,
            })
        })?;

        let nodes = Self::parse_pool(&root, "nodes", |node| {
            let transform = if let Some(matrix) = node.optional("matrix") {
                if node.optional("translation").is_some()
                    || node.optional("rotation").is_some()
                    || node.optional("scale").is_some()
                {
                    return Err(node.violation("either a matrix or translate/rotate/scale, not both"));
                }
                GltfNodeTransform::Matrix(matrix.expect_f32s::<16>()?)
            } else {
                GltfNodeTransform::Composed {
                    translation: node.optional("translation").map(|t| t.expect_f32s::<3>()).transpose()?,
                    rotation: node.optional("rotation").map(|r| r.expect_f32s::<4>()).transpose()?,
                    scale: node.optional("scale").map(|s| s.expect_f32s::<3>()).transpose()?,
                }
            };

            let mesh = match node.optional("mesh") {
                Some(mesh_node) => {
                    let index = mesh_node.expect_usize()?;
                    Self::checked_index(file, mesh_node.path(), "meshes", index, meshes.len())?;
                    Some(index)
                }
                None => None,
            };

            Ok(GltfNode {
                name: node.optional("name").map(|name| name.expect_string().map(str::to_owned)).transpose()?,
                mesh,
                children: match node.optional("children") {
                    Some(children) => children
                        .elements()?
                        .iter()
                        .map(|child| child.expect_usize())
                        .collect::<Result<Vec<_>, _>>()?,
                    None => Vec::new(),
                },
                transform,
            })
        })?;

        // Children may reference forward, so the pool has to exist first.
        for (index, node) in nodes.iter().enumerate() {
            for &child in &node.children {
                Self::checked_index(file, &format!("nodes[{}].children", index), "nodes", child, nodes.len())?;
            }
        }

        let scenes = Self::parse_pool(&root, "scenes", |node| {
            let scene_nodes = match node.optional("nodes") {
                Some(scene_nodes) => scene_nodes
                    .elements()?
                    .iter()
                    .map(|root_node| {
                        let index = root_node.expect_usize()?;
                        Self::checked_index(file, root_node.path(), "nodes", index, nodes.len())?;
                        Ok(index)
                    })
                    .collect::<Result<Vec<_>, ParserError>>()?,
                None => Vec::new(),
            };
            Ok(GltfScene {
                name: node.optional("name").map(|name| name.expect_string().map(str::to_owned)).transpose()?,
                nodes: scene_nodes,
            })
        })?;

        // The default-scene index is mandatory; without it there is nothing
        // to export.
        let scene = root.member("scene")?.expect_usize()?;
        Self::checked_index(file, "scene", "scenes", scene, scenes.len())?;

        Ok(GltfDocument {
            buffers,
            buffer_views,
            accessors,
            images,
            samplers,
            textures,
            materials,
            meshes,
            nodes,
            scenes,
            scene,
        })
    }

    fn parse_pool<'a, T>(
        root: &Node<'a>,
        key: &str,
        parse: impl Fn(&Node<'a>) -> Result<T, ParserError>,
    ) -> Result<Vec<T>, ParserError> {
        match root.optional(key) {
            Some(pool) => pool.elements()?.iter().map(parse).collect(),
            None => Ok(Vec::new()),
        }
    }

    fn optional_usize(node: &Node, key: &str) -> Result<Option<usize>, ParserError> {
        node.optional(key).map(|value| value.expect_usize()).transpose()
    }

    fn optional_code<T: TryFrom<u32>>(node: &Node, key: &str, expected: &str) -> Result<Option<T>, ParserError> {
        match node.optional(key) {
            Some(code) => {
                let raw = code.expect_u32()?;
                Ok(Some(T::try_from(raw).map_err(|_| code.violation(expected))?))
            }
            None => Ok(None),
        }
    }

    fn optional_texture_ref(
        file: &str,
        node: &Node,
        key: &str,
        factor_key: Option<&str>,
        textures_len: usize,
    ) -> Result<Option<GltfTextureRef>, ParserError> {
        match node.optional(key) {
            Some(reference) => {
                let index_node = reference.member("index")?;
                let texture = index_node.expect_usize()?;
                Self::checked_index(file, index_node.path(), "textures", texture, textures_len)?;
                let factor = match factor_key {
                    Some(factor_key) => reference.optional(factor_key).map(|f| f.expect_f32()).transpose()?,
                    None => None,
                };
                Ok(Some(GltfTextureRef { texture, factor }))
            }
            None => Ok(None),
        }
    }

    fn checked_index(
        file: &str,
        element: &str,
        pool: &'static str,
        index: usize,
        len: usize,
    ) -> Result<usize, ParserError> {
        if index >= len {
            return Err(ParserError::InvalidReference {
                file: file.to_owned(),
                element: element.to_owned(),
                pool,
                reason: format!("index {} out of range ({} entries)", index, len),
            });
        }
        Ok(index)
    }

    /// Expand a typed, possibly strided, possibly sub-offset accessor into one
    /// element per logical vertex, components converted to f32. `buffers` is
    /// the fetched byte pool, parallel to `document.buffers`.
    pub fn expand_accessor(
        file: &str,
        document: &GltfDocument,
        buffers: &[Vec<u8>],
        index: usize,
    ) -> Result<Vec<f32>, ParserError> {
        let accessor = &document.accessors[index];
        let view = &document.buffer_views[accessor.buffer_view];
        let region = Self::view_region(file, document, buffers, accessor.buffer_view)?;

        let element_size = accessor.element_size();
        let stride = view.byte_stride.unwrap_or(element_size);
        let component_size = accessor.component_type.byte_size();
        let arity = accessor.kind.arity();

        let mut values = Vec::with_capacity(accessor.count * arity);
        for element in 0..accessor.count {
            let base = accessor.byte_offset + element * stride;
            for component in 0..arity {
                let bytes = &region[base + component * component_size..];
                values.push(Self::component_to_f32(accessor.component_type, accessor.normalized, bytes));
            }
        }
        Ok(values)
    }

    /// Expand an index accessor: scalar, unsigned integer components only.
    pub fn expand_indices(
        file: &str,
        document: &GltfDocument,
        buffers: &[Vec<u8>],
        index: usize,
    ) -> Result<Vec<u32>, ParserError> {
        let accessor = &document.accessors[index];
        if accessor.kind != ElementKind::Scalar {
            return Err(ParserError::FormatError {
                file: file.to_owned(),
                reason: format!("accessors[{}]: index data must be scalar", index),
            });
        }
        if !matches!(
            accessor.component_type,
            ComponentType::Uint8 | ComponentType::Uint16 | ComponentType::Uint32
        ) {
            return Err(ParserError::FormatError {
                file: file.to_owned(),
                reason: format!("accessors[{}]: index data must use an unsigned integer component type", index),
            });
        }

        let view = &document.buffer_views[accessor.buffer_view];
        let region = Self::view_region(file, document, buffers, accessor.buffer_view)?;
        let component_size = accessor.component_type.byte_size();
        let stride = view.byte_stride.unwrap_or(component_size);

        let mut indices = Vec::with_capacity(accessor.count);
        for element in 0..accessor.count {
            let bytes = &region[accessor.byte_offset + element * stride..];
            indices.push(match accessor.component_type {
                ComponentType::Uint8 => bytes[0] as u32,
                ComponentType::Uint16 => LittleEndian::read_u16(bytes) as u32,
                _ => LittleEndian::read_u32(bytes),
            });
        }
        Ok(indices)
    }

    /// The raw bytes of a buffer view, e.g. an embedded image.
    pub fn view_bytes<'a>(
        file: &str,
        document: &GltfDocument,
        buffers: &'a [Vec<u8>],
        view_index: usize,
    ) -> Result<&'a [u8], ParserError> {
        Self::view_region(file, document, buffers, view_index)
    }

    fn view_region<'a>(
        file: &str,
        document: &GltfDocument,
        buffers: &'a [Vec<u8>],
        view_index: usize,
    ) -> Result<&'a [u8], ParserError> {
        let view = &document.buffer_views[view_index];
        let data = &buffers[view.buffer];
        // The declared byteLength was validated during parsing; the fetched
        // bytes can still come up short.
        if view.byte_offset + view.byte_length > data.len() {
            return Err(ParserError::InvalidReference {
                file: file.to_owned(),
                element: format!("bufferViews[{}]", view_index),
                pool: "buffers",
                reason: format!(
                    "buffer data of {} bytes is shorter than the declared {}",
                    data.len(),
                    buffers_declared_length(document, view.buffer)
                ),
            });
        }
        Ok(&data[view.byte_offset..view.byte_offset + view.byte_length])
    }

    fn component_to_f32(component_type: ComponentType, normalized: bool, bytes: &[u8]) -> f32 {
        match component_type {
            ComponentType::Int8 => {
                let value = bytes[0] as i8;
                if normalized {
                    (value as f32 / 127.0).max(-1.0)
                } else {
                    value as f32
                }
            }
            ComponentType::Uint8 => {
                let value = bytes[0];
                if normalized {
                    value as f32 / 255.0
                } else {
                    value as f32
                }
            }
            ComponentType::Int16 => {
                let value = LittleEndian::read_i16(bytes);
                if normalized {
                    (value as f32 / 32767.0).max(-1.0)
                } else {
                    value as f32
                }
            }
            ComponentType::Uint16 => {
                let value = LittleEndian::read_u16(bytes);
                if normalized {
                    value as f32 / 65535.0
                } else {
                    value as f32
                }
            }
            ComponentType::Uint32 => {
                let value = LittleEndian::read_u32(bytes);
                if normalized {
                    value as f32 / u32::MAX as f32
                } else {
                    value as f32
                }
            }
            ComponentType::Float32 => LittleEndian::read_f32(bytes),
        }
    }
}

fn buffers_declared_length(document: &GltfDocument, buffer: usize) -> usize {
    document.buffers[buffer].byte_length
}
