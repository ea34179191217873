use num_enum::TryFromPrimitive;

pub const CONTAINER_MAGIC: &[u8; 4] = b"glTF";
pub const CONTAINER_VERSION: u32 = 2;
pub const CHUNK_TYPE_JSON: u32 = u32::from_le_bytes(*b"JSON");
pub const CHUNK_TYPE_BINARY: u32 = u32::from_le_bytes(*b"BIN\0");

pub const SUPPORTED_ASSET_VERSION: &str = "2.0";

/// Accessor component types, by their on-disk numeric tags.
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum ComponentType {
    Int8 = 5120,
    Uint8 = 5121,
    Int16 = 5122,
    Uint16 = 5123,
    Uint32 = 5125,
    Float32 = 5126,
}

impl ComponentType {
    pub fn byte_size(self) -> usize {
        match self {
            ComponentType::Int8 | ComponentType::Uint8 => 1,
            ComponentType::Int16 | ComponentType::Uint16 => 2,
            ComponentType::Uint32 | ComponentType::Float32 => 4,
        }
    }

    pub fn is_integer(self) -> bool {
        self != ComponentType::Float32
    }
}

/// Element arity, from the accessor's type tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
}

impl ElementKind {
    pub fn from_tag(tag: &str) -> Option<ElementKind> {
        match tag {
            "SCALAR" => Some(ElementKind::Scalar),
            "VEC2" => Some(ElementKind::Vec2),
            "VEC3" => Some(ElementKind::Vec3),
            "VEC4" => Some(ElementKind::Vec4),
            _ => None,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            ElementKind::Scalar => 1,
            ElementKind::Vec2 => 2,
            ElementKind::Vec3 => 3,
            ElementKind::Vec4 => 4,
        }
    }
}

/// Sampler filter codes, by their on-disk numeric tags. The mipmapped
/// variants select both an interpolation and the mipmap flag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum FilterCode {
    Nearest = 9728,
    Linear = 9729,
    NearestMipmapNearest = 9984,
    LinearMipmapNearest = 9985,
    NearestMipmapLinear = 9986,
    LinearMipmapLinear = 9987,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum WrapCode {
    ClampToEdge = 33071,
    MirroredRepeat = 33648,
    Repeat = 10497,
}

#[derive(Debug)]
pub struct GltfBuffer {
    pub uri: Option<String>,
    pub byte_length: usize,
}

#[derive(Debug)]
pub struct GltfBufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
}

#[derive(Debug)]
pub struct GltfAccessor {
    pub buffer_view: usize,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub normalized: bool,
    pub count: usize,
    pub kind: ElementKind,
}

impl GltfAccessor {
    /// Size of one tightly packed element.
    pub fn element_size(&self) -> usize {
        self.component_type.byte_size() * self.kind.arity()
    }
}

#[derive(Debug)]
pub struct GltfImage {
    pub uri: Option<String>,
    pub buffer_view: Option<usize>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Default)]
pub struct GltfSampler {
    pub mag_filter: Option<FilterCode>,
    pub min_filter: Option<FilterCode>,
    pub wrap: Option<WrapCode>,
}

#[derive(Debug)]
pub struct GltfTexture {
    pub sampler: Option<usize>,
    pub source: usize,
}

#[derive(Debug)]
pub struct GltfTextureRef {
    pub texture: usize,
    /// normal texture scale or occlusion strength, where the schema has one.
    pub factor: Option<f32>,
}

#[derive(Debug)]
pub struct GltfMaterial {
    pub name: Option<String>,
    /// Defaults to opaque white.
    pub base_color_factor: [f32; 4],
    /// Defaults to black.
    pub emissive_factor: [f32; 3],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub base_color_texture: Option<GltfTextureRef>,
    pub metallic_roughness_texture: Option<GltfTextureRef>,
    pub normal_texture: Option<GltfTextureRef>,
    pub occlusion_texture: Option<GltfTextureRef>,
    pub emissive_texture: Option<GltfTextureRef>,
}

#[derive(Debug)]
pub struct GltfPrimitive {
    pub positions: usize,
    pub indices: usize,
    pub normals: Option<usize>,
    pub tangents: Option<usize>,
    pub coordinates: Option<usize>,
    pub tints: Option<usize>,
    pub material: Option<usize>,
}

#[derive(Debug)]
pub struct GltfMesh {
    pub name: Option<String>,
    pub primitives: Vec<GltfPrimitive>,
}

/// A node's local transform: either the explicit matrix or the composed
/// translate ∘ rotate(axis, angle) ∘ scale, applied in that fixed order.
#[derive(Debug)]
pub enum GltfNodeTransform {
    Matrix([f32; 16]),
    Composed {
        translation: Option<[f32; 3]>,
        /// `[axis_x, axis_y, axis_z, angle_radians]`
        rotation: Option<[f32; 4]>,
        scale: Option<[f32; 3]>,
    },
}

#[derive(Debug)]
pub struct GltfNode {
    pub name: Option<String>,
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
    pub transform: GltfNodeTransform,
}

#[derive(Debug)]
pub struct GltfScene {
    pub name: Option<String>,
    pub nodes: Vec<usize>,
}

/// The fully index-validated document. All cross-references were checked
/// during parsing; consumers may index the pools directly.
#[derive(Debug)]
pub struct GltfDocument {
    pub buffers: Vec<GltfBuffer>,
    pub buffer_views: Vec<GltfBufferView>,
    pub accessors: Vec<GltfAccessor>,
    pub images: Vec<GltfImage>,
    pub samplers: Vec<GltfSampler>,
    pub textures: Vec<GltfTexture>,
    pub materials: Vec<GltfMaterial>,
    pub meshes: Vec<GltfMesh>,
    pub nodes: Vec<GltfNode>,
    pub scenes: Vec<GltfScene>,
    /// Index of the scene to export.
    pub scene: usize,
}
