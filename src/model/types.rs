use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::io::image::ImageData;

/// A fresh, owned tree of meshes. No back-references, no shared nodes.
#[derive(Clone, Default)]
pub struct Model {
    pub meshes: Vec<Mesh>,
}

impl Model {
    /// Premultiply every root mesh's local transform. Child transforms stay
    /// local to their parent; only flattening composes them into world space.
    pub fn apply_root_transform(&mut self, transform: Mat4) {
        for mesh in &mut self.meshes {
            mesh.transform = transform * mesh.transform;
        }
    }
}

impl Debug for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Model {{ meshes: [{}] }}", self.meshes.len())
    }
}

/// One scene-graph node: an owned subtree with its local-to-parent transform
/// and the polygon groups drawn at this node.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub transform: Mat4,
    pub polygons: Vec<Polygon>,
    pub children: Vec<Mesh>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Mesh {
        Mesh {
            name: name.into(),
            transform: Mat4::IDENTITY,
            polygons: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// One indexed triangle-list primitive group. Attribute buffers are parallel
/// to `positions`; an empty buffer means the attribute is absent, a present
/// one has exactly one entry per logical vertex.
#[derive(Clone, Default)]
pub struct Polygon {
    pub positions: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
    pub coordinates: Vec<Vec2>,
    pub tints: Vec<Vec4>,
    pub material: Option<Arc<Material>>,
}

impl Debug for Polygon {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Polygon {{ positions: [{}], ", self.positions.len())?;
        write!(f, "indices: [{}], ", self.indices.len())?;
        write!(f, "normals: [{}], ", self.normals.len())?;
        write!(f, "tangents: [{}], ", self.tangents.len())?;
        write!(f, "coordinates: [{}], ", self.coordinates.len())?;
        write!(f, "tints: [{}], ", self.tints.len())?;
        write!(f, "material: {:?} }}", self.material.as_ref().and_then(|m| m.name.as_deref()))
    }
}

/// Materials are shared by reference within one model: two polygons naming
/// the same material resolve to the same `Arc`, so consumers can deduplicate
/// GPU uploads by identity.
#[derive(Debug, Default)]
pub struct Material {
    pub name: Option<String>,
    pub diffuse_color: Option<Vec4>,
    pub emissive_color: Option<Vec4>,
    pub shininess: Option<f32>,
    pub metalness: Option<f32>,
    pub roughness: Option<f32>,
    pub diffuse_map: Option<Arc<Texture>>,
    pub normal_map: Option<Arc<Texture>>,
    pub metalness_map: Option<Arc<Texture>>,
    pub roughness_map: Option<Arc<Texture>>,
    pub occlusion_map: Option<Arc<Texture>>,
    pub emissive_map: Option<Arc<Texture>>,
    pub height_map: Option<Arc<Texture>>,
    pub normal_scale: Option<f32>,
    pub occlusion_strength: Option<f32>,
    pub height_scale: Option<f32>,
    pub height_bias: Option<f32>,
}

/// A decoded image plus its sampling state. The image sits behind an `Arc`
/// so container textures sharing one image never decode it twice.
#[derive(Debug)]
pub struct Texture {
    pub image: Arc<ImageData>,
    pub filter: Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Filter {
    pub magnify: Interpolation,
    pub minify: Interpolation,
    pub mipmaps: bool,
    pub wrap: WrapMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}
