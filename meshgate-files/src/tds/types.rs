use crate::common::types::{ColorRgba, Float2, Float3};

// Chunk tags, from the legacy tooling that wrote these files.
pub const CHUNK_ROOT: u16 = 0x4D4D;
pub const CHUNK_EDIT: u16 = 0x3D3D;
pub const CHUNK_OBJECT: u16 = 0x4000;
pub const CHUNK_TRIMESH: u16 = 0x4100;
pub const CHUNK_VERTEX_LIST: u16 = 0x4110;
pub const CHUNK_FACE_LIST: u16 = 0x4120;
pub const CHUNK_FACE_MATERIAL: u16 = 0x4130;
pub const CHUNK_UV_LIST: u16 = 0x4140;
pub const CHUNK_MATERIAL: u16 = 0xAFFF;
pub const CHUNK_MATERIAL_NAME: u16 = 0xA000;
pub const CHUNK_MATERIAL_DIFFUSE: u16 = 0xA020;
pub const CHUNK_MATERIAL_SHININESS: u16 = 0xA040;
pub const CHUNK_MATERIAL_TEXMAP: u16 = 0xA200;
pub const CHUNK_MAP_FILENAME: u16 = 0xA300;
pub const CHUNK_COLOR_F32: u16 = 0x0010;
pub const CHUNK_COLOR_U8: u16 = 0x0011;
pub const CHUNK_PERCENT_U16: u16 = 0x0030;

/// One named object: the accumulated vertex/face/UV lists of its
/// triangle-mesh chunk plus the material assigned to its faces.
#[derive(Debug, Default)]
pub struct TdsObject {
    pub name: String,
    pub vertices: Vec<Float3>,
    pub faces: Vec<[u16; 3]>,
    pub uvs: Vec<Float2>,
    pub material_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct TdsMaterial {
    pub name: String,
    pub diffuse: Option<ColorRgba>,
    /// Shininess percentage as stored, 0..=100.
    pub shininess: Option<f32>,
    /// Relative path of the diffuse texture map, if any.
    pub texture_path: Option<String>,
}

#[derive(Debug, Default)]
pub struct TdsAsset {
    pub objects: Vec<TdsObject>,
    pub materials: Vec<TdsMaterial>,
}
