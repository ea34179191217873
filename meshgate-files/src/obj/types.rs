use crate::common::types::{ColorRgba, Float2, Float3};

/// One contiguous material-binding group: its own deduplicated vertex arrays
/// plus triangle index triples into them.
#[derive(Debug, Default)]
pub struct ObjGroup {
    pub material: Option<String>,
    pub positions: Vec<Float3>,
    pub normals: Vec<Float3>,
    pub coordinates: Vec<Float2>,
    pub triangles: Vec<[u32; 3]>,
}

#[derive(Debug, Default)]
pub struct ObjAsset {
    pub groups: Vec<ObjGroup>,
    /// Companion material libraries, in reference order.
    pub material_libraries: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MtlMaterial {
    pub name: String,
    pub diffuse: Option<ColorRgba>,
    pub specular: Option<ColorRgba>,
    pub emissive: Option<ColorRgba>,
    pub shininess: Option<f32>,
    pub diffuse_map: Option<String>,
    pub emissive_map: Option<String>,
    pub normal_map: Option<String>,
    pub height_map: Option<String>,
}
