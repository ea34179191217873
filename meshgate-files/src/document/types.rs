use crate::common::types::{ColorRgba, Float2, Float3};

/// One indexed triangle-list primitive group from a plain-data document.
#[derive(Debug, Default)]
pub struct DocumentPolygon {
    pub positions: Vec<Float3>,
    pub indices: Vec<[u32; 3]>,
    pub normals: Option<Vec<Float3>>,
    pub coordinates: Option<Vec<Float2>>,
    pub tints: Option<Vec<ColorRgba>>,
    pub material_name: Option<String>,
}

/// Texture references are kept as written; the caller resolves them against
/// the document's own directory.
#[derive(Debug, Default)]
pub struct DocumentMaterial {
    pub name: String,
    pub diffuse_color: Option<ColorRgba>,
    pub emissive_color: Option<ColorRgba>,
    pub shininess: Option<f32>,
    pub diffuse_map: Option<String>,
    pub normal_map: Option<String>,
    pub metalness_map: Option<String>,
    pub roughness_map: Option<String>,
    pub occlusion_map: Option<String>,
    pub emissive_map: Option<String>,
    pub height_map: Option<String>,
    pub normal_scale: Option<f32>,
    pub occlusion_strength: Option<f32>,
    pub height_scale: Option<f32>,
    pub height_bias: Option<f32>,
}

#[derive(Debug, Default)]
pub struct DocumentAsset {
    pub polygons: Vec<DocumentPolygon>,
    pub materials: Vec<DocumentMaterial>,
}
