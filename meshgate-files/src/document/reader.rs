use serde_json::Value;

use crate::common::schema::Node;
use crate::common::types::{ColorRgba, Float2, Float3};
use crate::document::types::{DocumentAsset, DocumentMaterial, DocumentPolygon};
use crate::ParserError;

pub struct DocumentReader {}

impl DocumentReader {
    /// Decode a plain nested map/array document. Optional fields stay absent,
    /// never guessed; every mismatch names its dotted path.
    pub fn parse_document(file: &str, document: &Value) -> Result<DocumentAsset, ParserError> {
        let root = Node::root(file, document);

        let polygons = root
            .member("polygons")?
            .elements()?
            .iter()
            .map(|polygon| Self::parse_polygon(file, polygon))
            .collect::<Result<Vec<_>, _>>()?;

        let materials = match root.optional("materials") {
            Some(materials) => materials
                .entries()?
                .into_iter()
                .map(|(name, material)| Self::parse_material(name, &material))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(DocumentAsset { polygons, materials })
    }

    fn parse_polygon(file: &str, node: &Node) -> Result<DocumentPolygon, ParserError> {
        let positions = Self::parse_list(node.member("positions")?, Node::expect_float3)?;
        let indices = Self::parse_list(node.member("indices")?, Node::expect_index_triple)?;

        let normals = node
            .optional("normals")
            .map(|normals| Self::parse_list(normals, Node::expect_float3))
            .transpose()?;
        let coordinates = node
            .optional("coordinates")
            .map(|coordinates| Self::parse_list(coordinates, Node::expect_float2))
            .transpose()?;
        let tints = node
            .optional("tints")
            .map(|tints| Self::parse_list(tints, Node::expect_color))
            .transpose()?;

        for (kind, length) in [
            ("normals", normals.as_ref().map(Vec::len)),
            ("coordinates", coordinates.as_ref().map(Vec::len)),
            ("tints", tints.as_ref().map(Vec::len)),
        ] {
            if let Some(length) = length {
                if length != positions.len() {
                    return Err(ParserError::FormatError {
                        file: file.to_owned(),
                        reason: format!(
                            "{}.{} has {} entries but {} positions",
                            node.path(),
                            kind,
                            length,
                            positions.len()
                        ),
                    });
                }
            }
        }

        for (triangle, indices) in indices.iter().enumerate() {
            for &index in indices {
                if index as usize >= positions.len() {
                    return Err(ParserError::InvalidReference {
                        file: file.to_owned(),
                        element: format!("{}.indices[{}]", node.path(), triangle),
                        pool: "positions",
                        reason: format!("index {} out of range ({} entries)", index, positions.len()),
                    });
                }
            }
        }

        Ok(DocumentPolygon {
            positions,
            indices,
            normals,
            coordinates,
            tints,
            material_name: node
                .optional("materialName")
                .map(|name| name.expect_string().map(str::to_owned))
                .transpose()?,
        })
    }

    fn parse_material(name: &str, node: &Node) -> Result<DocumentMaterial, ParserError> {
        let map = |key: &str| -> Result<Option<String>, ParserError> {
            node.optional(key)
                .map(|reference| reference.expect_string().map(str::to_owned))
                .transpose()
        };
        let scalar = |key: &str| -> Result<Option<f32>, ParserError> {
            node.optional(key).map(|value| value.expect_f32()).transpose()
        };

        Ok(DocumentMaterial {
            name: name.to_owned(),
            diffuse_color: node.optional("diffuseColor").map(|c| c.expect_color()).transpose()?,
            emissive_color: node.optional("emissiveColor").map(|c| c.expect_color()).transpose()?,
            shininess: scalar("shininess")?,
            diffuse_map: map("diffuseMap")?,
            normal_map: map("normalMap")?,
            metalness_map: map("metalnessMap")?,
            roughness_map: map("roughnessMap")?,
            occlusion_map: map("occlusionMap")?,
            emissive_map: map("emissiveMap")?,
            height_map: map("heightMap")?,
            normal_scale: scalar("normalScale")?,
            occlusion_strength: scalar("occlusionStrength")?,
            height_scale: scalar("heightScale")?,
            height_bias: scalar("heightBias")?,
        })
    }

    fn parse_list<'a, T>(
        node: Node<'a>,
        convert: impl Fn(&Node<'a>) -> Result<T, ParserError>,
    ) -> Result<Vec<T>, ParserError> {
        node.elements()?.iter().map(convert).collect()
    }
}
