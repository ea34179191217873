use std::sync::Arc;

use glam::Mat4;
use log::warn;

use crate::model::types::{Material, Mesh, Model, Polygon};
use crate::LoadError;

pub enum ModelFlattener {}

impl ModelFlattener {
    /// Merge the whole tree into one polygon per distinct material (by `Arc`
    /// identity; material-less polygons form their own group), in world
    /// space. The input is left intact; the result is a new single-mesh
    /// model with an identity transform.
    ///
    /// Known gap: normals and tangents are copied untransformed. Without the
    /// inverse-transpose they are wrong under non-uniform scaling, but
    /// consumers depend on the current behavior.
    pub fn flatten(model: &Model) -> Result<Model, LoadError> {
        if model.meshes.is_empty() {
            warn!("Flattening a model with no meshes");
        }

        let mut buckets: Vec<Polygon> = Vec::new();
        for mesh in &model.meshes {
            Self::flatten_mesh(mesh, Mat4::IDENTITY, &mut buckets)?;
        }

        let mut flat = Mesh::new("flattened");
        flat.polygons = buckets;
        Ok(Model { meshes: vec![flat] })
    }

    fn flatten_mesh(mesh: &Mesh, parent: Mat4, buckets: &mut Vec<Polygon>) -> Result<(), LoadError> {
        let world = parent * mesh.transform;
        for polygon in &mesh.polygons {
            Self::merge_polygon(polygon, world, buckets)?;
        }
        for child in &mesh.children {
            Self::flatten_mesh(child, world, buckets)?;
        }
        Ok(())
    }

    fn merge_polygon(polygon: &Polygon, world: Mat4, buckets: &mut Vec<Polygon>) -> Result<(), LoadError> {
        let index = buckets
            .iter()
            .position(|bucket| Self::same_material(&bucket.material, &polygon.material));
        let bucket = match index {
            Some(index) => &mut buckets[index],
            None => {
                buckets.push(Polygon {
                    material: polygon.material.clone(),
                    ..Default::default()
                });
                buckets.last_mut().expect("bucket was just pushed")
            }
        };

        // Fragments sharing a material must agree on which attributes they
        // carry, or the concatenated buffers would fall out of step.
        if !bucket.positions.is_empty() {
            for (attribute, bucket_has, fragment_has) in [
                ("normals", !bucket.normals.is_empty(), !polygon.normals.is_empty()),
                ("tangents", !bucket.tangents.is_empty(), !polygon.tangents.is_empty()),
                (
                    "coordinates",
                    !bucket.coordinates.is_empty(),
                    !polygon.coordinates.is_empty(),
                ),
                ("tints", !bucket.tints.is_empty(), !polygon.tints.is_empty()),
            ] {
                if bucket_has != fragment_has {
                    return Err(LoadError::IncompatibleStride {
                        material: Self::material_label(&polygon.material),
                        attribute,
                    });
                }
            }
        }

        let offset = bucket.positions.len() as u32;
        bucket
            .positions
            .extend(polygon.positions.iter().map(|&position| world.transform_point3(position)));
        bucket.normals.extend_from_slice(&polygon.normals);
        bucket.tangents.extend_from_slice(&polygon.tangents);
        bucket.coordinates.extend_from_slice(&polygon.coordinates);
        bucket.tints.extend_from_slice(&polygon.tints);
        bucket
            .indices
            .extend(polygon.indices.iter().map(|&[a, b, c]| [a + offset, b + offset, c + offset]));

        Ok(())
    }

    fn same_material(a: &Option<Arc<Material>>, b: &Option<Arc<Material>>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn material_label(material: &Option<Arc<Material>>) -> String {
        material
            .as_ref()
            .and_then(|material| material.name.clone())
            .unwrap_or_else(|| "(unnamed)".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::{Mat4, Vec3};

    use super::ModelFlattener;
    use crate::model::types::{Material, Mesh, Model, Polygon};
    use crate::LoadError;

    fn triangle(material: Option<Arc<Material>>) -> Polygon {
        Polygon {
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            indices: vec![[0, 1, 2]],
            normals: vec![Vec3::Z; 3],
            material,
            ..Default::default()
        }
    }

    #[test]
    fn merges_by_material_identity_with_renumbered_indices() -> Result<(), anyhow::Error> {
        let shared = Arc::new(Material {
            name: Some("shared".to_owned()),
            ..Default::default()
        });

        let mut child = Mesh::new("child");
        child.transform = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        child.polygons.push(triangle(Some(shared.clone())));

        let mut root = Mesh::new("root");
        root.transform = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        root.polygons.push(triangle(Some(shared.clone())));
        root.polygons.push(triangle(None));
        root.children.push(child);

        let model = Model { meshes: vec![root] };
        let flat = ModelFlattener::flatten(&model)?;

        assert_eq!(flat.meshes.len(), 1);
        let polygons = &flat.meshes[0].polygons;
        // One bucket for the shared material, one for the material-less group.
        assert_eq!(polygons.len(), 2);

        let shared_bucket = polygons
            .iter()
            .find(|polygon| polygon.material.is_some())
            .expect("shared bucket");
        assert_eq!(shared_bucket.positions.len(), 6);
        assert_eq!(shared_bucket.indices, vec![[0, 1, 2], [3, 4, 5]]);
        // Parent-then-child composition: the child triangle lands at x+10, z+5.
        assert_eq!(shared_bucket.positions[3], Vec3::new(10.0, 0.0, 5.0));
        // Normals are deliberately copied untransformed.
        assert_eq!(shared_bucket.normals[3], Vec3::Z);

        // The original model was not touched.
        assert_eq!(model.meshes[0].polygons[0].positions.len(), 3);

        Ok(())
    }

    #[test]
    fn flattening_a_flat_model_is_idempotent() -> Result<(), anyhow::Error> {
        let material = Arc::new(Material::default());
        let mut mesh = Mesh::new("flat");
        mesh.polygons.push(triangle(Some(material)));
        let model = Model { meshes: vec![mesh] };

        let once = ModelFlattener::flatten(&model)?;
        let twice = ModelFlattener::flatten(&once)?;

        assert_eq!(twice.meshes.len(), 1);
        assert_eq!(twice.meshes[0].polygons.len(), 1);
        assert_eq!(twice.meshes[0].polygons[0].positions, once.meshes[0].polygons[0].positions);
        assert_eq!(twice.meshes[0].polygons[0].indices, once.meshes[0].polygons[0].indices);

        Ok(())
    }

    #[test]
    fn value_equal_materials_stay_distinct() -> Result<(), anyhow::Error> {
        let mut mesh = Mesh::new("two");
        mesh.polygons.push(triangle(Some(Arc::new(Material::default()))));
        mesh.polygons.push(triangle(Some(Arc::new(Material::default()))));

        let flat = ModelFlattener::flatten(&Model { meshes: vec![mesh] })?;
        assert_eq!(flat.meshes[0].polygons.len(), 2);

        Ok(())
    }

    #[test]
    fn attribute_layout_mismatch_is_fatal() {
        let material = Arc::new(Material {
            name: Some("striped".to_owned()),
            ..Default::default()
        });

        let mut without_normals = triangle(Some(material.clone()));
        without_normals.normals.clear();

        let mut mesh = Mesh::new("mismatch");
        mesh.polygons.push(triangle(Some(material)));
        mesh.polygons.push(without_normals);

        match ModelFlattener::flatten(&Model { meshes: vec![mesh] }) {
            Err(LoadError::IncompatibleStride { material, attribute }) => {
                assert_eq!(material, "striped");
                assert_eq!(attribute, "normals");
            }
            other => panic!("expected IncompatibleStride, got {:?}", other.map(|_| ())),
        }
    }
}
