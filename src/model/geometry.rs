use glam::Vec3;

use crate::model::types::{Mesh, Model, Polygon};

/// Finalization walk: fill in the derived geometry a decoder left absent.
/// Normals are computed when missing; tangents when normals and coordinates
/// are present but tangents are not.
pub fn derive_missing(model: &mut Model) {
    for mesh in &mut model.meshes {
        derive_mesh(mesh);
    }
}

fn derive_mesh(mesh: &mut Mesh) {
    for polygon in &mut mesh.polygons {
        if polygon.normals.is_empty() && !polygon.positions.is_empty() {
            compute_normals(polygon);
        }
        if polygon.tangents.is_empty() && !polygon.normals.is_empty() && !polygon.coordinates.is_empty() {
            compute_tangents(polygon);
        }
    }
    for child in &mut mesh.children {
        derive_mesh(child);
    }
}

/// Accumulate every triangle's `cross(p3 - p2, p1 - p2)` onto its three
/// vertices, then normalize the sums. Degenerate triangles contribute a zero
/// vector; a vertex touched only by degenerate triangles keeps a zero normal
/// instead of going NaN.
pub fn compute_normals(polygon: &mut Polygon) {
    let mut accumulated = vec![Vec3::ZERO; polygon.positions.len()];
    for &[a, b, c] in &polygon.indices {
        let p1 = polygon.positions[a as usize];
        let p2 = polygon.positions[b as usize];
        let p3 = polygon.positions[c as usize];
        let normal = (p3 - p2).cross(p1 - p2);

        accumulated[a as usize] += normal;
        accumulated[b as usize] += normal;
        accumulated[c as usize] += normal;
    }

    polygon.normals = accumulated.into_iter().map(|sum| sum.normalize_or_zero()).collect();
}

/// Solve the 2x2 UV-to-edge system per triangle (deltas taken against vertex
/// 2), accumulate the raw tangents per vertex, then Gram-Schmidt each sum
/// against its already-normalized normal. A near-degenerate UV
/// parameterization propagates Infinity/NaN; that is the contract, not a
/// case to patch up.
pub fn compute_tangents(polygon: &mut Polygon) {
    let mut accumulated = vec![Vec3::ZERO; polygon.positions.len()];
    for &[a, b, c] in &polygon.indices {
        let p1 = polygon.positions[a as usize];
        let p2 = polygon.positions[b as usize];
        let p3 = polygon.positions[c as usize];
        let uv1 = polygon.coordinates[a as usize];
        let uv2 = polygon.coordinates[b as usize];
        let uv3 = polygon.coordinates[c as usize];

        let c1 = uv1 - uv2;
        let c2 = uv3 - uv2;
        let coef = 1.0 / (c1.x * c2.y - c2.x * c1.y);

        let e1 = p1 - p2;
        let e2 = p3 - p2;
        let tangent = (e1 * c2.y - e2 * c1.y) * coef;

        accumulated[a as usize] += tangent;
        accumulated[b as usize] += tangent;
        accumulated[c as usize] += tangent;
    }

    polygon.tangents = accumulated
        .into_iter()
        .zip(&polygon.normals)
        .map(|(tangent, &normal)| (tangent - normal * normal.dot(tangent)).normalize())
        .collect();
}
