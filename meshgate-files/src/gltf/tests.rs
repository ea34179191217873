use serde_json::{json, Value};

use crate::gltf::reader::GltfReader;
use crate::gltf::types::{ComponentType, ElementKind, GltfNodeTransform};
use crate::ParserError;

/// A unit quad: 4 positions tightly packed, 6 u16 indices.
fn quad_bytes() -> Vec<u8> {
    let positions: [[f32; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ];
    let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];

    let mut bytes = Vec::new();
    for position in positions {
        for component in position {
            bytes.extend_from_slice(&component.to_le_bytes());
        }
    }
    for index in indices {
        bytes.extend_from_slice(&index.to_le_bytes());
    }
    bytes
}

fn quad_document(view_overrides: Option<usize>) -> Value {
    let positions_length = view_overrides.unwrap_or(48);
    json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [ { "mesh": 0 } ],
        "meshes": [ {
            "primitives": [ {
                "attributes": { "POSITION": 0 },
                "indices": 1
            } ]
        } ],
        "buffers": [ { "byteLength": 60 } ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": positions_length },
            { "buffer": 0, "byteOffset": 48, "byteLength": 12 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3" },
            { "bufferView": 1, "componentType": 5123, "count": 6, "type": "SCALAR" }
        ]
    })
}

#[test]
fn parses_and_expands_a_quad() -> Result<(), anyhow::Error> {
    let document = GltfReader::parse_document("quad.gltf", &quad_document(None))?;
    assert_eq!(document.scene, 0);
    assert_eq!(document.accessors[0].kind, ElementKind::Vec3);
    assert_eq!(document.accessors[1].component_type, ComponentType::Uint16);

    let buffers = vec![quad_bytes()];
    let positions = GltfReader::expand_accessor("quad.gltf", &document, &buffers, 0)?;
    assert_eq!(positions.len(), 12);
    assert_eq!(&positions[3..6], &[1.0, 0.0, 0.0]);

    let indices = GltfReader::expand_indices("quad.gltf", &document, &buffers, 1)?;
    assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);

    Ok(())
}

#[test]
fn accessor_overflow_names_the_accessor_and_the_shortfall() {
    // The positions view is 4 bytes smaller than the accessor requires.
    let error = GltfReader::parse_document("quad.gltf", &quad_document(Some(44))).unwrap_err();
    match error {
        ParserError::InvalidReference {
            element, pool, reason, ..
        } => {
            assert_eq!(element, "accessors[0]");
            assert_eq!(pool, "bufferViews");
            assert!(reason.contains("requires 48 bytes"), "reason: {}", reason);
            assert!(reason.contains("4 bytes short"), "reason: {}", reason);
        }
        other => panic!("expected InvalidReference, got {other:?}"),
    }
}

#[test]
fn sparse_accessors_are_rejected() {
    let mut document = quad_document(None);
    document["accessors"][0]["sparse"] = json!({ "count": 1 });
    assert!(matches!(
        GltfReader::parse_document("quad.gltf", &document),
        Err(ParserError::SchemaViolation { .. })
    ));
}

#[test]
fn unsupported_asset_version_is_fatal() {
    let mut document = quad_document(None);
    document["asset"]["version"] = json!("1.0");
    assert!(matches!(
        GltfReader::parse_document("quad.gltf", &document),
        Err(ParserError::MalformedContainer { .. })
    ));
}

#[test]
fn missing_default_scene_is_fatal() {
    let mut document = quad_document(None);
    document.as_object_mut().unwrap().remove("scene");
    assert!(matches!(
        GltfReader::parse_document("quad.gltf", &document),
        Err(ParserError::SchemaViolation { .. })
    ));
}

#[test]
fn out_of_range_references_are_fatal() {
    let mut document = quad_document(None);
    document["meshes"][0]["primitives"][0]["attributes"]["POSITION"] = json!(7);
    match GltfReader::parse_document("quad.gltf", &document) {
        Err(ParserError::InvalidReference { pool, .. }) => assert_eq!(pool, "accessors"),
        other => panic!("expected InvalidReference, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn node_transforms_parse_both_shapes() -> Result<(), anyhow::Error> {
    let mut document = quad_document(None);
    document["nodes"] = json!([
        { "mesh": 0, "matrix": [1.0,0,0,0, 0,1.0,0,0, 0,0,1.0,0, 5.0,6.0,7.0,1.0] },
        { "translation": [1.0, 2.0, 3.0], "rotation": [0.0, 0.0, 1.0, 1.5707964], "scale": [2.0, 2.0, 2.0] }
    ]);

    let parsed = GltfReader::parse_document("quad.gltf", &document)?;
    assert!(matches!(parsed.nodes[0].transform, GltfNodeTransform::Matrix(_)));
    match &parsed.nodes[1].transform {
        GltfNodeTransform::Composed { translation, rotation, scale } => {
            assert_eq!(*translation, Some([1.0, 2.0, 3.0]));
            assert_eq!(rotation.map(|r| r[2]), Some(1.0));
            assert_eq!(*scale, Some([2.0, 2.0, 2.0]));
        }
        other => panic!("expected composed transform, got {other:?}"),
    }
    Ok(())
}

#[test]
fn splits_the_binary_container() -> Result<(), anyhow::Error> {
    let json_payload = serde_json::to_vec(&quad_document(None))?;
    let binary_payload = quad_bytes();

    let mut data = Vec::new();
    data.extend_from_slice(b"glTF");
    data.extend_from_slice(&2u32.to_le_bytes());
    let total = 12 + 8 + json_payload.len() + 8 + binary_payload.len();
    data.extend_from_slice(&(total as u32).to_le_bytes());
    data.extend_from_slice(&(json_payload.len() as u32).to_le_bytes());
    data.extend_from_slice(b"JSON");
    data.extend_from_slice(&json_payload);
    data.extend_from_slice(&(binary_payload.len() as u32).to_le_bytes());
    data.extend_from_slice(b"BIN\0");
    data.extend_from_slice(&binary_payload);

    let (document, embedded) = GltfReader::split_container(&data, "quad.glb")?;
    assert_eq!(document["asset"]["version"], "2.0");
    assert_eq!(embedded.as_deref(), Some(binary_payload.as_slice()));

    Ok(())
}

#[test]
fn sniffs_raw_json_documents() -> Result<(), anyhow::Error> {
    let data = serde_json::to_vec(&quad_document(None))?;
    let (document, embedded) = GltfReader::split_container(&data, "quad.gltf")?;
    assert!(embedded.is_none());
    assert_eq!(document["scene"], 0);
    Ok(())
}

#[test]
fn wrong_container_version_is_fatal() {
    let mut data = Vec::new();
    data.extend_from_slice(b"glTF");
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&12u32.to_le_bytes());

    assert!(matches!(
        GltfReader::split_container(&data, "quad.glb"),
        Err(ParserError::MalformedContainer { .. })
    ));
}

#[test]
fn strided_accessors_expand_per_logical_vertex() -> Result<(), anyhow::Error> {
    // Two vertices interleaved as position (12 bytes) + uv (8 bytes).
    let mut bytes = Vec::new();
    for vertex in 0..2 {
        for component in [vertex as f32, 1.0, 2.0] {
            bytes.extend_from_slice(&component.to_le_bytes());
        }
        for component in [0.25f32, 0.75] {
            bytes.extend_from_slice(&component.to_le_bytes());
        }
    }

    let document = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ {} ],
        "buffers": [ { "byteLength": 40 } ],
        "bufferViews": [ { "buffer": 0, "byteLength": 40, "byteStride": 20 } ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC3" },
            { "bufferView": 0, "byteOffset": 12, "componentType": 5126, "count": 2, "type": "VEC2" }
        ]
    });

    let parsed = GltfReader::parse_document("interleaved.gltf", &document)?;
    let buffers = vec![bytes];

    let positions = GltfReader::expand_accessor("interleaved.gltf", &parsed, &buffers, 0)?;
    assert_eq!(positions, vec![0.0, 1.0, 2.0, 1.0, 1.0, 2.0]);

    let uvs = GltfReader::expand_accessor("interleaved.gltf", &parsed, &buffers, 1)?;
    assert_eq!(uvs, vec![0.25, 0.75, 0.25, 0.75]);

    Ok(())
}
