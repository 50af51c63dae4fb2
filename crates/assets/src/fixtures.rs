//! Small glTF models for tests.
//!
//! Every model has the same tree: a `falcon` group holding a `hull` mesh
//! and an `engines` mesh with two primitives, all sharing one triangle.

use base64::Engine as _;

/// Nodes in a loaded fixture subtree, including the loader's root group.
pub const MODEL_NODE_COUNT: usize = 6;
/// Mesh nodes in a loaded fixture subtree.
pub const MODEL_MESH_NODES: usize = 3;

const BUFFER_LEN: usize = 44;

const DOCUMENT: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [{ "nodes": [0] }],
  "nodes": [
    { "name": "falcon", "children": [1, 2] },
    { "name": "hull", "mesh": 0, "translation": [0.0, 0.5, 0.0] },
    { "name": "engines", "mesh": 1 }
  ],
  "meshes": [
    { "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }] },
    { "primitives": [
        { "attributes": { "POSITION": 0 }, "indices": 1 },
        { "attributes": { "POSITION": 0 } }
    ] }
  ],
  "materials": [{ "pbrMetallicRoughness": { "baseColorFactor": [0.8, 0.1, 0.1, 1.0] } }],
  "buffers": [BUFFER],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, -1.0], "max": [1.0, 0.0, 0.0] },
    { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
  ]
}"#;

/// One triangle: three `f32x3` positions then three `u16` indices, padded.
pub fn geometry_bin() -> Vec<u8> {
    let mut bytes = Vec::with_capacity(BUFFER_LEN);
    for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]] {
        for c in p {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
    }
    for i in [0u16, 1, 2] {
        bytes.extend_from_slice(&i.to_le_bytes());
    }
    bytes.resize(BUFFER_LEN, 0);
    bytes
}

fn document(buffer: &str) -> Vec<u8> {
    DOCUMENT.replace("BUFFER", buffer).into_bytes()
}

/// A `.gltf` with its buffer inlined as a base64 data URI.
pub fn embedded_gltf() -> Vec<u8> {
    let data = base64::engine::general_purpose::STANDARD.encode(geometry_bin());
    document(&format!(
        r#"{{ "byteLength": {BUFFER_LEN}, "uri": "data:application/octet-stream;base64,{data}" }}"#
    ))
}

/// A `.gltf` referencing an external buffer at `uri`, plus that buffer.
pub fn external_gltf(uri: &str) -> (Vec<u8>, Vec<u8>) {
    let gltf = document(&format!(r#"{{ "byteLength": {BUFFER_LEN}, "uri": "{uri}" }}"#));
    (gltf, geometry_bin())
}

/// A binary `.glb` with the buffer in its BIN chunk.
pub fn glb() -> Vec<u8> {
    let mut json = document(&format!(r#"{{ "byteLength": {BUFFER_LEN} }}"#));
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let bin = geometry_bin();
    let total = 12 + 8 + json.len() + 8 + bin.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(b"BIN\0");
    out.extend_from_slice(&bin);
    out
}
