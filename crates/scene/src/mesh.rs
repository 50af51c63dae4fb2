use glam::Vec3;
use orbitview_common::MeshHandle;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Triangle-list geometry in model space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Content hash of the geometry. Identical geometry yields the same handle.
    pub fn content_handle(&self) -> MeshHandle {
        let mut hasher = Sha256::new();
        hasher.update((self.positions.len() as u64).to_le_bytes());
        for p in &self.positions {
            for c in p {
                hasher.update(c.to_le_bytes());
            }
        }
        for n in &self.normals {
            for c in n {
                hasher.update(c.to_le_bytes());
            }
        }
        for i in &self.indices {
            hasher.update(i.to_le_bytes());
        }
        let result = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&result[..8]);
        MeshHandle(u64::from_le_bytes(bytes))
    }

    /// Replace the normals with area-weighted vertex normals.
    pub fn compute_normals(&mut self) {
        let mut acc = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if a >= acc.len() || b >= acc.len() || c >= acc.len() {
                continue;
            }
            let pa = Vec3::from(self.positions[a]);
            let pb = Vec3::from(self.positions[b]);
            let pc = Vec3::from(self.positions[c]);
            let n = (pb - pa).cross(pc - pa);
            acc[a] += n;
            acc[b] += n;
            acc[c] += n;
        }
        self.normals = acc
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
            .collect();
    }

    /// Axis-aligned bounds, or `None` for empty geometry.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.positions.iter().map(|p| Vec3::from(*p));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    /// A flat plane in the XZ plane, centred on the origin and facing +Y,
    /// subdivided into `segments_x × segments_z` quads.
    pub fn plane(width: f32, depth: f32, segments_x: u32, segments_z: u32) -> Self {
        let gx = segments_x.max(1);
        let gz = segments_z.max(1);
        let step_x = width / gx as f32;
        let step_z = depth / gz as f32;

        let mut positions = Vec::with_capacity(((gx + 1) * (gz + 1)) as usize);
        for iz in 0..=gz {
            let z = iz as f32 * step_z - depth / 2.0;
            for ix in 0..=gx {
                let x = ix as f32 * step_x - width / 2.0;
                positions.push([x, 0.0, z]);
            }
        }

        let row = gx + 1;
        let mut indices = Vec::with_capacity((gx * gz * 6) as usize);
        for iz in 0..gz {
            for ix in 0..gx {
                let a = ix + row * iz;
                let b = ix + row * (iz + 1);
                let c = (ix + 1) + row * (iz + 1);
                let d = (ix + 1) + row * iz;
                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        let normals = vec![[0.0, 1.0, 0.0]; positions.len()];
        Self {
            positions,
            normals,
            indices,
        }
    }
}

/// Content-addressed geometry registry.
///
/// Scene nodes refer to geometry by handle; renderers look the data up here.
#[derive(Debug, Clone, Default)]
pub struct MeshStore {
    meshes: BTreeMap<MeshHandle, MeshData>,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register geometry and return its handle.
    pub fn insert(&mut self, mesh: MeshData) -> MeshHandle {
        let handle = mesh.content_handle();
        self.meshes.entry(handle).or_insert(mesh);
        handle
    }

    /// Register geometry under a handle computed elsewhere (by a loader
    /// worker, for example).
    pub fn insert_with_handle(&mut self, handle: MeshHandle, mesh: MeshData) {
        self.meshes.entry(handle).or_insert(mesh);
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&MeshData> {
        self.meshes.get(&handle)
    }

    pub fn contains(&self, handle: MeshHandle) -> bool {
        self.meshes.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MeshHandle, &MeshData)> {
        self.meshes.iter()
    }

    pub fn total_triangles(&self) -> usize {
        self.meshes.values().map(MeshData::triangle_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshData {
        MeshData {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]],
            normals: Vec::new(),
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn plane_dimensions() {
        let plane = MeshData::plane(20.0, 20.0, 32, 32);
        assert_eq!(plane.vertex_count(), 33 * 33);
        assert_eq!(plane.triangle_count(), 32 * 32 * 2);
        let (lo, hi) = plane.bounds().unwrap();
        assert_eq!(lo, Vec3::new(-10.0, 0.0, -10.0));
        assert_eq!(hi, Vec3::new(10.0, 0.0, 10.0));
        assert!(plane.normals.iter().all(|n| *n == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn computed_normals_face_up_for_ccw_triangle() {
        let mut mesh = triangle();
        mesh.compute_normals();
        assert_eq!(mesh.normals.len(), 3);
        for n in &mesh.normals {
            assert!((Vec3::from(*n) - Vec3::Y).length() < 1e-6);
        }
    }

    #[test]
    fn content_addressed_dedup() {
        let mut store = MeshStore::new();
        let a = store.insert(triangle());
        let b = store.insert(triangle());
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);

        let c = store.insert(MeshData::plane(1.0, 1.0, 1, 1));
        assert_ne!(a, c);
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_triangles(), 3);
    }

    #[test]
    fn empty_mesh_has_no_bounds() {
        assert!(MeshData::default().bounds().is_none());
    }
}
