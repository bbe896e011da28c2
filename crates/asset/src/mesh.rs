//! CPU-side mesh representation used by loaders.

/// Indexed triangle mesh stored as parallel attribute arrays.
///
/// Vertex `i` is `(positions[i], texcoords[i], normals[i])`; every entry of
/// `indices` addresses all three arrays at once, three entries per triangle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexedMesh {
    pub positions: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl IndexedMesh {
    pub fn new(
        positions: Vec<[f32; 3]>,
        texcoords: Vec<[f32; 2]>,
        normals: Vec<[f32; 3]>,
        indices: Vec<u32>,
    ) -> Self {
        Self {
            positions,
            texcoords,
            normals,
            indices,
        }
    }

    /// Number of unique vertices (length of each attribute array).
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterate triangles as index triples.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Returns `true` if the mesh is non-empty, the attribute arrays are
    /// parallel and every index addresses an existing vertex.
    pub fn is_valid(&self) -> bool {
        let n = self.positions.len();
        n > 0
            && self.texcoords.len() == n
            && self.normals.len() == n
            && !self.indices.is_empty()
            && self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| (i as usize) < n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_validity() {
        let mesh = IndexedMesh::new(
            vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0.0; 2]; 3],
            vec![[0.0, 0.0, 1.0]; 3],
            vec![0, 1, 2],
        );
        assert!(mesh.is_valid());
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.triangles().next(), Some([0, 1, 2]));
    }

    #[test]
    fn out_of_range_index_is_invalid() {
        let mesh = IndexedMesh::new(vec![[0.0; 3]], vec![[0.0; 2]], vec![[0.0; 3]], vec![0, 0, 1]);
        assert!(!mesh.is_valid());
    }

    #[test]
    fn ragged_arrays_are_invalid() {
        let mesh = IndexedMesh::new(
            vec![[0.0; 3]; 3],
            vec![[0.0; 2]; 2],
            vec![[0.0; 3]; 3],
            vec![0, 1, 2],
        );
        assert!(!mesh.is_valid());
    }
}
