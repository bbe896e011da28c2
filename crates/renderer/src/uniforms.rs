//! CPU staging of a program's uniform block.

use glam::{Mat4, Vec3, Vec4};

use crate::shader::{ShaderProgram, UniformLocation, ValueKind};

/// Bytes of one uniform block, laid out as the linked program reflects it.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformBlock {
    bytes: Vec<u8>,
}

impl UniformBlock {
    pub fn new(size: u32) -> Self {
        Self {
            bytes: vec![0; size as usize],
        }
    }

    pub fn for_program(program: &ShaderProgram) -> Self {
        Self::new(program.uniform_block_size())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn set_mat4(&mut self, loc: Option<UniformLocation>, value: Mat4) -> bool {
        self.write(loc, ValueKind::Mat4, bytemuck::bytes_of(&value.to_cols_array()))
    }

    pub fn set_vec3(&mut self, loc: Option<UniformLocation>, value: Vec3) -> bool {
        self.write(loc, ValueKind::Vec3, bytemuck::bytes_of(&value.to_array()))
    }

    pub fn set_vec4(&mut self, loc: Option<UniformLocation>, value: Vec4) -> bool {
        self.write(loc, ValueKind::Vec4, bytemuck::bytes_of(&value.to_array()))
    }

    pub fn set_f32(&mut self, loc: Option<UniformLocation>, value: f32) -> bool {
        self.write(loc, ValueKind::Float, bytemuck::bytes_of(&value))
    }

    /// Copy `data` to the slot. Absent slots are a no-op; returns whether
    /// anything was written.
    fn write(&mut self, loc: Option<UniformLocation>, kind: ValueKind, data: &[u8]) -> bool {
        let Some(loc) = loc else {
            return false;
        };
        if loc.kind != kind {
            log::warn!(
                "uniform at offset {} is {:?}, not {:?}; skipped",
                loc.offset,
                loc.kind,
                kind
            );
            return false;
        }
        let start = loc.offset as usize;
        match self.bytes.get_mut(start..start + data.len()) {
            Some(dst) => {
                dst.copy_from_slice(data);
                true
            }
            None => {
                log::warn!(
                    "uniform at offset {} overruns a {}-byte block",
                    loc.offset,
                    self.bytes.len()
                );
                false
            }
        }
    }

    /// Read back the floats stored in a slot.
    pub fn read_f32s(&self, loc: UniformLocation) -> Option<Vec<f32>> {
        let start = loc.offset as usize;
        let bytes = self.bytes.get(start..start + loc.size as usize)?;
        Some(
            bytes
                .chunks_exact(4)
                .map(bytemuck::pod_read_unaligned::<f32>)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(offset: u32, size: u32, kind: ValueKind) -> Option<UniformLocation> {
        Some(UniformLocation { offset, size, kind })
    }

    #[test]
    fn writes_land_at_reflected_offsets() {
        let mut block = UniformBlock::new(32);
        assert!(block.set_vec3(loc(0, 12, ValueKind::Vec3), Vec3::new(1.0, 2.0, 3.0)));
        assert!(block.set_f32(loc(12, 4, ValueKind::Float), 45.0));
        assert!(block.set_vec4(loc(16, 16, ValueKind::Vec4), Vec4::ONE));

        let all = UniformLocation {
            offset: 0,
            size: 32,
            kind: ValueKind::Opaque,
        };
        let floats = block.read_f32s(all).unwrap();
        assert_eq!(floats, vec![1.0, 2.0, 3.0, 45.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn absent_location_is_a_no_op() {
        let mut block = UniformBlock::new(16);
        assert!(!block.set_mat4(None, Mat4::IDENTITY));
        assert!(block.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn kind_mismatch_and_overrun_are_skipped() {
        let mut block = UniformBlock::new(16);
        assert!(!block.set_f32(loc(0, 16, ValueKind::Vec4), 1.0));
        assert!(!block.set_vec4(loc(8, 16, ValueKind::Vec4), Vec4::ONE));
        assert!(block.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn matrices_are_column_major() {
        let mut block = UniformBlock::new(64);
        let m = Mat4::from_translation(Vec3::new(7.0, 8.0, 9.0));
        let slot = UniformLocation {
            offset: 0,
            size: 64,
            kind: ValueKind::Mat4,
        };
        block.set_mat4(Some(slot), m);
        let floats = block.read_f32s(slot).unwrap();
        assert_eq!(&floats[12..15], &[7.0, 8.0, 9.0]);
    }
}
