//! OBJ parser producing deduplicated, GPU-ready indexed meshes.
//!
//! Loading runs in two phases: the source is parsed into raw attribute lists
//! plus faces of vertex references, then the faces are fan-triangulated and
//! every distinct `(position, texcoord, normal)` value triple becomes one slot
//! in the output attribute arrays.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use glam::{Vec2, Vec3};
use thiserror::Error;

use crate::mesh::IndexedMesh;

/// Lengths at or below this are treated as zero when normalising.
const NORMAL_EPSILON: f32 = 1e-12;

#[derive(Debug, Error)]
pub enum ObjError {
    #[error("OBJ file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read OBJ data: {0}")]
    Io(#[from] io::Error),
    #[error("OBJ parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type ObjResult<T> = Result<T, ObjError>;

fn parse_error(line: usize, message: impl Into<String>) -> ObjError {
    ObjError::Parse {
        line,
        message: message.into(),
    }
}

/// Post-processing switches applied while building the indexed mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    /// Compute smooth per-vertex normals when the source has no `vn` records.
    pub generate_normals: bool,
    /// Swap two indices of every triangle, flipping its front face.
    pub invert_winding: bool,
}

impl LoadOptions {
    pub fn new(generate_normals: bool, invert_winding: bool) -> Self {
        Self {
            generate_normals,
            invert_winding,
        }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new(true, false)
    }
}

/// Load an OBJ mesh from a file path.
pub fn load_obj_from_path(path: impl AsRef<Path>, options: LoadOptions) -> ObjResult<IndexedMesh> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ObjError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ObjError::Io(e),
    })?;
    let mesh = load_obj_from_reader(BufReader::new(file), options)?;
    log::info!(
        "Loaded mesh {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Load an OBJ mesh from a [`BufRead`] implementation.
pub fn load_obj_from_reader<R: BufRead>(reader: R, options: LoadOptions) -> ObjResult<IndexedMesh> {
    let raw = parse_obj(reader)?;
    build_indexed(&raw, options)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str, options: LoadOptions) -> ObjResult<IndexedMesh> {
    load_obj_from_reader(io::Cursor::new(contents), options)
}

/// One corner of a face: 0-based indices into the raw attribute lists.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct VertexRef {
    position: usize,
    texcoord: Option<usize>,
    normal: Option<usize>,
}

/// Bit pattern of a finished vertex. Two corners share an output slot only
/// when position, texcoord and normal match exactly.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct VertexKey([u32; 3], [u32; 2], [u32; 3]);

impl VertexKey {
    fn new(position: Vec3, uv: Vec2, normal: Vec3) -> Self {
        Self(
            position.to_array().map(f32::to_bits),
            uv.to_array().map(f32::to_bits),
            normal.to_array().map(f32::to_bits),
        )
    }
}

#[derive(Debug)]
struct Face {
    refs: Vec<VertexRef>,
    line: usize,
}

#[derive(Debug, Default)]
struct RawObj {
    positions: Vec<Vec3>,
    texcoords: Vec<Vec2>,
    normals: Vec<Vec3>,
    faces: Vec<Face>,
    lines: usize,
}

fn parse_obj<R: BufRead>(reader: R) -> ObjResult<RawObj> {
    let mut raw = RawObj::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        raw.lines = line_no;
        let line = line.map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => parse_error(line_no, "line is not valid UTF-8"),
            _ => ObjError::Io(e),
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };

        match tag {
            "v" => {
                let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                raw.positions.push(Vec3::new(x, y, z));
            }
            "vt" => {
                let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                let v = parse_f32(parts.next(), line_no, "v coordinate")?;
                raw.texcoords.push(Vec2::new(u, v));
            }
            "vn" => {
                let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                raw.normals.push(Vec3::new(nx, ny, nz));
            }
            "f" => {
                let refs = parts
                    .map(|part| {
                        parse_face_vertex(
                            part,
                            raw.positions.len(),
                            raw.texcoords.len(),
                            raw.normals.len(),
                            line_no,
                        )
                    })
                    .collect::<ObjResult<Vec<_>>>()?;
                if refs.len() < 3 {
                    return Err(parse_error(
                        line_no,
                        format!("face needs at least 3 vertices, found {}", refs.len()),
                    ));
                }
                raw.faces.push(Face {
                    refs,
                    line: line_no,
                });
            }
            _ => {
                // Ignore other directives (o/g/s/usemtl/mtllib/etc.)
            }
        }
    }

    if raw.faces.is_empty() {
        return Err(parse_error(raw.lines, "OBJ contained no faces"));
    }

    Ok(raw)
}

fn build_indexed(raw: &RawObj, options: LoadOptions) -> ObjResult<IndexedMesh> {
    // Fan triangulation; the final winding is fixed here so generated
    // normals agree with the emitted front faces.
    let mut triangles: Vec<([VertexRef; 3], usize)> = Vec::new();
    for face in &raw.faces {
        let first = face.refs[0];
        for pair in face.refs[1..].windows(2) {
            let mut tri = [first, pair[0], pair[1]];
            if options.invert_winding {
                tri.swap(1, 2);
            }
            triangles.push((tri, face.line));
        }
    }

    let generated = (raw.normals.is_empty() && options.generate_normals)
        .then(|| generate_normals(&raw.positions, triangles.iter().map(|(tri, _)| tri)));

    let mut unique: HashMap<VertexKey, u32> = HashMap::new();
    let mut mesh = IndexedMesh::default();
    mesh.indices.reserve(triangles.len() * 3);

    for (tri, line) in &triangles {
        for r in tri {
            let position = raw.positions[r.position];
            let uv = r.texcoord.map_or(Vec2::ZERO, |t| raw.texcoords[t]);
            // Generated normals are indexed by position.
            let normal = match (&generated, r.normal) {
                (Some(normals), _) => normals[r.position],
                (None, Some(n)) => raw.normals[n],
                (None, None) => Vec3::ZERO,
            };

            let key = VertexKey::new(position, uv, normal);
            let index = match unique.get(&key) {
                Some(&idx) => idx,
                None => {
                    let idx = u32::try_from(mesh.positions.len()).map_err(|_| {
                        parse_error(*line, format!("too many vertices in OBJ (>{})", u32::MAX))
                    })?;
                    mesh.positions.push(position.to_array());
                    mesh.texcoords.push(uv.to_array());
                    mesh.normals.push(normal.to_array());
                    unique.insert(key, idx);
                    idx
                }
            };
            mesh.indices.push(index);
        }
    }

    log::debug!(
        "OBJ: {} positions, {} texcoords, {} normals ({}), {} faces -> {} vertices, {} indices",
        raw.positions.len(),
        raw.texcoords.len(),
        raw.normals.len(),
        if generated.is_some() { "generated" } else { "source" },
        raw.faces.len(),
        mesh.vertex_count(),
        mesh.index_count()
    );

    Ok(mesh)
}

/// Smooth normals: every triangle adds its unit face normal to the
/// accumulator of each position it references, then the sums are normalised.
fn generate_normals<'a>(
    positions: &[Vec3],
    triangles: impl Iterator<Item = &'a [VertexRef; 3]>,
) -> Vec<Vec3> {
    let mut accum = vec![Vec3::ZERO; positions.len()];
    for tri in triangles {
        let [a, b, c] = tri.map(|r| positions[r.position]);
        let face_normal = safe_normalize((b - a).cross(c - a));
        for r in tri {
            accum[r.position] += face_normal;
        }
    }
    accum.into_iter().map(safe_normalize).collect()
}

fn safe_normalize(v: Vec3) -> Vec3 {
    let len = v.length();
    if len.is_finite() && len > NORMAL_EPSILON {
        v / len
    } else {
        Vec3::ZERO
    }
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> ObjResult<f32> {
    let token = value.ok_or_else(|| parse_error(line_no, format!("missing {what}")))?;
    token
        .parse::<f32>()
        .map_err(|e| parse_error(line_no, format!("invalid {what} '{token}': {e}")))
}

fn parse_face_vertex(
    token: &str,
    pos_count: usize,
    tex_count: usize,
    norm_count: usize,
    line_no: usize,
) -> ObjResult<VertexRef> {
    let mut split = token.split('/');
    let pos = split
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| parse_error(line_no, format!("malformed face element '{token}'")))?;
    let position = resolve_index(pos, pos_count, line_no)?;

    let texcoord = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, tex_count, line_no)?),
        _ => None,
    };

    let normal = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, norm_count, line_no)?),
        _ => None,
    };

    if split.next().is_some() {
        return Err(parse_error(line_no, format!("malformed face element '{token}'")));
    }

    Ok(VertexRef {
        position,
        texcoord,
        normal,
    })
}

/// Resolve a 1-based (or negative, relative) OBJ index against `len`.
fn resolve_index(token: &str, len: usize, line_no: usize) -> ObjResult<usize> {
    let raw = token
        .parse::<i64>()
        .map_err(|_| parse_error(line_no, format!("invalid index '{token}'")))?;
    if raw == 0 {
        return Err(parse_error(line_no, "OBJ indices are 1-based; found 0"));
    }

    let idx = if raw > 0 { raw - 1 } else { len as i64 + raw };

    if idx < 0 || idx as usize >= len {
        return Err(parse_error(
            line_no,
            format!("index {raw} resolved out of bounds (len={len})"),
        ));
    }

    Ok(idx as usize)
}
