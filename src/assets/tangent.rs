//! Tangent frame encoding.
//!
//! A vertex's (tangent, bitangent, normal) basis is stored as one unit
//! quaternion with four `f16` components. The rotation maps +X to the tangent
//! and +Z to the normal. The quaternion is kept in the `w > 0` hemisphere and
//! then negated when the bitangent is mirrored (tangent `w < 0`), so the sign
//! of `w` carries the handedness. `w` is never allowed to reach zero or the
//! sign would be lost.

use glam::{Mat3, Quat, Vec3, Vec4};
use half::f16;
use wgpu::VertexFormat;

use super::asset::Accessor;

/// Smallest magnitude kept in `w`.
const W_BIAS: f32 = 1.0 / 32767.0;

/// Builds the tangent frame quaternion for one vertex.
///
/// A missing or degenerate tangent is replaced by an arbitrary unit vector
/// orthogonal to the normal.
#[must_use]
pub fn tangent_frame(normal: Vec3, tangent: Option<Vec4>) -> Quat {
    let n = normal.normalize_or(Vec3::Z);

    let (t, handedness) = match tangent {
        Some(tangent) => {
            let t3 = tangent.truncate();
            let ortho = (t3 - n * n.dot(t3)).normalize_or_zero();
            let t = if ortho == Vec3::ZERO { n.any_orthonormal_vector() } else { ortho };
            (t, if tangent.w < 0.0 { -1.0 } else { 1.0 })
        }
        None => (n.any_orthonormal_vector(), 1.0),
    };
    let b = n.cross(t);

    let mut q = Quat::from_mat3(&Mat3::from_cols(t, b, n)).normalize();
    if q.w < 0.0 {
        q = -q;
    }
    if q.w < W_BIAS {
        let xyz = Vec3::new(q.x, q.y, q.z);
        let scale = (1.0 - W_BIAS * W_BIAS).sqrt() / xyz.length();
        let xyz = xyz * scale;
        q = Quat::from_xyzw(xyz.x, xyz.y, xyz.z, W_BIAS);
    }
    if handedness < 0.0 { -q } else { q }
}

/// Recovers `(normal, tangent, handedness)` from a tangent frame quaternion.
#[must_use]
pub fn decode_tangent_frame(q: Quat) -> (Vec3, Vec3, f32) {
    let handedness = if q.w < 0.0 { -1.0 } else { 1.0 };
    // q and -q describe the same rotation.
    let q = q.normalize();
    (q * Vec3::Z, q * Vec3::X, handedness)
}

/// Packs one tangent frame per normal.
///
/// `tangents` may be shorter than `normals`; vertices without one get a
/// synthesized tangent.
#[must_use]
pub fn pack_tangent_frames(normals: &[Vec3], tangents: Option<&[Vec4]>) -> Vec<[f16; 4]> {
    normals
        .iter()
        .enumerate()
        .map(|(i, &n)| {
            let q = tangent_frame(n, tangents.and_then(|t| t.get(i).copied()));
            [
                f16::from_f32(q.x),
                f16::from_f32(q.y),
                f16::from_f32(q.z),
                f16::from_f32(q.w),
            ]
        })
        .collect()
}

#[must_use]
pub fn unpack_half4(v: [f16; 4]) -> Quat {
    Quat::from_xyzw(v[0].to_f32(), v[1].to_f32(), v[2].to_f32(), v[3].to_f32())
}

/// Little-endian `Float16x4` vertex data.
#[must_use]
pub fn tangent_frames_to_bytes(frames: &[[f16; 4]]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames.len() * 8);
    for frame in frames {
        for c in frame {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
    }
    bytes
}

// ============================================================================
// Attribute reading
// ============================================================================

/// Reads `accessor.count` elements from `buffer` as four-component vectors.
///
/// Three-component formats get `w = 1`. Returns `None` for unsupported
/// formats or when the accessor runs past the end of `buffer`, including
/// offsets too large to represent.
pub(crate) fn read_vec4s(buffer: &[u8], accessor: &Accessor) -> Option<Vec<Vec4>> {
    let size = accessor.format.size() as usize;
    let stride = accessor.stride();
    let base = accessor.buffer_offset()?;

    if accessor.count > 0 {
        let end = (accessor.count - 1)
            .checked_mul(stride)?
            .checked_add(base)?
            .checked_add(size)?;
        if end > buffer.len() {
            return None;
        }
    }

    (0..accessor.count)
        .map(|i| {
            let start = base + i * stride;
            decode_element(&buffer[start..start + size], accessor.format)
        })
        .collect()
}

pub(crate) fn read_vec3s(buffer: &[u8], accessor: &Accessor) -> Option<Vec<Vec3>> {
    read_vec4s(buffer, accessor).map(|v| v.into_iter().map(Vec4::truncate).collect())
}

fn decode_element(bytes: &[u8], format: VertexFormat) -> Option<Vec4> {
    let snorm8 = |b: u8| (f32::from(b.cast_signed()) / 127.0).max(-1.0);
    let snorm16 = |v: i16| (f32::from(v) / 32767.0).max(-1.0);

    match format {
        VertexFormat::Float32x3 => {
            let v: [f32; 3] = bytemuck::pod_read_unaligned(bytes);
            Some(Vec3::from(v).extend(1.0))
        }
        VertexFormat::Float32x4 => {
            let v: [f32; 4] = bytemuck::pod_read_unaligned(bytes);
            Some(Vec4::from(v))
        }
        VertexFormat::Snorm8x4 => Some(Vec4::new(
            snorm8(bytes[0]),
            snorm8(bytes[1]),
            snorm8(bytes[2]),
            snorm8(bytes[3]),
        )),
        VertexFormat::Snorm16x4 => {
            let v: [i16; 4] = bytemuck::pod_read_unaligned(bytes);
            Some(Vec4::new(snorm16(v[0]), snorm16(v[1]), snorm16(v[2]), snorm16(v[3])))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::asset::BufferView;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-2
    }

    #[test]
    fn identity_frame() {
        let q = tangent_frame(Vec3::Z, Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert!(q.abs_diff_eq(Quat::IDENTITY, 1e-6));
    }

    #[test]
    fn mirrored_bitangent_flips_w() {
        let q = tangent_frame(Vec3::Z, Some(Vec4::new(1.0, 0.0, 0.0, -1.0)));
        assert!(q.w < 0.0);
        let (_, _, handedness) = decode_tangent_frame(q);
        assert_eq!(handedness, -1.0);
    }

    #[test]
    fn packed_frames_round_trip_within_half_precision() {
        let normals = [
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.3, -0.5, 0.8).normalize(),
            Vec3::new(-1.0, 0.0, 0.0),
        ];
        let tangents = [
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            Vec4::new(0.0, 0.8, 0.5, -1.0),
            Vec4::new(0.0, 0.0, 1.0, 1.0),
        ];
        let packed = pack_tangent_frames(&normals, Some(&tangents[..]));

        for ((frame, n), t) in packed.iter().zip(normals).zip(tangents) {
            let (dn, dt, h) = decode_tangent_frame(unpack_half4(*frame));
            let expected_t = (t.truncate() - n * n.dot(t.truncate())).normalize();
            assert!(approx(dn, n), "normal {dn} != {n}");
            assert!(approx(dt, expected_t), "tangent {dt} != {expected_t}");
            assert_eq!(h, t.w.signum());
        }
    }

    #[test]
    fn missing_tangent_is_synthesized_orthogonal() {
        let n = Vec3::new(0.0, 0.6, 0.8);
        let (dn, dt, h) = decode_tangent_frame(tangent_frame(n, None));
        assert!(approx(dn, n));
        assert!(dt.dot(n).abs() < 1e-4);
        assert_eq!(h, 1.0);
    }

    #[test]
    fn w_never_reaches_zero() {
        // 180 degree rotation about X: w would be exactly zero.
        let q = tangent_frame(Vec3::NEG_Z, Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert!(q.w >= W_BIAS * 0.5);
    }

    #[test]
    fn bytes_are_eight_per_vertex() {
        let packed = pack_tangent_frames(&[Vec3::Z, Vec3::Y], None);
        assert_eq!(tangent_frames_to_bytes(&packed).len(), 16);
    }

    #[test]
    fn reads_strided_floats_and_rejects_overrun() {
        // Two vertices, stride 16, float3 normal at the start of each.
        let mut buffer = vec![0u8; 32];
        buffer[0..12].copy_from_slice(bytemuck::cast_slice(&[0.0f32, 0.0, 1.0]));
        buffer[16..28].copy_from_slice(bytemuck::cast_slice(&[0.0f32, 1.0, 0.0]));

        let mut accessor = Accessor {
            view: BufferView {
                uri: "n.bin".into(),
                offset: 0,
                stride: Some(16),
            },
            offset: 0,
            count: 2,
            format: VertexFormat::Float32x3,
        };
        assert_eq!(read_vec3s(&buffer, &accessor).unwrap(), vec![Vec3::Z, Vec3::Y]);

        accessor.count = 3;
        assert!(read_vec3s(&buffer, &accessor).is_none());
    }

    #[test]
    fn oversized_stride_or_offset_is_rejected() {
        let buffer = vec![0u8; 64];
        let mut accessor = Accessor {
            view: BufferView {
                uri: "n.bin".into(),
                offset: 0,
                stride: Some(usize::MAX / 2),
            },
            offset: 0,
            count: 4,
            format: VertexFormat::Float32x3,
        };
        assert!(read_vec3s(&buffer, &accessor).is_none());

        accessor.view.stride = None;
        accessor.view.offset = usize::MAX;
        accessor.offset = 16;
        assert!(read_vec3s(&buffer, &accessor).is_none());

        accessor.view.offset = usize::MAX - 8;
        accessor.offset = 0;
        accessor.count = 1;
        assert!(read_vec3s(&buffer, &accessor).is_none());
    }

    #[test]
    fn reads_snorm16_tangents() {
        let raw: [i16; 4] = [32767, 0, 0, -32767];
        let accessor = Accessor {
            view: BufferView {
                uri: "t.bin".into(),
                offset: 0,
                stride: None,
            },
            offset: 0,
            count: 1,
            format: VertexFormat::Snorm16x4,
        };
        let v = read_vec4s(bytemuck::cast_slice(&raw), &accessor).unwrap();
        assert_eq!(v, vec![Vec4::new(1.0, 0.0, 0.0, -1.0)]);
    }
}
