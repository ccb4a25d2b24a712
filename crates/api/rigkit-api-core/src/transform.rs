//! Minimal transform math for the bridge: enough to compose local TRS down a
//! hierarchy, take parent-relative offsets, and mirror positions. Rotations
//! are XYZ euler angles in degrees (host convention); matrices are row-major
//! with column vectors (v' = M * v).

use serde::{Deserialize, Serialize};

pub type Vec3 = [f32; 3];
pub type Mat4 = [[f32; 4]; 4];

pub fn vec3_add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn vec3_sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn vec3_lerp(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

pub fn vec3_length(a: Vec3) -> f32 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

pub fn mat4_identity() -> Mat4 {
    let mut m = [[0.0; 4]; 4];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

pub fn mat4_mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for (r, out_row) in out.iter_mut().enumerate() {
        for (c, cell) in out_row.iter_mut().enumerate() {
            *cell = (0..4).map(|k| a[r][k] * b[k][c]).sum();
        }
    }
    out
}

pub fn mat4_transform_point(m: &Mat4, p: Vec3) -> Vec3 {
    [
        m[0][0] * p[0] + m[0][1] * p[1] + m[0][2] * p[2] + m[0][3],
        m[1][0] * p[0] + m[1][1] * p[1] + m[1][2] * p[2] + m[1][3],
        m[2][0] * p[0] + m[2][1] * p[1] + m[2][2] * p[2] + m[2][3],
    ]
}

/// Inverse of an affine TRS matrix (general 3x3 linear part, no projection).
pub fn mat4_affine_inverse(m: &Mat4) -> Mat4 {
    // invert the 3x3 linear part via the adjugate
    let a = m;
    let det = a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);
    let inv_det = if det.abs() < 1e-12 { 0.0 } else { 1.0 / det };

    let mut inv = mat4_identity();
    inv[0][0] = (a[1][1] * a[2][2] - a[1][2] * a[2][1]) * inv_det;
    inv[0][1] = (a[0][2] * a[2][1] - a[0][1] * a[2][2]) * inv_det;
    inv[0][2] = (a[0][1] * a[1][2] - a[0][2] * a[1][1]) * inv_det;
    inv[1][0] = (a[1][2] * a[2][0] - a[1][0] * a[2][2]) * inv_det;
    inv[1][1] = (a[0][0] * a[2][2] - a[0][2] * a[2][0]) * inv_det;
    inv[1][2] = (a[0][2] * a[1][0] - a[0][0] * a[1][2]) * inv_det;
    inv[2][0] = (a[1][0] * a[2][1] - a[1][1] * a[2][0]) * inv_det;
    inv[2][1] = (a[0][1] * a[2][0] - a[0][0] * a[2][1]) * inv_det;
    inv[2][2] = (a[0][0] * a[1][1] - a[0][1] * a[1][0]) * inv_det;

    let t = [m[0][3], m[1][3], m[2][3]];
    let it = mat4_transform_point(
        &[
            [inv[0][0], inv[0][1], inv[0][2], 0.0],
            [inv[1][0], inv[1][1], inv[1][2], 0.0],
            [inv[2][0], inv[2][1], inv[2][2], 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
        t,
    );
    inv[0][3] = -it[0];
    inv[1][3] = -it[1];
    inv[2][3] = -it[2];
    inv
}

/// Local or world TRS. `rot` is XYZ euler in degrees, applied X first
/// (R = Rz * Ry * Rx).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub pos: Vec3,
    pub rot: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Transform {
            pos: [0.0; 3],
            rot: [0.0; 3],
            scale: [1.0; 3],
        }
    }

    pub fn from_pos(pos: Vec3) -> Self {
        Transform {
            pos,
            ..Self::identity()
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        let [x, y, z] = self.rot.map(f32::to_radians);
        let (sx, cx) = x.sin_cos();
        let (sy, cy) = y.sin_cos();
        let (sz, cz) = z.sin_cos();

        // R = Rz * Ry * Rx
        let r = [
            [cz * cy, cz * sy * sx - sz * cx, cz * sy * cx + sz * sx],
            [sz * cy, sz * sy * sx + cz * cx, sz * sy * cx - cz * sx],
            [-sy, cy * sx, cy * cx],
        ];

        let mut m = mat4_identity();
        for row in 0..3 {
            for col in 0..3 {
                m[row][col] = r[row][col] * self.scale[col];
            }
        }
        m[0][3] = self.pos[0];
        m[1][3] = self.pos[1];
        m[2][3] = self.pos[2];
        m
    }

    /// Decompose an affine TRS matrix. Assumes no shear; scale signs are
    /// folded into rotation the way the host does it.
    pub fn from_matrix(m: &Mat4) -> Self {
        let mut scale = [0.0f32; 3];
        for (col, s) in scale.iter_mut().enumerate() {
            *s = vec3_length([m[0][col], m[1][col], m[2][col]]);
        }

        let mut r = [[0.0f32; 3]; 3];
        for row in 0..3 {
            for col in 0..3 {
                let s = if scale[col].abs() < 1e-12 {
                    1.0
                } else {
                    scale[col]
                };
                r[row][col] = m[row][col] / s;
            }
        }

        let sy = (-r[2][0]).clamp(-1.0, 1.0);
        let y = sy.asin();
        let (x, z) = if sy.abs() < 0.999_999 {
            (r[2][1].atan2(r[2][2]), r[1][0].atan2(r[0][0]))
        } else {
            // gimbal lock: fold everything into x
            ((-r[1][2]).atan2(r[1][1]), 0.0)
        };

        Transform {
            pos: [m[0][3], m[1][3], m[2][3]],
            rot: [x.to_degrees(), y.to_degrees(), z.to_degrees()],
            scale,
        }
    }

    /// `parent * self`, i.e. this transform carried into the parent's space.
    pub fn compose(&self, parent: &Transform) -> Transform {
        Transform::from_matrix(&mat4_mul(&parent.to_matrix(), &self.to_matrix()))
    }

    /// Parent-relative offset: `inverse(reference) * self`.
    pub fn relative_to(&self, reference: &Transform) -> Transform {
        let inv = mat4_affine_inverse(&reference.to_matrix());
        Transform::from_matrix(&mat4_mul(&inv, &self.to_matrix()))
    }

    /// Normalise euler angles into (-180, 180], matching the host's
    /// adjust-euler command after a world rotation match.
    pub fn adjust_euler(&mut self) {
        for a in &mut self.rot {
            let mut v = *a % 360.0;
            if v > 180.0 {
                v -= 360.0;
            } else if v <= -180.0 {
                v += 360.0;
            }
            *a = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-3, "{a} vs {b}");
    }

    #[test]
    fn matrix_round_trip() {
        let t = Transform {
            pos: [1.0, 2.0, 3.0],
            rot: [30.0, -45.0, 60.0],
            scale: [1.0, 2.0, 0.5],
        };
        let back = Transform::from_matrix(&t.to_matrix());
        for i in 0..3 {
            assert_close(t.pos[i], back.pos[i]);
            assert_close(t.rot[i], back.rot[i]);
            assert_close(t.scale[i], back.scale[i]);
        }
    }

    #[test]
    fn compose_then_relative_recovers_local() {
        let parent = Transform {
            pos: [5.0, 0.0, 0.0],
            rot: [0.0, 90.0, 0.0],
            scale: [1.0; 3],
        };
        let local = Transform {
            pos: [0.0, 1.0, 0.0],
            rot: [0.0, 0.0, 45.0],
            scale: [1.0; 3],
        };
        let world = local.compose(&parent);
        let rel = world.relative_to(&parent);
        for i in 0..3 {
            assert_close(rel.pos[i], local.pos[i]);
            assert_close(rel.rot[i], local.rot[i]);
        }
    }

    #[test]
    fn adjust_euler_wraps() {
        let mut t = Transform::identity();
        t.rot = [270.0, -190.0, 360.0];
        t.adjust_euler();
        assert_close(t.rot[0], -90.0);
        assert_close(t.rot[1], 170.0);
        assert_close(t.rot[2], 0.0);
    }
}
