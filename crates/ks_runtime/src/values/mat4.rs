//! Immutable 4x4 matrices, row-major, acting on column vectors.

use std::ffi::c_void;
use std::ops::Mul;

use ks_core::trap::trap;

use super::quat::{Quat, quat_of};
use super::vec3::{Vec3, vec3_object, vec3_of};
use super::{new_value, value_of};
use crate::errors::messages;

pub const MAT4_CLASS_ID: u64 = 0x4B53_0000_0000_0008;

const SINGULAR_EPSILON: f64 = 1e-15;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat4 {
    pub m: [f64; 16],
}

impl Default for Mat4 {
    fn default() -> Self {
        Mat4::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };
    pub const ZERO: Mat4 = Mat4 { m: [0.0; 16] };

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.m[row * 4 + col]
    }

    pub fn translate(t: Vec3) -> Mat4 {
        let mut r = Mat4::IDENTITY;
        r.m[3] = t.x;
        r.m[7] = t.y;
        r.m[11] = t.z;
        r
    }

    pub fn scale(s: Vec3) -> Mat4 {
        let mut r = Mat4::IDENTITY;
        r.m[0] = s.x;
        r.m[5] = s.y;
        r.m[10] = s.z;
        r
    }

    pub fn rotate_x(angle: f64) -> Mat4 {
        let (s, c) = angle.sin_cos();
        let mut r = Mat4::IDENTITY;
        r.m[5] = c;
        r.m[6] = -s;
        r.m[9] = s;
        r.m[10] = c;
        r
    }

    pub fn rotate_y(angle: f64) -> Mat4 {
        let (s, c) = angle.sin_cos();
        let mut r = Mat4::IDENTITY;
        r.m[0] = c;
        r.m[2] = s;
        r.m[8] = -s;
        r.m[10] = c;
        r
    }

    pub fn rotate_z(angle: f64) -> Mat4 {
        let (s, c) = angle.sin_cos();
        let mut r = Mat4::IDENTITY;
        r.m[0] = c;
        r.m[1] = -s;
        r.m[4] = s;
        r.m[5] = c;
        r
    }

    /// Rotation matrix of a unit quaternion.
    pub fn from_quat(q: Quat) -> Mat4 {
        let Quat { w, x, y, z } = q.normalize();
        let mut r = Mat4::IDENTITY;
        r.m[0] = 1.0 - 2.0 * (y * y + z * z);
        r.m[1] = 2.0 * (x * y - w * z);
        r.m[2] = 2.0 * (x * z + w * y);
        r.m[4] = 2.0 * (x * y + w * z);
        r.m[5] = 1.0 - 2.0 * (x * x + z * z);
        r.m[6] = 2.0 * (y * z - w * x);
        r.m[8] = 2.0 * (x * z - w * y);
        r.m[9] = 2.0 * (y * z + w * x);
        r.m[10] = 1.0 - 2.0 * (x * x + y * y);
        r
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Mat4 {
        Mat4 {
            m: self.m.map(f),
        }
    }

    fn zip(&self, o: &Mat4, f: impl Fn(f64, f64) -> f64) -> Mat4 {
        let mut m = [0.0; 16];
        for (i, slot) in m.iter_mut().enumerate() {
            *slot = f(self.m[i], o.m[i]);
        }
        Mat4 { m }
    }

    pub fn transpose(&self) -> Mat4 {
        let mut r = Mat4::ZERO;
        for row in 0..4 {
            for col in 0..4 {
                r.m[col * 4 + row] = self.get(row, col);
            }
        }
        r
    }

    /// 2x2 minors of the top two rows (`s`) and the bottom two rows (`c`).
    fn minors(&self) -> ([f64; 6], [f64; 6]) {
        let a = &self.m;
        let s = [
            a[0] * a[5] - a[1] * a[4],
            a[0] * a[6] - a[2] * a[4],
            a[0] * a[7] - a[3] * a[4],
            a[1] * a[6] - a[2] * a[5],
            a[1] * a[7] - a[3] * a[5],
            a[2] * a[7] - a[3] * a[6],
        ];
        let c = [
            a[8] * a[13] - a[9] * a[12],
            a[8] * a[14] - a[10] * a[12],
            a[8] * a[15] - a[11] * a[12],
            a[9] * a[14] - a[10] * a[13],
            a[9] * a[15] - a[11] * a[13],
            a[10] * a[15] - a[11] * a[14],
        ];
        (s, c)
    }

    pub fn det(&self) -> f64 {
        let (s, c) = self.minors();
        s[0] * c[5] - s[1] * c[4] + s[2] * c[3] + s[3] * c[2] - s[4] * c[1] + s[5] * c[0]
    }

    /// Inverse by cofactor expansion, or `None` when singular.
    pub fn inverse(&self) -> Option<Mat4> {
        let (s, c) = self.minors();
        let det = s[0] * c[5] - s[1] * c[4] + s[2] * c[3] + s[3] * c[2] - s[4] * c[1] + s[5] * c[0];
        if det.abs() < SINGULAR_EPSILON {
            return None;
        }
        let a = &self.m;
        let r = [
            a[5] * c[5] - a[6] * c[4] + a[7] * c[3],
            -a[1] * c[5] + a[2] * c[4] - a[3] * c[3],
            a[13] * s[5] - a[14] * s[4] + a[15] * s[3],
            -a[9] * s[5] + a[10] * s[4] - a[11] * s[3],
            -a[4] * c[5] + a[6] * c[2] - a[7] * c[1],
            a[0] * c[5] - a[2] * c[2] + a[3] * c[1],
            -a[12] * s[5] + a[14] * s[2] - a[15] * s[1],
            a[8] * s[5] - a[10] * s[2] + a[11] * s[1],
            a[4] * c[4] - a[5] * c[2] + a[7] * c[0],
            -a[0] * c[4] + a[1] * c[2] - a[3] * c[0],
            a[12] * s[4] - a[13] * s[2] + a[15] * s[0],
            -a[8] * s[4] + a[9] * s[2] - a[11] * s[0],
            -a[4] * c[3] + a[5] * c[1] - a[6] * c[0],
            a[0] * c[3] - a[1] * c[1] + a[2] * c[0],
            -a[12] * s[3] + a[13] * s[1] - a[14] * s[0],
            a[8] * s[3] - a[9] * s[1] + a[10] * s[0],
        ];
        let inv = 1.0 / det;
        Some(Mat4 { m: r.map(|v| v * inv) })
    }

    /// `(x, y, z, 1)` through the matrix, with a perspective divide when
    /// the resulting `w` is neither zero nor one.
    pub fn transform_point(&self, v: Vec3) -> Vec3 {
        let a = &self.m;
        let mut x = a[0] * v.x + a[1] * v.y + a[2] * v.z + a[3];
        let mut y = a[4] * v.x + a[5] * v.y + a[6] * v.z + a[7];
        let mut z = a[8] * v.x + a[9] * v.y + a[10] * v.z + a[11];
        let w = a[12] * v.x + a[13] * v.y + a[14] * v.z + a[15];
        if w.abs() > SINGULAR_EPSILON && (w - 1.0).abs() > SINGULAR_EPSILON {
            x /= w;
            y /= w;
            z /= w;
        }
        Vec3::new(x, y, z)
    }

    /// `(x, y, z, 0)` through the matrix; translation does not apply.
    pub fn transform_vec(&self, v: Vec3) -> Vec3 {
        let a = &self.m;
        Vec3::new(
            a[0] * v.x + a[1] * v.y + a[2] * v.z,
            a[4] * v.x + a[5] * v.y + a[6] * v.z,
            a[8] * v.x + a[9] * v.y + a[10] * v.z,
        )
    }

    pub fn approx_eq(&self, o: &Mat4, epsilon: f64) -> bool {
        let epsilon = if epsilon <= 0.0 { 1e-9 } else { epsilon };
        self.m.iter().zip(&o.m).all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Mul for Mat4 {
    type Output = Mat4;
    fn mul(self, o: Mat4) -> Mat4 {
        let mut r = Mat4::ZERO;
        for row in 0..4 {
            for col in 0..4 {
                r.m[row * 4 + col] = (0..4).map(|k| self.get(row, k) * o.get(k, col)).sum();
            }
        }
        r
    }
}

pub fn mat4_object(m: Mat4) -> *mut c_void {
    new_value(MAT4_CLASS_ID, m)
}

/// # Safety
/// `obj` must be null or a live object.
pub unsafe fn mat4_of(obj: *mut c_void) -> Mat4 {
    unsafe { value_of(obj, MAT4_CLASS_ID, messages::NOT_A_MAT4) }
}

#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn rt_mat4_new(
    m00: f64,
    m01: f64,
    m02: f64,
    m03: f64,
    m10: f64,
    m11: f64,
    m12: f64,
    m13: f64,
    m20: f64,
    m21: f64,
    m22: f64,
    m23: f64,
    m30: f64,
    m31: f64,
    m32: f64,
    m33: f64,
) -> *mut c_void {
    mat4_object(Mat4 {
        m: [
            m00, m01, m02, m03, m10, m11, m12, m13, m20, m21, m22, m23, m30, m31, m32, m33,
        ],
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_mat4_identity() -> *mut c_void {
    mat4_object(Mat4::IDENTITY)
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_mat4_zero() -> *mut c_void {
    mat4_object(Mat4::ZERO)
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_mat4_translate(x: f64, y: f64, z: f64) -> *mut c_void {
    mat4_object(Mat4::translate(Vec3::new(x, y, z)))
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_mat4_scale(x: f64, y: f64, z: f64) -> *mut c_void {
    mat4_object(Mat4::scale(Vec3::new(x, y, z)))
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_mat4_rotate_x(angle: f64) -> *mut c_void {
    mat4_object(Mat4::rotate_x(angle))
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_mat4_rotate_y(angle: f64) -> *mut c_void {
    mat4_object(Mat4::rotate_y(angle))
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_mat4_rotate_z(angle: f64) -> *mut c_void {
    mat4_object(Mat4::rotate_z(angle))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_from_quat(q: *mut c_void) -> *mut c_void {
    mat4_object(Mat4::from_quat(unsafe { quat_of(q) }))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_get(m: *mut c_void, row: i64, col: i64) -> f64 {
    let m = unsafe { mat4_of(m) };
    if !(0..4).contains(&row) || !(0..4).contains(&col) {
        trap(messages::MAT4_INDEX);
    }
    m.get(row as usize, col as usize)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_add(a: *mut c_void, b: *mut c_void) -> *mut c_void {
    let (a, b) = unsafe { (mat4_of(a), mat4_of(b)) };
    mat4_object(a.zip(&b, |x, y| x + y))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_sub(a: *mut c_void, b: *mut c_void) -> *mut c_void {
    let (a, b) = unsafe { (mat4_of(a), mat4_of(b)) };
    mat4_object(a.zip(&b, |x, y| x - y))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_mul(a: *mut c_void, b: *mut c_void) -> *mut c_void {
    mat4_object(unsafe { mat4_of(a) * mat4_of(b) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_mul_scalar(m: *mut c_void, s: f64) -> *mut c_void {
    mat4_object(unsafe { mat4_of(m) }.map(|x| x * s))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_neg(m: *mut c_void) -> *mut c_void {
    mat4_object(unsafe { mat4_of(m) }.map(|x| -x))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_transpose(m: *mut c_void) -> *mut c_void {
    mat4_object(unsafe { mat4_of(m) }.transpose())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_det(m: *mut c_void) -> f64 {
    unsafe { mat4_of(m) }.det()
}

/// Singular matrices invert to the identity.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_inverse(m: *mut c_void) -> *mut c_void {
    match unsafe { mat4_of(m) }.inverse() {
        Some(inv) => mat4_object(inv),
        None => {
            log::warn!("inverse of a singular matrix, returning identity");
            mat4_object(Mat4::IDENTITY)
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_transform_point(m: *mut c_void, v: *mut c_void) -> *mut c_void {
    vec3_object(unsafe { mat4_of(m).transform_point(vec3_of(v)) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_transform_vec(m: *mut c_void, v: *mut c_void) -> *mut c_void {
    vec3_object(unsafe { mat4_of(m).transform_vec(vec3_of(v)) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_mat4_eq(a: *mut c_void, b: *mut c_void, epsilon: f64) -> bool {
    unsafe { mat4_of(a).approx_eq(&mat4_of(b), epsilon) }
}
