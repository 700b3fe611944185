//! Immutable quaternions `w + xi + yj + zk`.

use std::ffi::c_void;
use std::ops::Mul;

use super::vec3::{Vec3, vec3_object, vec3_of};
use super::{new_value, value_of};
use crate::errors::messages;

pub const QUAT_CLASS_ID: u64 = 0x4B53_0000_0000_0007;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quat {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quat {
    fn default() -> Self {
        Quat::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Quat = Quat::new(1.0, 0.0, 0.0, 0.0);

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `angle` radians about `axis`. A zero axis yields the
    /// identity.
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Quat {
        let axis = axis.normalize();
        if axis == Vec3::ZERO {
            return Quat::IDENTITY;
        }
        let (s, c) = (angle * 0.5).sin_cos();
        Quat::new(c, axis.x * s, axis.y * s, axis.z * s)
    }

    pub fn conjugate(self) -> Quat {
        Quat::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn len(self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(self) -> Quat {
        let len = self.len();
        if len == 0.0 {
            return Quat::IDENTITY;
        }
        Quat::new(self.w / len, self.x / len, self.y / len, self.z / len)
    }

    pub fn inverse(self) -> Quat {
        let n = self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z;
        if n == 0.0 {
            return Quat::IDENTITY;
        }
        let c = self.conjugate();
        Quat::new(c.w / n, c.x / n, c.y / n, c.z / n)
    }

    /// `v` rotated by this (unit) quaternion.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = self * Quat::new(0.0, v.x, v.y, v.z) * self.conjugate();
        Vec3::new(p.x, p.y, p.z)
    }
}

/// Hamilton product: `a * b` applies `b` first.
impl Mul for Quat {
    type Output = Quat;
    fn mul(self, b: Quat) -> Quat {
        let a = self;
        Quat::new(
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        )
    }
}

pub fn quat_object(q: Quat) -> *mut c_void {
    new_value(QUAT_CLASS_ID, q)
}

/// # Safety
/// `obj` must be null or a live object.
pub unsafe fn quat_of(obj: *mut c_void) -> Quat {
    unsafe { value_of(obj, QUAT_CLASS_ID, messages::NOT_A_QUAT) }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_quat_new(w: f64, x: f64, y: f64, z: f64) -> *mut c_void {
    quat_object(Quat::new(w, x, y, z))
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_quat_identity() -> *mut c_void {
    quat_object(Quat::IDENTITY)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_quat_from_axis_angle(axis: *mut c_void, angle: f64) -> *mut c_void {
    quat_object(Quat::from_axis_angle(unsafe { vec3_of(axis) }, angle))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_quat_w(q: *mut c_void) -> f64 {
    unsafe { quat_of(q) }.w
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_quat_x(q: *mut c_void) -> f64 {
    unsafe { quat_of(q) }.x
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_quat_y(q: *mut c_void) -> f64 {
    unsafe { quat_of(q) }.y
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_quat_z(q: *mut c_void) -> f64 {
    unsafe { quat_of(q) }.z
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_quat_mul(a: *mut c_void, b: *mut c_void) -> *mut c_void {
    quat_object(unsafe { quat_of(a) * quat_of(b) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_quat_conjugate(q: *mut c_void) -> *mut c_void {
    quat_object(unsafe { quat_of(q) }.conjugate())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_quat_inverse(q: *mut c_void) -> *mut c_void {
    quat_object(unsafe { quat_of(q) }.inverse())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_quat_len(q: *mut c_void) -> f64 {
    unsafe { quat_of(q) }.len()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_quat_norm(q: *mut c_void) -> *mut c_void {
    quat_object(unsafe { quat_of(q) }.normalize())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_quat_rotate(q: *mut c_void, v: *mut c_void) -> *mut c_void {
    vec3_object(unsafe { quat_of(q).rotate(vec3_of(v)) })
}
