//! Immutable three-component vectors.

use std::ffi::c_void;
use std::ops::{Add, Mul, Neg, Sub};

use super::{new_value, value_of};
use crate::errors::messages;

pub const VEC3_CLASS_ID: u64 = 0x4B53_0000_0000_0006;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const ONE: Vec3 = Vec3::new(1.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, o: Vec3) -> f64 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    pub fn cross(self, o: Vec3) -> Vec3 {
        Vec3::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    pub fn len_sq(self) -> f64 {
        self.dot(self)
    }

    pub fn len(self) -> f64 {
        self.len_sq().sqrt()
    }

    pub fn dist(self, o: Vec3) -> f64 {
        (self - o).len()
    }

    /// Unit vector; the zero vector stays zero.
    pub fn normalize(self) -> Vec3 {
        let len = self.len();
        if len == 0.0 { Vec3::ZERO } else { self * (1.0 / len) }
    }

    pub fn lerp(self, o: Vec3, t: f64) -> Vec3 {
        self + (o - self) * t
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

pub fn vec3_object(v: Vec3) -> *mut c_void {
    new_value(VEC3_CLASS_ID, v)
}

/// # Safety
/// `obj` must be null or a live object.
pub unsafe fn vec3_of(obj: *mut c_void) -> Vec3 {
    unsafe { value_of(obj, VEC3_CLASS_ID, messages::NOT_A_VEC3) }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_vec3_new(x: f64, y: f64, z: f64) -> *mut c_void {
    vec3_object(Vec3::new(x, y, z))
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_vec3_zero() -> *mut c_void {
    vec3_object(Vec3::ZERO)
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_vec3_one() -> *mut c_void {
    vec3_object(Vec3::ONE)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_x(v: *mut c_void) -> f64 {
    unsafe { vec3_of(v) }.x
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_y(v: *mut c_void) -> f64 {
    unsafe { vec3_of(v) }.y
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_z(v: *mut c_void) -> f64 {
    unsafe { vec3_of(v) }.z
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_add(a: *mut c_void, b: *mut c_void) -> *mut c_void {
    vec3_object(unsafe { vec3_of(a) + vec3_of(b) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_sub(a: *mut c_void, b: *mut c_void) -> *mut c_void {
    vec3_object(unsafe { vec3_of(a) - vec3_of(b) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_mul(v: *mut c_void, s: f64) -> *mut c_void {
    vec3_object(unsafe { vec3_of(v) } * s)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_div(v: *mut c_void, s: f64) -> *mut c_void {
    vec3_object(unsafe { vec3_of(v) } * (1.0 / s))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_neg(v: *mut c_void) -> *mut c_void {
    vec3_object(-unsafe { vec3_of(v) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_dot(a: *mut c_void, b: *mut c_void) -> f64 {
    unsafe { vec3_of(a).dot(vec3_of(b)) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_cross(a: *mut c_void, b: *mut c_void) -> *mut c_void {
    vec3_object(unsafe { vec3_of(a).cross(vec3_of(b)) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_len(v: *mut c_void) -> f64 {
    unsafe { vec3_of(v) }.len()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_len_sq(v: *mut c_void) -> f64 {
    unsafe { vec3_of(v) }.len_sq()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_dist(a: *mut c_void, b: *mut c_void) -> f64 {
    unsafe { vec3_of(a).dist(vec3_of(b)) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_norm(v: *mut c_void) -> *mut c_void {
    vec3_object(unsafe { vec3_of(v) }.normalize())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_vec3_lerp(a: *mut c_void, b: *mut c_void, t: f64) -> *mut c_void {
    vec3_object(unsafe { vec3_of(a).lerp(vec3_of(b), t) })
}
