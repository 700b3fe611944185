use std::f64::consts::FRAC_PI_2;
use std::ffi::c_void;
use std::ptr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ks_core::boxed::BoxTag;
use ks_core::gc::{self, VisitFn};
use ks_core::{heap, object, string, weak};
use ks_runtime::values::bitset::*;
use ks_runtime::values::boxed::*;
use ks_runtime::values::mat4::*;
use ks_runtime::values::option::*;
use ks_runtime::values::quat::*;
use ks_runtime::values::result::*;
use ks_runtime::values::vec3::*;

static LOCK: Mutex<()> = Mutex::new(());

fn setup() -> MutexGuard<'static, ()> {
    let _ = env_logger::builder().is_test(true).try_init();
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

fn s(text: &str) -> *mut c_void {
    string::string_from_str(text)
}

/// Contents of an owned string, releasing it.
fn take(p: *mut c_void) -> String {
    let text = String::from_utf8(unsafe { string::string_bytes(p) }.to_vec()).unwrap();
    unsafe { heap::release(p) };
    text
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ==================== Option / Result ====================

#[test]
fn option_some_and_none() {
    let _g = setup();
    unsafe {
        let some = rt_option_some_i64(42);
        let none = rt_option_none();
        assert!(rt_option_is_some(some));
        assert!(rt_option_is_none(none));
        assert_eq!(rt_option_unwrap_i64(some), 42);
        assert_eq!(rt_option_unwrap_or_i64(none, 7), 7);
        assert_eq!(rt_option_unwrap_or_f64(none, 1.5), 1.5);
        assert_eq!(take(rt_option_to_str(some)), "Some(42)");
        assert_eq!(take(rt_option_to_str(none)), "None");
        assert_eq!(take(rt_option_to_str(rt_option_some_f64(2.5))), "Some(2.5)");
        assert_eq!(take(rt_option_to_str(rt_option_some_i1(true))), "Some(true)");
        heap::release(some);
        heap::release(none);
    }
}

#[test]
fn option_holds_a_reference_to_its_string() {
    let _g = setup();
    unsafe {
        let text = s("hi");
        let opt = rt_option_some_str(text);
        assert_eq!(heap::refcount(text), 2);
        let out = rt_option_unwrap_str(opt);
        assert_eq!(out, text);
        assert_eq!(heap::refcount(text), 3);
        heap::release(out);
        assert_eq!(take(rt_option_to_str(opt)), "Some(hi)");
        heap::release(opt);
        assert_eq!(heap::refcount(text), 1);
        let fallback = s("fallback");
        let none = rt_option_none();
        assert_eq!(take(rt_option_unwrap_or_str(none, fallback)), "fallback");
        heap::release(none);
        heap::release(fallback);
        heap::release(text);
    }
}

#[test]
#[should_panic(expected = "trap: Option: unwrap of none")]
fn unwrapping_none_traps() {
    unsafe { option_unwrap(option_none()) };
}

#[test]
#[should_panic(expected = "trap: Option: object is not an option")]
fn option_accessors_reject_other_objects() {
    unsafe { option_value(vec3_object(Vec3::ZERO)) };
}

#[test]
fn result_ok_and_err() {
    let _g = setup();
    unsafe {
        let ok = rt_result_ok_i64(7);
        let msg = s("bad input");
        let err = rt_result_err_str(msg);
        assert!(rt_result_is_ok(ok));
        assert!(rt_result_is_err(err));
        assert_eq!(rt_result_unwrap_i64(ok), 7);
        assert_eq!(rt_result_unwrap_or_i64(err, -1), -1);
        assert_eq!(take(rt_result_unwrap_err_str(err)), "bad input");
        assert_eq!(rt_result_unwrap_err_i64(rt_result_err_i64(404)), 404);
        assert_eq!(take(rt_result_to_str(ok)), "Ok(7)");
        assert_eq!(take(rt_result_to_str(err)), "Err(bad input)");
        heap::release(ok);
        heap::release(err);
        heap::release(msg);
    }
}

#[test]
#[should_panic(expected = "trap: Result: unwrap of err")]
fn unwrapping_err_traps() {
    unsafe { result_unwrap(rt_result_err_i64(1)) };
}

#[test]
#[should_panic(expected = "trap: Result: unwrap_err of ok")]
fn unwrap_err_of_ok_traps() {
    unsafe { result_unwrap_err(rt_result_ok_i64(1)) };
}

// ==================== Boxes ====================

#[test]
fn boxes_render_as_text() {
    let _g = setup();
    unsafe {
        let b = rt_box_i64(-5);
        assert_eq!(rt_box_tag(b), BoxTag::I64 as i64);
        assert_eq!(rt_unbox_i64(b), -5);
        assert_eq!(take(rt_box_to_str(b)), "-5");
        assert_eq!(take(rt_box_to_str(rt_box_f64(0.25))), "0.25");
        assert_eq!(take(rt_box_to_str(rt_box_i1(false))), "false");

        let nested = rt_option_some_obj(b);
        assert_eq!(take(rt_option_to_str(nested)), "Some(-5)");
        let v = vec3_object(Vec3::ONE);
        let other = rt_result_ok_obj(v);
        assert_eq!(take(rt_result_to_str(other)), "Ok(<object>)");
        let null = rt_option_some_obj(ptr::null_mut());
        assert_eq!(take(rt_option_to_str(null)), "Some(null)");
        for p in [nested, other, null, v, b] {
            heap::release(p);
        }
    }
}

// ==================== Collector ====================

/// Object with one strong child.
#[repr(C)]
struct Holder {
    child: *mut c_void,
}

unsafe extern "C" fn holder_traverse(obj: *mut c_void, visit: VisitFn, ctx: *mut c_void) {
    let child = unsafe { object::fields::<Holder>(obj) }.child;
    if !child.is_null() {
        unsafe { visit(child, ctx) };
    }
}

unsafe extern "C" fn holder_finalize(obj: *mut c_void) {
    let h = unsafe { object::fields::<Holder>(obj) };
    let child = std::mem::replace(&mut h.child, ptr::null_mut());
    unsafe { heap::release(child) };
}

#[test]
fn cycle_through_an_option_is_collected() {
    let _g = setup();
    gc::global().reset();
    unsafe {
        let holder = object::new_object(0x484F_4C44, size_of::<Holder>());
        object::set_finalizer(holder, Some(holder_finalize));
        gc::track(holder, holder_traverse);

        let opt = rt_option_some_obj(holder);
        assert!(gc::global().is_tracked(opt));
        object::fields::<Holder>(holder).child = opt;
        let w = weak::weak_new(holder);
        heap::release(holder);
        assert!(weak::weak_alive(w));

        assert_eq!(gc::collect(), 2);
        assert!(!weak::weak_alive(w));
        weak::weak_free(w);
    }
}

#[test]
fn scalar_options_are_not_tracked() {
    let _g = setup();
    let opt = rt_option_some_i64(1);
    assert!(!gc::global().is_tracked(opt));
    unsafe { heap::release(opt) };
}

// ==================== Bitset ====================

#[test]
fn bitset_operations() {
    let _g = setup();
    unsafe {
        let a = rt_bitset_new(70);
        assert_eq!(rt_bitset_len(a), 70);
        assert!(rt_bitset_none(a));
        rt_bitset_set(a, 0);
        rt_bitset_set(a, 65);
        rt_bitset_set(a, 69);
        assert_eq!(rt_bitset_count(a), 3);
        assert!(rt_bitset_get(a, 65));
        assert!(!rt_bitset_get(a, 64));
        rt_bitset_toggle(a, 65);
        rt_bitset_clear(a, 69);
        assert_eq!(rt_bitset_count(a), 1);
        assert!(rt_bitset_any(a));

        let not = rt_bitset_not(a);
        assert_eq!(rt_bitset_count(not), 69);
        let and = rt_bitset_and(a, not);
        assert!(rt_bitset_none(and));
        let or = rt_bitset_or(a, not);
        assert_eq!(rt_bitset_count(or), 70);
        let xor = rt_bitset_xor(a, a);
        assert_eq!(rt_bitset_count(xor), 0);
        let same = rt_bitset_and(a, a);
        assert_eq!(rt_bitset_count(same), 1);

        let small = rt_bitset_new(5);
        rt_bitset_set(small, 1);
        rt_bitset_set(small, 4);
        assert_eq!(take(rt_bitset_to_str(small)), "01001");
        for p in [a, not, and, or, xor, same, small] {
            heap::release(p);
        }
    }
}

#[test]
fn empty_bitset() {
    let _g = setup();
    unsafe {
        let b = rt_bitset_new(0);
        assert_eq!(rt_bitset_len(b), 0);
        assert_eq!(take(rt_bitset_to_str(b)), "");
        let n = rt_bitset_not(b);
        assert_eq!(rt_bitset_count(n), 0);
        heap::release(b);
        heap::release(n);
    }
}

#[test]
#[should_panic(expected = "trap: Bitset: object is not a bitset")]
fn bitset_accessors_reject_other_objects() {
    unsafe { bitset_words(rt_option_none()) };
}

// ==================== Vec3 / Quat / Mat4 ====================

#[test]
fn vector_arithmetic() {
    let _g = setup();
    unsafe {
        let a = rt_vec3_new(1.0, 2.0, 3.0);
        let b = rt_vec3_new(4.0, 5.0, 6.0);
        let sum = rt_vec3_add(a, b);
        assert_eq!(vec3_of(sum), Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(rt_vec3_dot(a, b), 32.0);
        let c = rt_vec3_cross(a, b);
        assert_eq!(vec3_of(c), Vec3::new(-3.0, 6.0, -3.0));
        assert_eq!(rt_vec3_len_sq(a), 14.0);
        assert!(close(rt_vec3_dist(a, b), 27f64.sqrt()));
        let half = rt_vec3_lerp(a, b, 0.5);
        assert_eq!(vec3_of(half), Vec3::new(2.5, 3.5, 4.5));
        let n = rt_vec3_norm(b);
        assert!(close(rt_vec3_len(n), 1.0));
        let zero = rt_vec3_norm(rt_vec3_zero());
        assert_eq!(vec3_of(zero), Vec3::ZERO);
        let d = rt_vec3_div(rt_vec3_mul(a, 4.0), 2.0);
        assert_eq!((rt_vec3_x(d), rt_vec3_y(d), rt_vec3_z(d)), (2.0, 4.0, 6.0));
        assert_eq!(vec3_of(rt_vec3_neg(rt_vec3_one())), Vec3::new(-1.0, -1.0, -1.0));
        for p in [a, b, sum, c, half, n, zero, d] {
            heap::release(p);
        }
    }
}

#[test]
#[should_panic(expected = "trap: Vec3: object is not a vector")]
fn vector_accessors_reject_other_objects() {
    unsafe { vec3_of(quat_object(Quat::IDENTITY)) };
}

#[test]
fn quaternion_rotation() {
    let _g = setup();
    unsafe {
        let axis = rt_vec3_new(0.0, 0.0, 1.0);
        let q = rt_quat_from_axis_angle(axis, FRAC_PI_2);
        assert!(close(rt_quat_len(q), 1.0));
        let v = rt_quat_rotate(q, rt_vec3_new(1.0, 0.0, 0.0));
        let r = vec3_of(v);
        assert!(close(r.x, 0.0) && close(r.y, 1.0) && close(r.z, 0.0));

        let inv = rt_quat_inverse(q);
        let id = quat_of(rt_quat_mul(q, inv));
        assert!(close(id.w, 1.0) && close(id.x, 0.0) && close(id.y, 0.0) && close(id.z, 0.0));

        let c = rt_quat_conjugate(q);
        assert_eq!(rt_quat_z(c), -rt_quat_z(q));
        assert_eq!(rt_quat_w(rt_quat_identity()), 1.0);
        let n = rt_quat_norm(rt_quat_new(2.0, 0.0, 0.0, 0.0));
        assert_eq!(quat_of(n), Quat::IDENTITY);
        assert_eq!((rt_quat_x(n), rt_quat_y(n)), (0.0, 0.0));
    }
}

#[test]
fn quaternion_product_composes_rotations() {
    let z = Vec3::new(0.0, 0.0, 1.0);
    let quarter = Quat::from_axis_angle(z, FRAC_PI_2);
    let half = quarter * quarter;
    let r = half.rotate(Vec3::new(1.0, 0.0, 0.0));
    assert!(close(r.x, -1.0) && close(r.y, 0.0));
    assert_eq!(Quat::from_axis_angle(Vec3::ZERO, 1.0), Quat::IDENTITY);
}

#[test]
fn matrix_operations() {
    let _g = setup();
    unsafe {
        let t = rt_mat4_translate(1.0, 2.0, 3.0);
        let p = vec3_of(rt_mat4_transform_point(t, rt_vec3_zero()));
        assert_eq!(p, Vec3::new(1.0, 2.0, 3.0));
        let v = vec3_of(rt_mat4_transform_vec(t, rt_vec3_one()));
        assert_eq!(v, Vec3::ONE);
        assert_eq!(rt_mat4_get(t, 0, 3), 1.0);
        assert_eq!(rt_mat4_get(rt_mat4_transpose(t), 3, 1), 2.0);

        let s = rt_mat4_scale(2.0, 3.0, 4.0);
        assert_eq!(rt_mat4_det(s), 24.0);
        let inv = rt_mat4_inverse(s);
        assert!(rt_mat4_eq(rt_mat4_mul(s, inv), rt_mat4_identity(), 1e-12));

        let singular = rt_mat4_zero();
        assert!(rt_mat4_eq(rt_mat4_inverse(singular), rt_mat4_identity(), 0.0));

        let sum = rt_mat4_add(rt_mat4_identity(), rt_mat4_identity());
        assert!(rt_mat4_eq(sum, rt_mat4_mul_scalar(rt_mat4_identity(), 2.0), 0.0));
        let diff = rt_mat4_sub(sum, rt_mat4_identity());
        assert!(rt_mat4_eq(diff, rt_mat4_identity(), 0.0));
        assert_eq!(rt_mat4_get(rt_mat4_neg(diff), 2, 2), -1.0);

        let rz = rt_mat4_rotate_z(FRAC_PI_2);
        let q = rt_quat_from_axis_angle(rt_vec3_new(0.0, 0.0, 1.0), FRAC_PI_2);
        assert!(rt_mat4_eq(rz, rt_mat4_from_quat(q), 1e-12));
        let rx = mat4_of(rt_mat4_rotate_x(FRAC_PI_2));
        let y = rx.transform_vec(Vec3::new(0.0, 1.0, 0.0));
        assert!(close(y.z, 1.0));
        let ry = mat4_of(rt_mat4_rotate_y(FRAC_PI_2));
        let z = ry.transform_vec(Vec3::new(0.0, 0.0, 1.0));
        assert!(close(z.x, 1.0));
    }
}

#[test]
fn matrix_constructor_is_row_major() {
    let m = rt_mat4_new(
        1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0,
    );
    unsafe {
        assert_eq!(rt_mat4_get(m, 1, 0), 5.0);
        assert_eq!(rt_mat4_get(m, 0, 1), 2.0);
        assert_eq!(rt_mat4_det(m), 0.0);
        heap::release(m);
    }
}

#[test]
fn perspective_divide_applies_to_points() {
    let mut m = Mat4::IDENTITY;
    m.m[15] = 2.0;
    let p = m.transform_point(Vec3::new(2.0, 4.0, 6.0));
    assert_eq!(p, Vec3::new(1.0, 2.0, 3.0));
}

#[test]
#[should_panic(expected = "trap: Mat4: object is not a matrix")]
fn matrix_accessors_reject_other_objects() {
    unsafe { mat4_of(vec3_object(Vec3::ZERO)) };
}
