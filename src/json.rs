//! Typed member access over `serde_json::Value` objects.
//!
//! Small helpers shared by the per-type `read` implementations. Missing or
//! wrongly-typed members read as `None`; callers pick their own defaults.

use glam::{Mat4, Quat, Vec3};
use serde_json::{Map, Value};

pub(crate) type JsonObject = Map<String, Value>;

pub(crate) fn member_str<'a>(obj: &'a JsonObject, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

pub(crate) fn member_u32(obj: &JsonObject, key: &str) -> Option<u32> {
    obj.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

pub(crate) fn member_usize(obj: &JsonObject, key: &str) -> Option<usize> {
    obj.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
}

pub(crate) fn member_f64_array(obj: &JsonObject, key: &str) -> Option<Vec<f64>> {
    let arr = obj.get(key)?.as_array()?;
    arr.iter().map(Value::as_f64).collect()
}

fn member_f32s<const N: usize>(obj: &JsonObject, key: &str) -> Option<[f32; N]> {
    let arr = obj.get(key)?.as_array()?;
    if arr.len() != N {
        return None;
    }
    let mut out = [0.0f32; N];
    for (slot, v) in out.iter_mut().zip(arr) {
        *slot = v.as_f64()? as f32;
    }
    Some(out)
}

pub(crate) fn member_vec3(obj: &JsonObject, key: &str) -> Option<Vec3> {
    member_f32s::<3>(obj, key).map(Vec3::from_array)
}

pub(crate) fn member_quat(obj: &JsonObject, key: &str) -> Option<Quat> {
    member_f32s::<4>(obj, key).map(Quat::from_array)
}

/// Reads a column-major 16-float array as a matrix.
pub(crate) fn member_mat4(obj: &JsonObject, key: &str) -> Option<Mat4> {
    member_f32s::<16>(obj, key).map(|a| Mat4::from_cols_array(&a))
}

/// Iterates a member array's string elements; non-strings are skipped.
pub(crate) fn member_str_array<'a>(
    obj: &'a JsonObject,
    key: &str,
) -> impl Iterator<Item = &'a str> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_str)
}
