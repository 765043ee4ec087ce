//! Conversion of array-like host values into fixed element type buffers.
//!
//! Used for numeric array options such as filter coefficients. The error
//! reason returned here is the tail of the host message; callers prepend
//! their own `... The provided value ` prefix.

use crate::error::{BridgeError, Result};
use crate::value::HostValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Float32,
    Float64,
}

impl ElementKind {
    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Float32 => "Float32Array",
            ElementKind::Float64 => "Float64Array",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedSequence {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl TypedSequence {
    pub fn len(&self) -> usize {
        match self {
            TypedSequence::Float32(v) => v.len(),
            TypedSequence::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            TypedSequence::Float32(v) => v.iter().map(|x| *x as f64).collect(),
            TypedSequence::Float64(v) => v.clone(),
        }
    }
}

fn elements(value: &HostValue) -> Option<Vec<f64>> {
    match value {
        HostValue::Array(items) => Some(items.iter().map(HostValue::to_number).collect()),
        HostValue::Float32Array(arr) => Some(arr.to_vec().into_iter().map(|v| v as f64).collect()),
        HostValue::Float64Array(arr) => Some(arr.to_vec()),
        _ => None,
    }
}

/// Convert `value` into a buffer of `kind` elements, preserving order and
/// length. On failure the returned [`BridgeError::Conversion`] carries only
/// the reason, e.g. `(a,b) contains a non-finite element at index 0.`
pub fn to_typed_sequence(value: &HostValue, kind: ElementKind) -> Result<TypedSequence> {
    let Some(numbers) = elements(value) else {
        return Err(BridgeError::Conversion(format!(
            "({}) cannot be converted to a sequence.",
            value
        )));
    };

    let bad_index = numbers.iter().position(|n| match kind {
        ElementKind::Float64 => !n.is_finite(),
        ElementKind::Float32 => !(*n as f32).is_finite(),
    });

    if let Some(index) = bad_index {
        return Err(BridgeError::Conversion(format!(
            "({}) contains a non-finite element at index {}.",
            value, index
        )));
    }

    Ok(match kind {
        ElementKind::Float32 => TypedSequence::Float32(numbers.iter().map(|n| *n as f32).collect()),
        ElementKind::Float64 => TypedSequence::Float64(numbers),
    })
}
