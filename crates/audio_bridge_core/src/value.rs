//! Host value model
//!
//! Everything the host scripting environment can hand to a constructor or a
//! method is represented as a [`HostValue`]. The bridge never looks at host
//! values through any other lens: coercion, sequence sanitizing and option
//! parsing all operate on this enum.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::AudioBuffer;
use crate::context::AudioContext;
use crate::node::NodeRef;
use crate::param::ParamRef;

/// Key/value structure passed as an options dictionary.
pub type HostObject = BTreeMap<String, HostValue>;

/// A host typed array. Clones share the same backing storage, the way two
/// host variables can point at the same `Float32Array`.
#[derive(Debug, Default)]
pub struct TypedArray<T> {
    data: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for TypedArray<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Copy + Default> TypedArray<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self {
            data: Arc::new(RwLock::new(values)),
        }
    }

    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![T::default(); len])
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.data.read().clone()
    }

    /// Overwrite the array contents starting at index 0. Extra source values
    /// are ignored; the array length never changes.
    pub fn write(&self, values: &[T]) {
        let mut guard = self.data.write();
        let n = guard.len().min(values.len());
        guard[..n].copy_from_slice(&values[..n]);
    }

    /// Copy into `dst` without blocking. Returns the number of values copied,
    /// or `None` when a writer holds the array.
    pub fn try_read_into(&self, dst: &mut [T]) -> Option<usize> {
        let guard = self.data.try_read()?;
        let n = guard.len().min(dst.len());
        dst[..n].copy_from_slice(&guard[..n]);
        Some(n)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl<T: Copy + Default> From<Vec<T>> for TypedArray<T> {
    fn from(values: Vec<T>) -> Self {
        Self::new(values)
    }
}

#[derive(Debug, Clone, Default)]
pub enum HostValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<HostValue>),
    Object(HostObject),
    Float32Array(TypedArray<f32>),
    Float64Array(TypedArray<f64>),
    Context(AudioContext),
    Node(NodeRef),
    Param(ParamRef),
    AudioBuffer(Arc<AudioBuffer>),
}

impl HostValue {
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, HostValue)>,
    {
        HostValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    /// Anything the host would answer `typeof value === 'object'` for, minus
    /// `null`.
    pub fn is_object_like(&self) -> bool {
        !matches!(
            self,
            HostValue::Undefined
                | HostValue::Null
                | HostValue::Boolean(_)
                | HostValue::Number(_)
                | HostValue::String(_)
        )
    }

    /// Host truthiness, used to decide whether an options argument counts as
    /// supplied.
    pub fn is_truthy(&self) -> bool {
        match self {
            HostValue::Undefined | HostValue::Null => false,
            HostValue::Boolean(b) => *b,
            HostValue::Number(n) => *n != 0.0 && !n.is_nan(),
            HostValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Look up a member on an object-like value. Only dictionaries carry
    /// members; every other shape answers `None`.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        match self {
            HostValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn to_number(&self) -> f64 {
        match self {
            HostValue::Undefined => f64::NAN,
            HostValue::Null => 0.0,
            HostValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            HostValue::Number(n) => *n,
            HostValue::String(s) => string_to_number(s),
            HostValue::Array(_) | HostValue::Float32Array(_) | HostValue::Float64Array(_) => {
                string_to_number(&self.to_string())
            }
            _ => f64::NAN,
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        t if t.len() > 2 && t.is_char_boundary(2) => match &t[..2] {
            "0x" | "0X" => radix_to_number(&t[2..], 16),
            "0o" | "0O" => radix_to_number(&t[2..], 8),
            "0b" | "0B" => radix_to_number(&t[2..], 2),
            _ => decimal_to_number(t),
        },
        t => decimal_to_number(t),
    }
}

fn decimal_to_number(t: &str) -> f64 {
    match t {
        // Rust accepts "inf"/"nan" spellings the host does not.
        t if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        t => t.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Unsigned integer literal after a `0x`/`0o`/`0b` prefix. Wider than `u64`
/// values keep accumulating as floats.
fn radix_to_number(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    digits
        .chars()
        .try_fold(0.0f64, |acc, c| {
            c.to_digit(radix).map(|d| acc * radix as f64 + d as f64)
        })
        .unwrap_or(f64::NAN)
}

/// Host formatting of a number: shortest round-trip digits, plain decimal
/// for decimal exponents in `-6..21`, `1e+21` / `1e-7` style otherwise.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        let sign = if n < 0.0 { "-" } else { "" };
        format!("{}{}", sign, format_finite(n.abs()))
    }
}

fn format_finite(n: f64) -> String {
    // `{:e}` yields the shortest round-trip digits as `d[.ddd]e<exp>`
    let scientific = format!("{:e}", n);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    // position of the decimal point relative to the digit string
    let point = exponent + 1;

    if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{}.{}", int, frac)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let exp_sign = if point - 1 < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", first, exp_sign, (point - 1).abs())
        } else {
            format!("{}.{}e{}{}", first, rest, exp_sign, (point - 1).abs())
        }
    }
}

fn join<T, F>(items: &[T], f: F) -> String
where
    F: Fn(&T) -> String,
{
    items.iter().map(f).collect::<Vec<_>>().join(",")
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => write!(f, "undefined"),
            HostValue::Null => write!(f, "null"),
            HostValue::Boolean(b) => write!(f, "{}", b),
            HostValue::Number(n) => write!(f, "{}", format_number(*n)),
            HostValue::String(s) => write!(f, "{}", s),
            HostValue::Array(items) => {
                // nested null/undefined print as empty strings
                let s = join(items, |v| match v {
                    HostValue::Undefined | HostValue::Null => String::new(),
                    other => other.to_string(),
                });
                write!(f, "{}", s)
            }
            HostValue::Object(_) => write!(f, "[object Object]"),
            HostValue::Float32Array(arr) => {
                write!(f, "{}", join(&arr.to_vec(), |v| format_number(*v as f64)))
            }
            HostValue::Float64Array(arr) => {
                write!(f, "{}", join(&arr.to_vec(), |v| format_number(*v)))
            }
            HostValue::Context(ctx) => write!(f, "[object {}]", ctx.display_name()),
            HostValue::Node(node) => write!(f, "[object {}]", node.kind().name()),
            HostValue::Param(_) => write!(f, "[object AudioParam]"),
            HostValue::AudioBuffer(_) => write!(f, "[object AudioBuffer]"),
        }
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<f32> for HostValue {
    fn from(n: f32) -> Self {
        HostValue::Number(n as f64)
    }
}

impl From<u32> for HostValue {
    fn from(n: u32) -> Self {
        HostValue::Number(n as f64)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Boolean(b)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        HostValue::Array(items)
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => HostValue::Null,
            serde_json::Value::Bool(b) => HostValue::Boolean(b),
            serde_json::Value::Number(n) => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => HostValue::String(s),
            serde_json::Value::Array(items) => {
                HostValue::Array(items.into_iter().map(HostValue::from).collect())
            }
            serde_json::Value::Object(map) => HostValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, HostValue::from(v)))
                    .collect(),
            ),
        }
    }
}
