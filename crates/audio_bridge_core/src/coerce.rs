//! Coercion of arbitrary host values into strict primitives.
//!
//! Each target follows the host's own conversion rules (ToNumber, float
//! rounding, modulo integer wrapping) and fails with a
//! [`BridgeError::Conversion`] whose text is `"<context> <reason>"`. The
//! context is supplied by the call site and already names the offending
//! value, so messages stay byte-stable per node kind and argument.

use std::sync::Arc;

use crate::buffer::AudioBuffer;
use crate::error::{BridgeError, Result};
use crate::value::HostValue;

const UNSIGNED_LONG_MAX: f64 = 4_294_967_295.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoercionTarget {
    Float,
    UnrestrictedFloat,
    Double,
    UnrestrictedDouble,
    UnsignedLong { enforce_range: bool },
    Boolean,
    DomString,
    Enum {
        type_name: &'static str,
        allowed: &'static [&'static str],
    },
    AudioBufferOrNull,
    Any,
}

/// Result of a successful coercion.
#[derive(Debug, Clone)]
pub enum Coerced {
    Float(f32),
    Double(f64),
    UnsignedLong(u32),
    Boolean(bool),
    String(String),
    AudioBuffer(Option<Arc<AudioBuffer>>),
    Any(HostValue),
}

impl Coerced {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Coerced::Float(v) => Some(*v),
            Coerced::Double(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Coerced::Float(v) => Some(*v as f64),
            Coerced::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Coerced::UnsignedLong(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Coerced::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Coerced::String(v) => Some(v),
            _ => None,
        }
    }
}

fn fail(context: &str, reason: &str) -> BridgeError {
    BridgeError::Conversion(format!("{} {}", context, reason))
}

/// Round to the nearest single-precision value. Overflow yields infinity.
fn round_to_f32(n: f64) -> f32 {
    n as f32
}

pub fn to_float(value: &HostValue, context: &str) -> Result<f32> {
    let n = value.to_number();
    if !n.is_finite() {
        return Err(fail(context, "is not a finite floating-point value."));
    }
    let rounded = round_to_f32(n);
    if rounded.is_infinite() {
        return Err(fail(
            context,
            "is outside the range of a single-precision floating-point value.",
        ));
    }
    Ok(rounded)
}

pub fn to_unrestricted_float(value: &HostValue) -> f32 {
    round_to_f32(value.to_number())
}

pub fn to_double(value: &HostValue, context: &str) -> Result<f64> {
    let n = value.to_number();
    if !n.is_finite() {
        return Err(fail(context, "is not a finite floating-point value."));
    }
    Ok(n)
}

pub fn to_unsigned_long(value: &HostValue, enforce_range: bool, context: &str) -> Result<u32> {
    let n = value.to_number();

    if enforce_range {
        if !n.is_finite() {
            return Err(fail(context, "is not a finite number."));
        }
        let t = n.trunc();
        if !(0.0..=UNSIGNED_LONG_MAX).contains(&t) {
            return Err(fail(
                context,
                "is outside the accepted range of 0 to 4294967295, inclusive.",
            ));
        }
        return Ok(t as u32);
    }

    if !n.is_finite() || n == 0.0 {
        return Ok(0);
    }
    let modulo = n.trunc().rem_euclid(UNSIGNED_LONG_MAX + 1.0);
    Ok(modulo as u32)
}

pub fn to_boolean(value: &HostValue) -> bool {
    value.is_truthy()
}

/// Enumerated strings are matched exactly against the allowed set.
///
/// The enum failure renders the value itself, so `context` here is the call
/// site prefix without any value detail.
pub fn to_enum(
    value: &HostValue,
    type_name: &str,
    allowed: &[&str],
    context: &str,
) -> Result<String> {
    let s = value.to_string();
    if allowed.iter().any(|a| *a == s) {
        Ok(s)
    } else {
        Err(BridgeError::Conversion(format!(
            "{} The provided value '{}' is not a valid enum value of type {}.",
            context, s, type_name
        )))
    }
}

pub fn to_audio_buffer_or_null(
    value: &HostValue,
    context: &str,
) -> Result<Option<Arc<AudioBuffer>>> {
    match value {
        HostValue::Undefined | HostValue::Null => Ok(None),
        HostValue::AudioBuffer(buffer) => Ok(Some(Arc::clone(buffer))),
        _ => Err(fail(context, "is not of type 'AudioBuffer'.")),
    }
}

/// Coerce `value` to `target`.
///
/// `context` describes the call site and ends with the offending value's
/// string form, e.g.
/// `Failed to construct 'GainNode': Failed to read the 'gain' property from GainOptions: The provided value (x)`.
/// Enum targets take `enum_context`, the same prefix without the value
/// detail.
pub fn coerce(
    value: &HostValue,
    target: CoercionTarget,
    context: &str,
    enum_context: &str,
) -> Result<Coerced> {
    Ok(match target {
        CoercionTarget::Float => Coerced::Float(to_float(value, context)?),
        CoercionTarget::UnrestrictedFloat => Coerced::Float(to_unrestricted_float(value)),
        CoercionTarget::Double => Coerced::Double(to_double(value, context)?),
        CoercionTarget::UnrestrictedDouble => Coerced::Double(value.to_number()),
        CoercionTarget::UnsignedLong { enforce_range } => {
            Coerced::UnsignedLong(to_unsigned_long(value, enforce_range, context)?)
        }
        CoercionTarget::Boolean => Coerced::Boolean(to_boolean(value)),
        CoercionTarget::DomString => Coerced::String(value.to_string()),
        CoercionTarget::Enum { type_name, allowed } => {
            Coerced::String(to_enum(value, type_name, allowed, enum_context)?)
        }
        CoercionTarget::AudioBufferOrNull => {
            Coerced::AudioBuffer(to_audio_buffer_or_null(value, context)?)
        }
        CoercionTarget::Any => Coerced::Any(value.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CTX: &str = "Failed to construct 'GainNode': Failed to read the 'gain' property from GainOptions: The provided value (x)";

    #[test]
    fn float_rejects_non_finite() {
        let err = to_float(&HostValue::from("x"), CTX).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("{} is not a finite floating-point value.", CTX)
        );
        assert!(to_float(&HostValue::Number(f64::INFINITY), CTX).is_err());
    }

    #[test]
    fn float_rounds_and_checks_range() {
        assert_eq!(to_float(&HostValue::from(0.1), CTX).unwrap(), 0.1f32);
        assert_eq!(to_float(&HostValue::from("0.5"), CTX).unwrap(), 0.5);
        assert_eq!(to_float(&HostValue::Boolean(true), CTX).unwrap(), 1.0);
        let err = to_float(&HostValue::Number(1e300), CTX).unwrap_err();
        assert!(err.to_string().ends_with("single-precision floating-point value."));
    }

    #[test]
    fn unrestricted_targets_allow_nan() {
        assert!(to_unrestricted_float(&HostValue::from("x")).is_nan());
        let c = coerce(
            &HostValue::Undefined,
            CoercionTarget::UnrestrictedDouble,
            CTX,
            CTX,
        )
        .unwrap();
        assert!(c.as_f64().unwrap().is_nan());
    }

    #[test]
    fn unsigned_long_wraps_without_enforce_range() {
        assert_eq!(to_unsigned_long(&HostValue::from(-1.0), false, CTX).unwrap(), 4_294_967_295);
        assert_eq!(to_unsigned_long(&HostValue::from(4_294_967_298.0), false, CTX).unwrap(), 2);
        assert_eq!(to_unsigned_long(&HostValue::from(f64::NAN), false, CTX).unwrap(), 0);
        assert_eq!(to_unsigned_long(&HostValue::from(3.9), false, CTX).unwrap(), 3);
    }

    #[test]
    fn unsigned_long_enforce_range() {
        assert_eq!(to_unsigned_long(&HostValue::from(2.7), true, CTX).unwrap(), 2);
        let err = to_unsigned_long(&HostValue::from(-1.0), true, CTX).unwrap_err();
        assert!(err.to_string().ends_with("is outside the accepted range of 0 to 4294967295, inclusive."));
        let err = to_unsigned_long(&HostValue::from(f64::NAN), true, CTX).unwrap_err();
        assert!(err.to_string().ends_with("is not a finite number."));
    }

    #[test]
    fn enums_match_exactly() {
        const MODES: &[&str] = &["max", "clamped-max", "explicit"];
        let prefix = "Failed to construct 'GainNode': Failed to read the 'channelCountMode' property from GainOptions:";
        assert_eq!(to_enum(&HostValue::from("max"), "ChannelCountMode", MODES, prefix).unwrap(), "max");
        let err = to_enum(&HostValue::from("MAX"), "ChannelCountMode", MODES, prefix).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("{} The provided value 'MAX' is not a valid enum value of type ChannelCountMode.", prefix)
        );
    }

    #[test]
    fn audio_buffer_or_null() {
        assert!(to_audio_buffer_or_null(&HostValue::Null, CTX).unwrap().is_none());
        let err = to_audio_buffer_or_null(&HostValue::from(json!({})), CTX).unwrap_err();
        assert!(err.to_string().ends_with("is not of type 'AudioBuffer'."));
    }
}
