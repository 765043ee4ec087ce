//! Options dictionary parsing.
//!
//! Runs the options half of the construction protocol against a
//! [`NodeSchema`]: positional arguments, the options-shape check, the common
//! channel keys and then every kind-specific key in declared order. The
//! first failure wins. The result is what the native engine receives; the
//! host options value itself is never retained.

use std::sync::Arc;

use crate::buffer::AudioBuffer;
use crate::call::CallSite;
use crate::coerce::{self, Coerced, CoercionTarget};
use crate::error::{BridgeError, Result};
use crate::schema::{
    NodeKind, NodeSchema, OptionDefault, OptionSpec, OptionValue, CHANNEL_COUNT,
    CHANNEL_COUNT_MODE, CHANNEL_COUNT_MODE_TARGET, CHANNEL_COUNT_TARGET, CHANNEL_INTERPRETATION,
    CHANNEL_INTERPRETATION_TARGET,
};
use crate::sequence::{self, TypedSequence};
use crate::value::HostValue;

#[derive(Debug, Clone)]
pub enum ParsedValue {
    Scalar(Coerced),
    Sequence(TypedSequence),
}

/// Fully coerced and defaulted construction options.
#[derive(Debug, Clone)]
pub struct ParsedOptions {
    kind: NodeKind,
    pub channel_count: u32,
    pub channel_count_mode: String,
    pub channel_interpretation: String,
    positional: Vec<(&'static str, Coerced)>,
    values: Vec<(&'static str, ParsedValue)>,
}

impl ParsedOptions {
    /// Options for `kind` with every key at its documented default. Required
    /// sequence keys are left out.
    pub fn defaults(kind: NodeKind) -> Self {
        let schema = kind.schema();
        let values = schema
            .options
            .iter()
            .filter_map(|spec| match spec.value {
                OptionValue::Scalar { target, default } => {
                    Some((spec.key, ParsedValue::Scalar(default_value(target, default))))
                }
                OptionValue::Sequence { .. } => None,
            })
            .collect();

        Self {
            kind,
            channel_count: schema.channel_defaults.count,
            channel_count_mode: schema.channel_defaults.mode.to_string(),
            channel_interpretation: schema.channel_defaults.interpretation.to_string(),
            positional: Vec::new(),
            values,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn positional(&self, name: &str) -> Option<&Coerced> {
        self.positional
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn get(&self, key: &str) -> Option<&ParsedValue> {
        self.values.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Override a value, used by callers that build options by hand.
    pub fn set(&mut self, key: &'static str, value: ParsedValue) {
        match self.values.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.values.push((key, value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(k, _)| *k)
    }

    fn scalar(&self, key: &str) -> Option<&Coerced> {
        match self.get(key)? {
            ParsedValue::Scalar(c) => Some(c),
            ParsedValue::Sequence(_) => None,
        }
    }

    pub fn f32(&self, key: &str) -> Option<f32> {
        self.scalar(key)?.as_f32()
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.scalar(key)?.as_f64()
    }

    pub fn u32(&self, key: &str) -> Option<u32> {
        self.scalar(key)?.as_u32()
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.scalar(key)?.as_bool()
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.scalar(key)?.as_str()
    }

    pub fn sequence(&self, key: &str) -> Option<&TypedSequence> {
        match self.get(key)? {
            ParsedValue::Sequence(s) => Some(s),
            ParsedValue::Scalar(_) => None,
        }
    }

    pub fn buffer(&self, key: &str) -> Option<Arc<AudioBuffer>> {
        match self.scalar(key)? {
            Coerced::AudioBuffer(b) => b.clone(),
            _ => None,
        }
    }

    pub fn any(&self, key: &str) -> Option<&HostValue> {
        match self.scalar(key)? {
            Coerced::Any(v) => Some(v),
            _ => None,
        }
    }
}

fn default_value(target: CoercionTarget, default: OptionDefault) -> Coerced {
    match default {
        OptionDefault::Float(v) => Coerced::Float(v),
        OptionDefault::Double(v) => Coerced::Double(v),
        OptionDefault::UnsignedLong(v) => Coerced::UnsignedLong(v),
        OptionDefault::Boolean(v) => Coerced::Boolean(v),
        OptionDefault::Str(v) => Coerced::String(v.to_string()),
        OptionDefault::Null => match target {
            CoercionTarget::AudioBufferOrNull => Coerced::AudioBuffer(None),
            _ => Coerced::Any(HostValue::Null),
        },
    }
}

/// Reads members of one options dictionary with the message prefixes of a
/// call site.
pub(crate) struct KeyReader<'a> {
    site: &'a CallSite,
    dictionary: &'static str,
    options: Option<&'a HostValue>,
}

impl<'a> KeyReader<'a> {
    pub(crate) fn new(
        site: &'a CallSite,
        dictionary: &'static str,
        options: Option<&'a HostValue>,
    ) -> Self {
        Self {
            site,
            dictionary,
            options: options.filter(|v| v.is_object_like()),
        }
    }

    fn read_prefix(&self, key: &str) -> String {
        format!(
            "{} Failed to read the '{}' property from {}:",
            self.site.prefix(),
            key,
            self.dictionary
        )
    }

    fn lookup(&self, key: &str) -> Option<&HostValue> {
        self.options.and_then(|o| o.get(key))
    }

    pub(crate) fn scalar(&self, key: &str, target: CoercionTarget) -> Result<Option<Coerced>> {
        let Some(value) = self.lookup(key) else {
            return Ok(None);
        };
        let enum_context = self.read_prefix(key);
        let context = format!("{} The provided value ({})", enum_context, value);
        coerce::coerce(value, target, &context, &enum_context).map(Some)
    }

    fn option(&self, spec: &OptionSpec) -> Result<ParsedValue> {
        match spec.value {
            OptionValue::Scalar { target, default } => match self.scalar(spec.key, target)? {
                Some(c) => Ok(ParsedValue::Scalar(c)),
                None if spec.required => Err(self.missing(spec.key)),
                None => Ok(ParsedValue::Scalar(default_value(target, default))),
            },
            OptionValue::Sequence { element } => {
                let Some(value) = self.lookup(spec.key) else {
                    return Err(self.missing(spec.key));
                };
                sequence::to_typed_sequence(value, element)
                    .map(ParsedValue::Sequence)
                    .map_err(|err| {
                        BridgeError::Conversion(format!(
                            "{} The provided value {}",
                            self.read_prefix(spec.key),
                            err
                        ))
                    })
            }
        }
    }

    pub(crate) fn missing(&self, key: &str) -> BridgeError {
        BridgeError::RequiredMemberMissing(format!(
            "{} Required member is undefined",
            self.read_prefix(key)
        ))
    }
}

/// Parse everything after the context argument.
///
/// `args[0]` is the context and is not inspected here; the arity and
/// context checks have already passed.
pub fn parse_options(schema: &NodeSchema, args: &[HostValue]) -> Result<ParsedOptions> {
    let site = CallSite::construct(schema.name);

    let mut positional = Vec::with_capacity(schema.positional.len());
    for (i, spec) in schema.positional.iter().enumerate() {
        let value = args.get(i + 1).cloned().unwrap_or_default();
        positional.push((spec.name, site.coerce_arg(&value, spec.target)?));
    }

    let options = args.get(schema.options_position() - 1);
    if let Some(value) = options {
        if value.is_truthy() && !value.is_object_like() {
            return Err(site.type_mismatch(format_args!(
                "argument {} is not of type '{}'",
                schema.options_position(),
                schema.options_name
            )));
        }
    }

    let reader = KeyReader::new(&site, schema.options_name, options);

    let defaults = schema.channel_defaults;
    let channel_count = reader
        .scalar(CHANNEL_COUNT, CHANNEL_COUNT_TARGET)?
        .and_then(|c| c.as_u32())
        .unwrap_or(defaults.count);
    let channel_count_mode = reader
        .scalar(CHANNEL_COUNT_MODE, CHANNEL_COUNT_MODE_TARGET)?
        .and_then(|c| c.as_str().map(str::to_string))
        .unwrap_or_else(|| defaults.mode.to_string());
    let channel_interpretation = reader
        .scalar(CHANNEL_INTERPRETATION, CHANNEL_INTERPRETATION_TARGET)?
        .and_then(|c| c.as_str().map(str::to_string))
        .unwrap_or_else(|| defaults.interpretation.to_string());

    let mut values = Vec::with_capacity(schema.options.len());
    for spec in schema.options {
        values.push((spec.key, reader.option(spec)?));
    }

    Ok(ParsedOptions {
        kind: schema.kind,
        channel_count,
        channel_count_mode,
        channel_interpretation,
        positional,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(options: serde_json::Value) -> Vec<HostValue> {
        vec![HostValue::Null, HostValue::from(options)]
    }

    #[test]
    fn absent_keys_take_defaults() {
        let parsed = parse_options(NodeKind::Gain.schema(), &[HostValue::Null]).unwrap();
        assert_eq!(parsed.f32("gain"), Some(1.0));
        assert_eq!(parsed.channel_count, 2);
        assert_eq!(parsed.channel_count_mode, "max");
        assert_eq!(parsed.channel_interpretation, "speakers");
    }

    #[test]
    fn falsy_non_objects_count_as_no_options() {
        for falsy in [json!(0), json!(""), json!(false), json!(null)] {
            let parsed = parse_options(NodeKind::Gain.schema(), &args(falsy)).unwrap();
            assert_eq!(parsed.f32("gain"), Some(1.0));
        }
    }

    #[test]
    fn truthy_non_objects_are_rejected() {
        let err = parse_options(NodeKind::Gain.schema(), &args(json!(5))).unwrap_err();
        assert_eq!(
            err,
            BridgeError::TypeMismatch(
                "Failed to construct 'GainNode': argument 2 is not of type 'GainOptions'".into()
            )
        );
    }

    #[test]
    fn conversion_message_names_the_key_and_value() {
        let err = parse_options(NodeKind::Gain.schema(), &args(json!({"gain": "x"}))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to construct 'GainNode': Failed to read the 'gain' property from GainOptions: The provided value (x) is not a finite floating-point value."
        );
    }

    #[test]
    fn common_keys_are_validated_first() {
        let err = parse_options(
            NodeKind::Gain.schema(),
            &args(json!({"gain": "x", "channelCountMode": "loud"})),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to construct 'GainNode': Failed to read the 'channelCountMode' property from GainOptions: The provided value 'loud' is not a valid enum value of type ChannelCountMode."
        );
    }

    #[test]
    fn required_sequence_missing_vs_invalid() {
        let schema = NodeKind::IirFilter.schema();

        let missing = parse_options(schema, &args(json!({"feedback": [1]}))).unwrap_err();
        assert_eq!(
            missing,
            BridgeError::RequiredMemberMissing(
                "Failed to construct 'IIRFilterNode': Failed to read the 'feedforward' property from IIRFilterOptions: Required member is undefined".into()
            )
        );

        let invalid =
            parse_options(schema, &args(json!({"feedforward": [1, "a"], "feedback": [1]})))
                .unwrap_err();
        assert_eq!(
            invalid,
            BridgeError::Conversion(
                "Failed to construct 'IIRFilterNode': Failed to read the 'feedforward' property from IIRFilterOptions: The provided value (1,a) contains a non-finite element at index 1.".into()
            )
        );
    }

    #[test]
    fn required_member_reported_when_options_absent() {
        let err = parse_options(NodeKind::IirFilter.schema(), &[HostValue::Null, HostValue::Undefined])
            .unwrap_err();
        assert!(matches!(err, BridgeError::RequiredMemberMissing(ref m) if m.contains("'feedforward'")));
    }

    #[test]
    fn positional_arguments_precede_options() {
        let parsed = parse_options(
            NodeKind::AudioWorklet.schema(),
            &[
                HostValue::Null,
                HostValue::from("array-source"),
                HostValue::from(json!({"numberOfOutputs": 2})),
            ],
        )
        .unwrap();
        assert_eq!(parsed.positional("name").and_then(Coerced::as_str), Some("array-source"));
        assert_eq!(parsed.u32("numberOfOutputs"), Some(2));
        assert_eq!(parsed.u32("numberOfInputs"), Some(1));
        assert!(matches!(parsed.any("processorOptions"), Some(HostValue::Null)));

        let err = parse_options(
            NodeKind::AudioWorklet.schema(),
            &[HostValue::Null, HostValue::from("x"), HostValue::from(true)],
        )
        .unwrap_err();
        assert!(err.to_string().ends_with("argument 3 is not of type 'AudioWorkletNodeOptions'"));
    }

    #[test]
    fn enum_options_accept_listed_values() {
        let parsed =
            parse_options(NodeKind::BiquadFilter.schema(), &args(json!({"type": "highpass"})))
                .unwrap();
        assert_eq!(parsed.str("type"), Some("highpass"));
        assert_eq!(parsed.f32("frequency"), Some(350.0));
    }

    #[test]
    fn defaults_table_matches_parsed_defaults() {
        let parsed = ParsedOptions::defaults(NodeKind::Analyser);
        assert_eq!(parsed.u32("fftSize"), Some(2048));
        assert_eq!(parsed.f64("smoothingTimeConstant"), Some(0.8));
        assert!(ParsedOptions::defaults(NodeKind::IirFilter).sequence("feedback").is_none());
    }
}
