//! Node kind schema table.
//!
//! One [`NodeSchema`] per node kind drives the whole construction protocol:
//! which contexts are accepted, how many arguments are mandatory, which
//! option keys are read (in order), how each is coerced and what it defaults
//! to, and which parameters and methods the resulting wrapper carries. Adding
//! a node kind means adding a table entry, not a constructor.

use std::fmt;

use serde::Serialize;

use crate::coerce::CoercionTarget;
use crate::sequence::ElementKind;

/// Largest finite single-precision value, the nominal range of unbounded
/// parameters.
pub const MOST_POSITIVE_FLOAT: f32 = f32::MAX;

/// `1200 * log2(MOST_POSITIVE_FLOAT)`, the detune range.
const DETUNE_RANGE: f32 = 153_600.0;

/// `40 * log10(MOST_POSITIVE_FLOAT)`, the upper bound of biquad gain.
const BIQUAD_GAIN_MAX: f32 = 1_541.273_9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextKind {
    Realtime,
    Offline,
}

impl ContextKind {
    pub fn name(self) -> &'static str {
        match self {
            ContextKind::Realtime => "AudioContext",
            ContextKind::Offline => "OfflineAudioContext",
        }
    }
}

const ANY_CONTEXT: &[ContextKind] = &[ContextKind::Realtime, ContextKind::Offline];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutomationRate {
    ARate,
    KRate,
}

impl AutomationRate {
    pub fn as_str(self) -> &'static str {
        match self {
            AutomationRate::ARate => "a-rate",
            AutomationRate::KRate => "k-rate",
        }
    }
}

/// Documented default for an absent option key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionDefault {
    Float(f32),
    Double(f64),
    UnsignedLong(u32),
    Boolean(bool),
    Str(&'static str),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionValue {
    /// Scalar coerced through the coercion library.
    Scalar {
        target: CoercionTarget,
        default: OptionDefault,
    },
    /// Numeric array data. Always required.
    Sequence { element: ElementKind },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionSpec {
    pub key: &'static str,
    pub required: bool,
    pub value: OptionValue,
}

impl OptionSpec {
    const fn scalar(key: &'static str, target: CoercionTarget, default: OptionDefault) -> Self {
        Self {
            key,
            required: false,
            value: OptionValue::Scalar { target, default },
        }
    }

    const fn sequence(key: &'static str, element: ElementKind) -> Self {
        Self {
            key,
            required: true,
            value: OptionValue::Sequence { element },
        }
    }
}

/// Positional argument that sits between the context and the options
/// dictionary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionalSpec {
    pub name: &'static str,
    pub target: CoercionTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: &'static str,
    pub default_value: f32,
    pub min_value: f32,
    pub max_value: f32,
    pub automation_rate: AutomationRate,
}

impl ParamSpec {
    const fn a_rate(name: &'static str, default_value: f32, min_value: f32, max_value: f32) -> Self {
        Self {
            name,
            default_value,
            min_value,
            max_value,
            automation_rate: AutomationRate::ARate,
        }
    }

    const fn unbounded(name: &'static str, default_value: f32) -> Self {
        Self::a_rate(name, default_value, -MOST_POSITIVE_FLOAT, MOST_POSITIVE_FLOAT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgSpec {
    pub name: &'static str,
    pub optional: bool,
}

const fn required(name: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        optional: false,
    }
}

const fn optional(name: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        optional: true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSpec {
    pub name: &'static str,
    pub args: &'static [ArgSpec],
}

impl MethodSpec {
    /// Number of parameters before the first optional one.
    pub fn arity(&self) -> usize {
        self.args.iter().take_while(|a| !a.optional).count()
    }
}

pub const GET_FREQUENCY_RESPONSE: MethodSpec = MethodSpec {
    name: "getFrequencyResponse",
    args: &[
        required("frequencyHz"),
        required("magResponse"),
        required("phaseResponse"),
    ],
};

pub const CONNECT: MethodSpec = MethodSpec {
    name: "connect",
    args: &[required("destination"), optional("output"), optional("input")],
};

pub const DISCONNECT: MethodSpec = MethodSpec {
    name: "disconnect",
    args: &[optional("destinationOrOutput"), optional("output"), optional("input")],
};

pub const START: MethodSpec = MethodSpec {
    name: "start",
    args: &[optional("when")],
};

pub const STOP: MethodSpec = MethodSpec {
    name: "stop",
    args: &[optional("when")],
};

pub const SET_VALUE_AT_TIME: MethodSpec = MethodSpec {
    name: "setValueAtTime",
    args: &[required("value"), required("startTime")],
};

pub const LINEAR_RAMP_TO_VALUE_AT_TIME: MethodSpec = MethodSpec {
    name: "linearRampToValueAtTime",
    args: &[required("value"), required("endTime")],
};

pub const EXPONENTIAL_RAMP_TO_VALUE_AT_TIME: MethodSpec = MethodSpec {
    name: "exponentialRampToValueAtTime",
    args: &[required("value"), required("endTime")],
};

pub const SET_TARGET_AT_TIME: MethodSpec = MethodSpec {
    name: "setTargetAtTime",
    args: &[required("target"), required("startTime"), required("timeConstant")],
};

pub const CANCEL_SCHEDULED_VALUES: MethodSpec = MethodSpec {
    name: "cancelScheduledValues",
    args: &[required("cancelTime")],
};

pub const ADD_EVENT_LISTENER: MethodSpec = MethodSpec {
    name: "addEventListener",
    args: &[required("type"), required("listener"), optional("options")],
};

pub const REMOVE_EVENT_LISTENER: MethodSpec = MethodSpec {
    name: "removeEventListener",
    args: &[required("type"), required("listener"), optional("options")],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDefaults {
    pub count: u32,
    pub mode: &'static str,
    pub interpretation: &'static str,
}

const CHANNELS_MAX: ChannelDefaults = ChannelDefaults {
    count: 2,
    mode: "max",
    interpretation: "speakers",
};

const CHANNELS_CLAMPED_MAX: ChannelDefaults = ChannelDefaults {
    count: 2,
    mode: "clamped-max",
    interpretation: "speakers",
};

pub const CHANNEL_COUNT_MODES: &[&str] = &["max", "clamped-max", "explicit"];
pub const CHANNEL_INTERPRETATIONS: &[&str] = &["speakers", "discrete"];
pub const BIQUAD_FILTER_TYPES: &[&str] = &[
    "lowpass", "highpass", "bandpass", "lowshelf", "highshelf", "peaking", "notch", "allpass",
];
pub const OSCILLATOR_TYPES: &[&str] = &["sine", "square", "sawtooth", "triangle", "custom"];

/// Option keys every node kind understands, read before the kind's own keys.
/// Their defaults come from the kind's [`ChannelDefaults`].
pub const CHANNEL_COUNT: &str = "channelCount";
pub const CHANNEL_COUNT_MODE: &str = "channelCountMode";
pub const CHANNEL_INTERPRETATION: &str = "channelInterpretation";

pub const CHANNEL_COUNT_TARGET: CoercionTarget = CoercionTarget::UnsignedLong {
    enforce_range: true,
};
pub const CHANNEL_COUNT_MODE_TARGET: CoercionTarget = CoercionTarget::Enum {
    type_name: "ChannelCountMode",
    allowed: CHANNEL_COUNT_MODES,
};
pub const CHANNEL_INTERPRETATION_TARGET: CoercionTarget = CoercionTarget::Enum {
    type_name: "ChannelInterpretation",
    allowed: CHANNEL_INTERPRETATIONS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NodeKind {
    Gain,
    Delay,
    StereoPanner,
    BiquadFilter,
    IirFilter,
    Convolver,
    ConstantSource,
    Oscillator,
    Analyser,
    AudioWorklet,
}

impl NodeKind {
    pub const ALL: [NodeKind; 10] = [
        NodeKind::Gain,
        NodeKind::Delay,
        NodeKind::StereoPanner,
        NodeKind::BiquadFilter,
        NodeKind::IirFilter,
        NodeKind::Convolver,
        NodeKind::ConstantSource,
        NodeKind::Oscillator,
        NodeKind::Analyser,
        NodeKind::AudioWorklet,
    ];

    pub fn schema(self) -> &'static NodeSchema {
        match self {
            NodeKind::Gain => &GAIN,
            NodeKind::Delay => &DELAY,
            NodeKind::StereoPanner => &STEREO_PANNER,
            NodeKind::BiquadFilter => &BIQUAD_FILTER,
            NodeKind::IirFilter => &IIR_FILTER,
            NodeKind::Convolver => &CONVOLVER,
            NodeKind::ConstantSource => &CONSTANT_SOURCE,
            NodeKind::Oscillator => &OSCILLATOR,
            NodeKind::Analyser => &ANALYSER,
            NodeKind::AudioWorklet => &AUDIO_WORKLET,
        }
    }

    pub fn name(self) -> &'static str {
        self.schema().name
    }

    pub fn from_name(name: &str) -> Option<NodeKind> {
        NodeKind::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSchema {
    pub kind: NodeKind,
    /// Display name, also the `toStringTag`.
    pub name: &'static str,
    /// Options dictionary name used in error messages.
    pub options_name: &'static str,
    pub accepted_contexts: &'static [ContextKind],
    pub positional: &'static [PositionalSpec],
    pub options: &'static [OptionSpec],
    pub channel_defaults: ChannelDefaults,
    pub params: &'static [ParamSpec],
    pub methods: &'static [MethodSpec],
    /// Kind-specific readable attributes besides parameters.
    pub attributes: &'static [&'static str],
    pub scheduled_source: bool,
    pub number_of_inputs: u32,
    pub number_of_outputs: u32,
}

impl NodeSchema {
    /// Mandatory argument count: the context, every positional, and the
    /// options dictionary when it holds a required member.
    pub fn min_args(&self) -> usize {
        let options_required = self.options.iter().any(|o| o.required);
        1 + self.positional.len() + usize::from(options_required)
    }

    /// One-based position of the options dictionary argument.
    pub fn options_position(&self) -> usize {
        2 + self.positional.len()
    }

    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&'static MethodSpec> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn option(&self, key: &str) -> Option<&'static OptionSpec> {
        self.options.iter().find(|o| o.key == key)
    }
}

static GAIN: NodeSchema = NodeSchema {
    kind: NodeKind::Gain,
    name: "GainNode",
    options_name: "GainOptions",
    accepted_contexts: ANY_CONTEXT,
    positional: &[],
    options: &[OptionSpec::scalar(
        "gain",
        CoercionTarget::Float,
        OptionDefault::Float(1.0),
    )],
    channel_defaults: CHANNELS_MAX,
    params: &[ParamSpec::unbounded("gain", 1.0)],
    methods: &[],
    attributes: &[],
    scheduled_source: false,
    number_of_inputs: 1,
    number_of_outputs: 1,
};

static DELAY: NodeSchema = NodeSchema {
    kind: NodeKind::Delay,
    name: "DelayNode",
    options_name: "DelayOptions",
    accepted_contexts: ANY_CONTEXT,
    positional: &[],
    options: &[
        OptionSpec::scalar("maxDelayTime", CoercionTarget::Double, OptionDefault::Double(1.0)),
        OptionSpec::scalar("delayTime", CoercionTarget::Double, OptionDefault::Double(0.0)),
    ],
    channel_defaults: CHANNELS_MAX,
    // max is replaced by maxDelayTime at allocation
    params: &[ParamSpec::a_rate("delayTime", 0.0, 0.0, 1.0)],
    methods: &[],
    attributes: &[],
    scheduled_source: false,
    number_of_inputs: 1,
    number_of_outputs: 1,
};

static STEREO_PANNER: NodeSchema = NodeSchema {
    kind: NodeKind::StereoPanner,
    name: "StereoPannerNode",
    options_name: "StereoPannerOptions",
    accepted_contexts: ANY_CONTEXT,
    positional: &[],
    options: &[OptionSpec::scalar(
        "pan",
        CoercionTarget::Float,
        OptionDefault::Float(0.0),
    )],
    channel_defaults: CHANNELS_CLAMPED_MAX,
    params: &[ParamSpec::a_rate("pan", 0.0, -1.0, 1.0)],
    methods: &[],
    attributes: &[],
    scheduled_source: false,
    number_of_inputs: 1,
    number_of_outputs: 1,
};

static BIQUAD_FILTER: NodeSchema = NodeSchema {
    kind: NodeKind::BiquadFilter,
    name: "BiquadFilterNode",
    options_name: "BiquadFilterOptions",
    accepted_contexts: ANY_CONTEXT,
    positional: &[],
    options: &[
        OptionSpec::scalar(
            "type",
            CoercionTarget::Enum {
                type_name: "BiquadFilterType",
                allowed: BIQUAD_FILTER_TYPES,
            },
            OptionDefault::Str("lowpass"),
        ),
        OptionSpec::scalar("Q", CoercionTarget::Float, OptionDefault::Float(1.0)),
        OptionSpec::scalar("detune", CoercionTarget::Float, OptionDefault::Float(0.0)),
        OptionSpec::scalar("frequency", CoercionTarget::Float, OptionDefault::Float(350.0)),
        OptionSpec::scalar("gain", CoercionTarget::Float, OptionDefault::Float(0.0)),
    ],
    channel_defaults: CHANNELS_MAX,
    // frequency max is replaced by the context's Nyquist frequency
    params: &[
        ParamSpec::a_rate("frequency", 350.0, 0.0, MOST_POSITIVE_FLOAT),
        ParamSpec::a_rate("detune", 0.0, -DETUNE_RANGE, DETUNE_RANGE),
        ParamSpec::unbounded("Q", 1.0),
        ParamSpec::a_rate("gain", 0.0, -MOST_POSITIVE_FLOAT, BIQUAD_GAIN_MAX),
    ],
    methods: &[GET_FREQUENCY_RESPONSE],
    attributes: &["type"],
    scheduled_source: false,
    number_of_inputs: 1,
    number_of_outputs: 1,
};

static IIR_FILTER: NodeSchema = NodeSchema {
    kind: NodeKind::IirFilter,
    name: "IIRFilterNode",
    options_name: "IIRFilterOptions",
    accepted_contexts: ANY_CONTEXT,
    positional: &[],
    options: &[
        OptionSpec::sequence("feedforward", ElementKind::Float64),
        OptionSpec::sequence("feedback", ElementKind::Float64),
    ],
    channel_defaults: CHANNELS_MAX,
    params: &[],
    methods: &[GET_FREQUENCY_RESPONSE],
    attributes: &[],
    scheduled_source: false,
    number_of_inputs: 1,
    number_of_outputs: 1,
};

static CONVOLVER: NodeSchema = NodeSchema {
    kind: NodeKind::Convolver,
    name: "ConvolverNode",
    options_name: "ConvolverOptions",
    accepted_contexts: ANY_CONTEXT,
    positional: &[],
    options: &[
        OptionSpec::scalar(
            "buffer",
            CoercionTarget::AudioBufferOrNull,
            OptionDefault::Null,
        ),
        OptionSpec::scalar(
            "disableNormalization",
            CoercionTarget::Boolean,
            OptionDefault::Boolean(false),
        ),
    ],
    channel_defaults: CHANNELS_CLAMPED_MAX,
    params: &[],
    methods: &[],
    attributes: &["buffer", "normalize"],
    scheduled_source: false,
    number_of_inputs: 1,
    number_of_outputs: 1,
};

static CONSTANT_SOURCE: NodeSchema = NodeSchema {
    kind: NodeKind::ConstantSource,
    name: "ConstantSourceNode",
    options_name: "ConstantSourceOptions",
    accepted_contexts: ANY_CONTEXT,
    positional: &[],
    options: &[OptionSpec::scalar(
        "offset",
        CoercionTarget::Float,
        OptionDefault::Float(1.0),
    )],
    channel_defaults: CHANNELS_MAX,
    params: &[ParamSpec::unbounded("offset", 1.0)],
    methods: &[],
    attributes: &[],
    scheduled_source: true,
    number_of_inputs: 0,
    number_of_outputs: 1,
};

static OSCILLATOR: NodeSchema = NodeSchema {
    kind: NodeKind::Oscillator,
    name: "OscillatorNode",
    options_name: "OscillatorOptions",
    accepted_contexts: ANY_CONTEXT,
    positional: &[],
    options: &[
        OptionSpec::scalar(
            "type",
            CoercionTarget::Enum {
                type_name: "OscillatorType",
                allowed: OSCILLATOR_TYPES,
            },
            OptionDefault::Str("sine"),
        ),
        OptionSpec::scalar("frequency", CoercionTarget::Float, OptionDefault::Float(440.0)),
        OptionSpec::scalar("detune", CoercionTarget::Float, OptionDefault::Float(0.0)),
    ],
    channel_defaults: CHANNELS_MAX,
    // frequency range is replaced by the context's Nyquist frequency
    params: &[
        ParamSpec::unbounded("frequency", 440.0),
        ParamSpec::a_rate("detune", 0.0, -DETUNE_RANGE, DETUNE_RANGE),
    ],
    methods: &[],
    attributes: &["type"],
    scheduled_source: true,
    number_of_inputs: 0,
    number_of_outputs: 1,
};

static ANALYSER: NodeSchema = NodeSchema {
    kind: NodeKind::Analyser,
    name: "AnalyserNode",
    options_name: "AnalyserOptions",
    accepted_contexts: ANY_CONTEXT,
    positional: &[],
    options: &[
        OptionSpec::scalar(
            "fftSize",
            CoercionTarget::UnsignedLong {
                enforce_range: false,
            },
            OptionDefault::UnsignedLong(2048),
        ),
        OptionSpec::scalar("maxDecibels", CoercionTarget::Double, OptionDefault::Double(-30.0)),
        OptionSpec::scalar("minDecibels", CoercionTarget::Double, OptionDefault::Double(-100.0)),
        OptionSpec::scalar(
            "smoothingTimeConstant",
            CoercionTarget::Double,
            OptionDefault::Double(0.8),
        ),
    ],
    channel_defaults: CHANNELS_MAX,
    params: &[],
    methods: &[],
    attributes: &["fftSize", "frequencyBinCount", "minDecibels", "maxDecibels", "smoothingTimeConstant"],
    scheduled_source: false,
    number_of_inputs: 1,
    number_of_outputs: 1,
};

static AUDIO_WORKLET: NodeSchema = NodeSchema {
    kind: NodeKind::AudioWorklet,
    name: "AudioWorkletNode",
    options_name: "AudioWorkletNodeOptions",
    accepted_contexts: ANY_CONTEXT,
    positional: &[PositionalSpec {
        name: "name",
        target: CoercionTarget::DomString,
    }],
    options: &[
        OptionSpec::scalar(
            "numberOfInputs",
            CoercionTarget::UnsignedLong {
                enforce_range: false,
            },
            OptionDefault::UnsignedLong(1),
        ),
        OptionSpec::scalar(
            "numberOfOutputs",
            CoercionTarget::UnsignedLong {
                enforce_range: false,
            },
            OptionDefault::UnsignedLong(1),
        ),
        OptionSpec::scalar("processorOptions", CoercionTarget::Any, OptionDefault::Null),
    ],
    channel_defaults: CHANNELS_MAX,
    params: &[],
    methods: &[],
    attributes: &["port", "parameters"],
    scheduled_source: false,
    number_of_inputs: 1,
    number_of_outputs: 1,
};

/// Every node kind, in registration order.
pub fn node_schemas() -> Vec<&'static NodeSchema> {
    NodeKind::ALL.iter().map(|k| k.schema()).collect()
}

/// Serializable view of a schema, for tooling.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSchemaSummary {
    pub name: &'static str,
    pub options_name: &'static str,
    pub min_args: usize,
    pub accepted_contexts: Vec<ContextKind>,
    pub positional: Vec<&'static str>,
    pub options: Vec<OptionSummary>,
    pub channel_defaults: ChannelDefaults,
    pub params: Vec<ParamSpec>,
    pub methods: Vec<MethodSpec>,
    pub scheduled_source: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSummary {
    pub key: &'static str,
    pub required: bool,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<OptionDefault>,
}

impl From<&NodeSchema> for NodeSchemaSummary {
    fn from(schema: &NodeSchema) -> Self {
        let options = schema
            .options
            .iter()
            .map(|o| match o.value {
                OptionValue::Scalar { target, default } => OptionSummary {
                    key: o.key,
                    required: o.required,
                    kind: target_label(target),
                    default: Some(default),
                },
                OptionValue::Sequence { element } => OptionSummary {
                    key: o.key,
                    required: o.required,
                    kind: format!("sequence<{}>", element.name()),
                    default: None,
                },
            })
            .collect();

        NodeSchemaSummary {
            name: schema.name,
            options_name: schema.options_name,
            min_args: schema.min_args(),
            accepted_contexts: schema.accepted_contexts.to_vec(),
            positional: schema.positional.iter().map(|p| p.name).collect(),
            options,
            channel_defaults: schema.channel_defaults,
            params: schema.params.to_vec(),
            methods: schema.methods.to_vec(),
            scheduled_source: schema.scheduled_source,
        }
    }
}

fn target_label(target: CoercionTarget) -> String {
    match target {
        CoercionTarget::Float => "float".into(),
        CoercionTarget::UnrestrictedFloat => "unrestricted float".into(),
        CoercionTarget::Double => "double".into(),
        CoercionTarget::UnrestrictedDouble => "unrestricted double".into(),
        CoercionTarget::UnsignedLong { .. } => "unsigned long".into(),
        CoercionTarget::Boolean => "boolean".into(),
        CoercionTarget::DomString => "DOMString".into(),
        CoercionTarget::Enum { type_name, .. } => type_name.into(),
        CoercionTarget::AudioBufferOrNull => "AudioBuffer?".into(),
        CoercionTarget::Any => "any".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_argument_counts() {
        assert_eq!(NodeKind::Gain.schema().min_args(), 1);
        assert_eq!(NodeKind::IirFilter.schema().min_args(), 2);
        assert_eq!(NodeKind::AudioWorklet.schema().min_args(), 2);
        assert_eq!(NodeKind::AudioWorklet.schema().options_position(), 3);
    }

    #[test]
    fn method_arity_counts_leading_required_args() {
        assert_eq!(CONNECT.arity(), 1);
        assert_eq!(DISCONNECT.arity(), 0);
        assert_eq!(GET_FREQUENCY_RESPONSE.arity(), 3);
        assert_eq!(SET_TARGET_AT_TIME.arity(), 3);
        assert_eq!(START.arity(), 0);
    }

    #[test]
    fn names_round_trip_through_lookup() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_name(kind.name()), Some(kind));
            assert_eq!(kind.schema().kind, kind);
        }
        assert_eq!(NodeKind::from_name("PannerNode"), None);
    }

    #[test]
    fn every_param_has_a_matching_option_default() {
        for schema in node_schemas() {
            for param in schema.params {
                let Some(option) = schema.option(param.name) else {
                    panic!("{} param {} has no option", schema.name, param.name);
                };
                assert!(!option.required);
            }
        }
    }
}
