//! In-process engine used by tests, the CLI and hosts without a hardware
//! backend. It keeps the audio graph in a handle arena and enforces the
//! rules a real engine enforces at allocation and call time. It renders
//! processor-backed nodes one quantum at a time and nothing else.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;

use super::response::{self, BiquadSettings};
use super::{
    AutomationEvent, ConnectTarget, ContextSpec, DisconnectTarget, NativeContextHandle,
    NativeEngine, NativeEvent, NativeNodeHandle, NativeParamHandle, NativeResult, ParamInfo,
    RenderedQuantum,
};
use crate::buffer::AudioBuffer;
use crate::config::BridgeConfig;
use crate::error::{NativeError, NativeErrorKind};
use crate::options::ParsedOptions;
use crate::schema::{ContextKind, NodeKind};
use crate::worklet::{
    self, AudioWorkletProcessor, ProcessorOptions, ProcessorParameters, ProcessorRegistry,
};

const MIN_SAMPLE_RATE: f32 = 3_000.0;
const MAX_SAMPLE_RATE: f32 = 768_000.0;
const MAX_DELAY_TIME: f64 = 180.0;
const MIN_FFT_SIZE: u32 = 32;
const MAX_FFT_SIZE: u32 = 32_768;

/// Native failures carry the location that raised them, the way engine
/// errors do. The bridge strips it before the host sees the message.
#[track_caller]
fn reject(kind: NativeErrorKind, message: impl fmt::Display) -> NativeError {
    let at = Location::caller();
    NativeError::new(format!(
        "{} - {} at {}:{}:{}",
        kind.name(),
        message,
        at.file(),
        at.line(),
        at.column()
    ))
}

struct ContextEntry {
    kind: ContextKind,
    sample_rate: f32,
    number_of_channels: u32,
    length: u32,
    events: VecDeque<NativeEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceState {
    Idle,
    Started,
    Stopped,
}

enum NodeState {
    Plain,
    Biquad {
        filter_type: String,
    },
    Iir {
        feedforward: Vec<f64>,
        feedback: Vec<f64>,
    },
    Convolver {
        buffer: Option<Arc<AudioBuffer>>,
        normalize: bool,
    },
    Oscillator {
        wave_type: String,
    },
    Analyser {
        fft_size: u32,
    },
    Worklet {
        /// Taken out while `process` runs with the arena unlocked.
        processor: Option<Box<dyn AudioWorkletProcessor>>,
        alive: bool,
    },
}

struct NodeEntry {
    context: NativeContextHandle,
    kind: NodeKind,
    number_of_inputs: u32,
    number_of_outputs: u32,
    channel_count: u32,
    params: Vec<NativeParamHandle>,
    connections: Vec<Connection>,
    source: SourceState,
    state: NodeState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub output: u32,
    pub target: ConnectTarget,
    pub input: u32,
}

struct ParamEntry {
    node: NativeNodeHandle,
    name: &'static str,
    info: ParamInfo,
    value: f32,
    timeline: Vec<AutomationEvent>,
}

#[derive(Default)]
struct Arena {
    next_id: u64,
    contexts: HashMap<NativeContextHandle, ContextEntry>,
    nodes: HashMap<NativeNodeHandle, NodeEntry>,
    params: HashMap<NativeParamHandle, ParamEntry>,
}

impl Arena {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    #[track_caller]
    fn context(&self, handle: NativeContextHandle) -> NativeResult<&ContextEntry> {
        self.contexts.get(&handle).ok_or_else(|| {
            reject(
                NativeErrorKind::InvalidStateError,
                format_args!("{:?} has been released", handle),
            )
        })
    }

    #[track_caller]
    fn node(&self, handle: NativeNodeHandle) -> NativeResult<&NodeEntry> {
        self.nodes.get(&handle).ok_or_else(|| {
            reject(
                NativeErrorKind::InvalidAccessError,
                format_args!("{:?} has been released", handle),
            )
        })
    }

    #[track_caller]
    fn node_mut(&mut self, handle: NativeNodeHandle) -> NativeResult<&mut NodeEntry> {
        self.nodes.get_mut(&handle).ok_or_else(|| {
            reject(
                NativeErrorKind::InvalidAccessError,
                format_args!("{:?} has been released", handle),
            )
        })
    }

    #[track_caller]
    fn param_mut(&mut self, handle: NativeParamHandle) -> NativeResult<&mut ParamEntry> {
        self.params.get_mut(&handle).ok_or_else(|| {
            reject(
                NativeErrorKind::InvalidAccessError,
                format_args!("{:?} has been released", handle),
            )
        })
    }

    fn target_context(&self, target: ConnectTarget) -> NativeResult<NativeContextHandle> {
        let node = match target {
            ConnectTarget::Node(node) => node,
            ConnectTarget::Param(param) => match self.params.get(&param) {
                Some(entry) => entry.node,
                None => {
                    return Err(reject(
                        NativeErrorKind::InvalidAccessError,
                        format_args!("{:?} has been released", param),
                    ));
                }
            },
        };
        Ok(self.node(node)?.context)
    }

    fn remove_node(&mut self, handle: NativeNodeHandle) {
        let Some(entry) = self.nodes.remove(&handle) else {
            return;
        };
        for param in &entry.params {
            self.params.remove(param);
        }
        for other in self.nodes.values_mut() {
            other.connections.retain(|c| match c.target {
                ConnectTarget::Node(n) => n != handle,
                ConnectTarget::Param(p) => !entry.params.contains(&p),
            });
        }
    }
}

pub struct ReferenceEngine {
    config: BridgeConfig,
    processors: ProcessorRegistry,
    arena: Mutex<Arena>,
}

impl fmt::Debug for ReferenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = self.arena.lock();
        f.debug_struct("ReferenceEngine")
            .field("contexts", &arena.contexts.len())
            .field("nodes", &arena.nodes.len())
            .field("processors", &self.processors)
            .finish()
    }
}

impl Default for ReferenceEngine {
    fn default() -> Self {
        Self::new(BridgeConfig::default(), ProcessorRegistry::with_builtin())
    }
}

impl ReferenceEngine {
    pub fn new(config: BridgeConfig, processors: ProcessorRegistry) -> Self {
        Self {
            config,
            processors,
            arena: Mutex::new(Arena::default()),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn processors(&self) -> &ProcessorRegistry {
        &self.processors
    }

    pub fn live_contexts(&self) -> usize {
        self.arena.lock().contexts.len()
    }

    pub fn live_nodes(&self) -> usize {
        self.arena.lock().nodes.len()
    }

    pub fn connections(&self, node: NativeNodeHandle) -> Vec<Connection> {
        self.arena
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.connections.clone())
            .unwrap_or_default()
    }

    /// Offline context length and channel count, `None` once released.
    pub fn offline_shape(&self, context: NativeContextHandle) -> Option<(u32, u32)> {
        let arena = self.arena.lock();
        let entry = arena.contexts.get(&context)?;
        (entry.kind == ContextKind::Offline).then_some((entry.number_of_channels, entry.length))
    }

    /// Automation events recorded for `param`, in scheduling order.
    pub fn timeline(&self, param: NativeParamHandle) -> Vec<AutomationEvent> {
        self.arena
            .lock()
            .params
            .get(&param)
            .map(|p| p.timeline.clone())
            .unwrap_or_default()
    }

    /// Snapshot of a node's native state for inspection tools.
    pub fn describe_node(&self, node: NativeNodeHandle) -> Option<serde_json::Value> {
        let arena = self.arena.lock();
        let entry = arena.nodes.get(&node)?;

        let params: serde_json::Map<_, _> = entry
            .params
            .iter()
            .filter_map(|p| arena.params.get(p))
            .map(|p| (p.name.to_string(), serde_json::json!(p.value)))
            .collect();

        let state = match &entry.state {
            NodeState::Plain => serde_json::Value::Null,
            NodeState::Biquad { filter_type } => serde_json::json!({ "type": filter_type }),
            NodeState::Iir {
                feedforward,
                feedback,
            } => serde_json::json!({ "feedforward": feedforward, "feedback": feedback }),
            NodeState::Convolver { buffer, normalize } => serde_json::json!({
                "bufferChannels": buffer.as_ref().map(|b| b.number_of_channels()),
                "normalize": normalize,
            }),
            NodeState::Oscillator { wave_type } => serde_json::json!({ "type": wave_type }),
            NodeState::Analyser { fft_size } => serde_json::json!({
                "fftSize": fft_size,
                "frequencyBinCount": fft_size / 2,
            }),
            NodeState::Worklet { alive, .. } => serde_json::json!({ "alive": alive }),
        };

        Some(serde_json::json!({
            "kind": entry.kind.name(),
            "numberOfInputs": entry.number_of_inputs,
            "numberOfOutputs": entry.number_of_outputs,
            "channelCount": entry.channel_count,
            "params": params,
            "state": state,
        }))
    }

    fn check_channel_config(&self, kind: NodeKind, options: &ParsedOptions) -> NativeResult<()> {
        let count = options.channel_count;
        if count == 0 || count > self.config.max_channel_count {
            return Err(reject(
                NativeErrorKind::NotSupportedError,
                format_args!(
                    "channel count {} is outside the range [1, {}]",
                    count, self.config.max_channel_count
                ),
            ));
        }

        if matches!(kind, NodeKind::StereoPanner | NodeKind::Convolver) {
            if count > 2 {
                return Err(reject(
                    NativeErrorKind::NotSupportedError,
                    format_args!("{} channel count cannot be greater than two", kind),
                ));
            }
            if options.channel_count_mode == "max" {
                return Err(reject(
                    NativeErrorKind::NotSupportedError,
                    format_args!("{} channel count mode cannot be 'max'", kind),
                ));
            }
        }
        Ok(())
    }

    fn iir_state(&self, options: &ParsedOptions) -> NativeResult<NodeState> {
        let feedforward = options
            .sequence("feedforward")
            .map(|s| s.to_f64_vec())
            .unwrap_or_default();
        let feedback = options
            .sequence("feedback")
            .map(|s| s.to_f64_vec())
            .unwrap_or_default();

        for (name, coefficients) in [("feedforward", &feedforward), ("feedback", &feedback)] {
            if coefficients.is_empty() || coefficients.len() > self.config.max_iir_order {
                return Err(reject(
                    NativeErrorKind::NotSupportedError,
                    format_args!(
                        "{} must have between 1 and {} coefficients, got {}",
                        name,
                        self.config.max_iir_order,
                        coefficients.len()
                    ),
                ));
            }
        }
        if feedforward.iter().all(|c| *c == 0.0) {
            return Err(reject(
                NativeErrorKind::InvalidStateError,
                "feedforward coefficients cannot all be zero",
            ));
        }
        if feedback[0] == 0.0 {
            return Err(reject(
                NativeErrorKind::InvalidStateError,
                "first feedback coefficient cannot be zero",
            ));
        }

        Ok(NodeState::Iir {
            feedforward,
            feedback,
        })
    }

    fn node_state(
        &self,
        kind: NodeKind,
        options: &ParsedOptions,
        sample_rate: f32,
    ) -> NativeResult<NodeState> {
        Ok(match kind {
            NodeKind::Gain | NodeKind::StereoPanner | NodeKind::ConstantSource => NodeState::Plain,
            NodeKind::Delay => {
                let max_delay = options.f64("maxDelayTime").unwrap_or(1.0);
                if !(max_delay > 0.0 && max_delay < MAX_DELAY_TIME) {
                    return Err(reject(
                        NativeErrorKind::NotSupportedError,
                        format_args!(
                            "maxDelayTime ({}) must be between 0 and {} seconds, exclusive",
                            max_delay, MAX_DELAY_TIME
                        ),
                    ));
                }
                NodeState::Plain
            }
            NodeKind::BiquadFilter => NodeState::Biquad {
                filter_type: options.str("type").unwrap_or("lowpass").to_string(),
            },
            NodeKind::IirFilter => self.iir_state(options)?,
            NodeKind::Convolver => {
                let buffer = options.buffer("buffer");
                if let Some(buffer) = &buffer {
                    if !matches!(buffer.number_of_channels(), 1 | 2 | 4) {
                        return Err(reject(
                            NativeErrorKind::NotSupportedError,
                            format_args!(
                                "buffer must have 1, 2 or 4 channels, got {}",
                                buffer.number_of_channels()
                            ),
                        ));
                    }
                    if buffer.sample_rate() != sample_rate {
                        return Err(reject(
                            NativeErrorKind::NotSupportedError,
                            format_args!(
                                "buffer sample rate ({}) does not match the context sample rate ({})",
                                buffer.sample_rate(),
                                sample_rate
                            ),
                        ));
                    }
                }
                NodeState::Convolver {
                    buffer,
                    normalize: !options.bool("disableNormalization").unwrap_or(false),
                }
            }
            NodeKind::Oscillator => {
                let wave_type = options.str("type").unwrap_or("sine");
                if wave_type == "custom" {
                    return Err(reject(
                        NativeErrorKind::InvalidStateError,
                        "oscillator type 'custom' requires a periodic wave",
                    ));
                }
                NodeState::Oscillator {
                    wave_type: wave_type.to_string(),
                }
            }
            NodeKind::Analyser => {
                let fft_size = options.u32("fftSize").unwrap_or(2048);
                if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size)
                {
                    return Err(reject(
                        NativeErrorKind::IndexSizeError,
                        format_args!(
                            "fftSize ({}) must be a power of two between {} and {}",
                            fft_size, MIN_FFT_SIZE, MAX_FFT_SIZE
                        ),
                    ));
                }
                let min_db = options.f64("minDecibels").unwrap_or(-100.0);
                let max_db = options.f64("maxDecibels").unwrap_or(-30.0);
                if min_db >= max_db {
                    return Err(reject(
                        NativeErrorKind::IndexSizeError,
                        format_args!(
                            "minDecibels ({}) must be less than maxDecibels ({})",
                            min_db, max_db
                        ),
                    ));
                }
                let smoothing = options.f64("smoothingTimeConstant").unwrap_or(0.8);
                if !(0.0..=1.0).contains(&smoothing) {
                    return Err(reject(
                        NativeErrorKind::IndexSizeError,
                        format_args!("smoothingTimeConstant ({}) must be in [0, 1]", smoothing),
                    ));
                }
                NodeState::Analyser { fft_size }
            }
            NodeKind::AudioWorklet => {
                let name = options
                    .positional("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or_default();
                if !self.processors.contains(name) {
                    return Err(reject(
                        NativeErrorKind::InvalidStateError,
                        format_args!("no processor registered under the name '{}'", name),
                    ));
                }
                let inputs = options.u32("numberOfInputs").unwrap_or(1);
                let outputs = options.u32("numberOfOutputs").unwrap_or(1);
                if inputs == 0 && outputs == 0 {
                    return Err(reject(
                        NativeErrorKind::NotSupportedError,
                        "numberOfInputs and numberOfOutputs cannot both be zero",
                    ));
                }
                let processor = self.processors.instantiate(
                    name,
                    &ProcessorOptions {
                        number_of_inputs: inputs,
                        number_of_outputs: outputs,
                        output_channel_count: options.channel_count,
                        processor_options: options.any("processorOptions").cloned().unwrap_or_default(),
                    },
                )?;
                NodeState::Worklet {
                    processor: Some(processor),
                    alive: true,
                }
            }
        })
    }

    fn initial_param_info(
        kind: NodeKind,
        name: &str,
        options: &ParsedOptions,
        sample_rate: f32,
    ) -> Option<ParamInfo> {
        let spec = kind.schema().param(name)?;
        let nyquist = sample_rate / 2.0;
        let (min_value, max_value) = match (kind, name) {
            (NodeKind::Delay, "delayTime") => {
                (0.0, options.f64("maxDelayTime").unwrap_or(1.0) as f32)
            }
            (NodeKind::BiquadFilter, "frequency") => (0.0, nyquist),
            (NodeKind::Oscillator, "frequency") => (-nyquist, nyquist),
            _ => (spec.min_value, spec.max_value),
        };
        Some(ParamInfo {
            default_value: spec.default_value,
            min_value,
            max_value,
            automation_rate: spec.automation_rate,
        })
    }
}

fn check_time(label: &str, time: f64) -> NativeResult<()> {
    if time < 0.0 || !time.is_finite() {
        return Err(reject(
            NativeErrorKind::RangeError,
            format_args!("{} ({}) must be a finite non-negative number", label, time),
        ));
    }
    Ok(())
}

impl NativeEngine for ReferenceEngine {
    fn create_context(&self, spec: &ContextSpec) -> NativeResult<NativeContextHandle> {
        let sample_rate = spec.sample_rate.unwrap_or(self.config.default_sample_rate);
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(reject(
                NativeErrorKind::NotSupportedError,
                format_args!(
                    "sample rate ({}) is outside the range [{}, {}]",
                    sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
                ),
            ));
        }

        if spec.kind == ContextKind::Offline {
            if spec.number_of_channels == 0 || spec.number_of_channels > self.config.max_channel_count
            {
                return Err(reject(
                    NativeErrorKind::NotSupportedError,
                    format_args!(
                        "number of channels ({}) is outside the range [1, {}]",
                        spec.number_of_channels, self.config.max_channel_count
                    ),
                ));
            }
            if spec.length == 0 {
                return Err(reject(
                    NativeErrorKind::NotSupportedError,
                    "length must be greater than zero",
                ));
            }
        }

        let mut arena = self.arena.lock();
        let handle = NativeContextHandle::from_raw(arena.next());
        arena.contexts.insert(
            handle,
            ContextEntry {
                kind: spec.kind,
                sample_rate,
                number_of_channels: spec.number_of_channels,
                length: spec.length,
                events: VecDeque::new(),
            },
        );
        tracing::debug!(?handle, kind = spec.kind.name(), sample_rate, "context created");
        Ok(handle)
    }

    fn release_context(&self, context: NativeContextHandle) {
        let mut arena = self.arena.lock();
        if arena.contexts.remove(&context).is_none() {
            return;
        }
        let orphans: Vec<_> = arena
            .nodes
            .iter()
            .filter(|(_, n)| n.context == context)
            .map(|(h, _)| *h)
            .collect();
        for node in orphans {
            arena.remove_node(node);
        }
        tracing::debug!(?context, "context released");
    }

    fn context_sample_rate(&self, context: NativeContextHandle) -> NativeResult<f32> {
        Ok(self.arena.lock().context(context)?.sample_rate)
    }

    fn create_node(
        &self,
        context: NativeContextHandle,
        kind: NodeKind,
        options: &ParsedOptions,
    ) -> NativeResult<NativeNodeHandle> {
        let sample_rate = self.context_sample_rate(context)?;
        self.check_channel_config(kind, options)?;
        let state = self.node_state(kind, options, sample_rate)?;

        let schema = kind.schema();
        let (number_of_inputs, number_of_outputs) = match kind {
            NodeKind::AudioWorklet => (
                options.u32("numberOfInputs").unwrap_or(1),
                options.u32("numberOfOutputs").unwrap_or(1),
            ),
            _ => (schema.number_of_inputs, schema.number_of_outputs),
        };

        let mut arena = self.arena.lock();
        // the context may have gone away while the state was being built
        arena.context(context)?;

        let handle = NativeNodeHandle::from_raw(arena.next());
        let mut params = Vec::with_capacity(schema.params.len());
        for spec in schema.params {
            let Some(info) = Self::initial_param_info(kind, spec.name, options, sample_rate) else {
                continue;
            };
            let initial = options.f32(spec.name).unwrap_or(info.default_value);

            let param = NativeParamHandle::from_raw(arena.next());
            arena.params.insert(
                param,
                ParamEntry {
                    node: handle,
                    name: spec.name,
                    info,
                    value: initial,
                    timeline: Vec::new(),
                },
            );
            params.push(param);
        }

        arena.nodes.insert(
            handle,
            NodeEntry {
                context,
                kind,
                number_of_inputs,
                number_of_outputs,
                channel_count: options.channel_count,
                params,
                connections: Vec::new(),
                source: SourceState::Idle,
                state,
            },
        );
        tracing::debug!(?handle, %kind, "node created");
        Ok(handle)
    }

    fn release_node(&self, node: NativeNodeHandle) {
        self.arena.lock().remove_node(node);
        tracing::debug!(?node, "node released");
    }

    fn param_handle(&self, node: NativeNodeHandle, name: &str) -> NativeResult<NativeParamHandle> {
        let arena = self.arena.lock();
        let entry = arena.node(node)?;
        entry
            .params
            .iter()
            .copied()
            .find(|p| arena.params.get(p).is_some_and(|param| param.name == name))
            .ok_or_else(|| {
                reject(
                    NativeErrorKind::InvalidAccessError,
                    format_args!("{} has no parameter named '{}'", entry.kind, name),
                )
            })
    }

    fn param_info(&self, param: NativeParamHandle) -> NativeResult<ParamInfo> {
        Ok(self.arena.lock().param_mut(param)?.info)
    }

    fn param_value(&self, param: NativeParamHandle) -> NativeResult<f32> {
        Ok(self.arena.lock().param_mut(param)?.value)
    }

    fn set_param_value(&self, param: NativeParamHandle, value: f32) -> NativeResult<()> {
        if !value.is_finite() {
            return Err(reject(
                NativeErrorKind::TypeError,
                "parameter value must be finite",
            ));
        }
        self.arena.lock().param_mut(param)?.value = value;
        Ok(())
    }

    fn schedule_param(&self, param: NativeParamHandle, event: AutomationEvent) -> NativeResult<()> {
        match event {
            AutomationEvent::SetValueAtTime { start_time, .. } => check_time("startTime", start_time)?,
            AutomationEvent::LinearRampToValueAtTime { end_time, .. } => {
                check_time("endTime", end_time)?
            }
            AutomationEvent::ExponentialRampToValueAtTime { value, end_time } => {
                check_time("endTime", end_time)?;
                if value == 0.0 {
                    return Err(reject(
                        NativeErrorKind::RangeError,
                        "exponential ramp target value cannot be zero",
                    ));
                }
            }
            AutomationEvent::SetTargetAtTime {
                start_time,
                time_constant,
                ..
            } => {
                check_time("startTime", start_time)?;
                if time_constant < 0.0 {
                    return Err(reject(
                        NativeErrorKind::RangeError,
                        format_args!("timeConstant ({}) must be non-negative", time_constant),
                    ));
                }
            }
            AutomationEvent::CancelScheduledValues { cancel_time } => {
                check_time("cancelTime", cancel_time)?
            }
        }

        let mut arena = self.arena.lock();
        let entry = arena.param_mut(param)?;
        match event {
            AutomationEvent::CancelScheduledValues { cancel_time } => {
                entry.timeline.retain(|e| event_time(e) < cancel_time);
            }
            AutomationEvent::SetValueAtTime { value, start_time } if start_time == 0.0 => {
                // the timeline has not advanced, so time zero applies now
                entry.value = value;
                entry.timeline.push(event);
            }
            _ => entry.timeline.push(event),
        }
        Ok(())
    }

    fn connect(
        &self,
        from: NativeNodeHandle,
        to: ConnectTarget,
        output: u32,
        input: u32,
    ) -> NativeResult<()> {
        let mut arena = self.arena.lock();
        let source = arena.node(from)?;
        if output >= source.number_of_outputs {
            return Err(reject(
                NativeErrorKind::IndexSizeError,
                format_args!(
                    "output index ({}) exceeds number of outputs ({})",
                    output, source.number_of_outputs
                ),
            ));
        }
        let source_context = source.context;

        if arena.target_context(to)? != source_context {
            return Err(reject(
                NativeErrorKind::InvalidAccessError,
                "cannot connect to a destination belonging to a different context",
            ));
        }
        if let ConnectTarget::Node(dest) = to {
            let inputs = arena.node(dest)?.number_of_inputs;
            if input >= inputs {
                return Err(reject(
                    NativeErrorKind::IndexSizeError,
                    format_args!("input index ({}) exceeds number of inputs ({})", input, inputs),
                ));
            }
        }

        let connection = Connection {
            output,
            target: to,
            input,
        };
        let entry = arena.node_mut(from)?;
        if !entry.connections.contains(&connection) {
            entry.connections.push(connection);
        }
        Ok(())
    }

    fn disconnect(&self, from: NativeNodeHandle, target: DisconnectTarget) -> NativeResult<()> {
        let mut arena = self.arena.lock();
        let entry = arena.node_mut(from)?;
        match target {
            DisconnectTarget::All => entry.connections.clear(),
            DisconnectTarget::Output(output) => {
                if output >= entry.number_of_outputs {
                    return Err(reject(
                        NativeErrorKind::IndexSizeError,
                        format_args!(
                            "output index ({}) exceeds number of outputs ({})",
                            output, entry.number_of_outputs
                        ),
                    ));
                }
                entry.connections.retain(|c| c.output != output);
            }
            DisconnectTarget::Destination(dest) => {
                let before = entry.connections.len();
                entry.connections.retain(|c| c.target != dest);
                if entry.connections.len() == before {
                    return Err(reject(
                        NativeErrorKind::InvalidAccessError,
                        "node is not connected to the given destination",
                    ));
                }
            }
        }
        Ok(())
    }

    fn start_source(&self, node: NativeNodeHandle, when: f64) -> NativeResult<()> {
        check_time("when", when)?;
        let mut arena = self.arena.lock();
        let entry = arena.node_mut(node)?;
        if !entry.kind.schema().scheduled_source {
            return Err(reject(
                NativeErrorKind::InvalidStateError,
                format_args!("{} is not a scheduled source", entry.kind),
            ));
        }
        if entry.source != SourceState::Idle {
            return Err(reject(
                NativeErrorKind::InvalidStateError,
                "start cannot be called more than once",
            ));
        }
        entry.source = SourceState::Started;
        Ok(())
    }

    fn stop_source(&self, node: NativeNodeHandle, when: f64) -> NativeResult<()> {
        check_time("when", when)?;
        let mut arena = self.arena.lock();
        let entry = arena.node_mut(node)?;
        let state = entry.source;
        match state {
            SourceState::Idle => Err(reject(
                NativeErrorKind::InvalidStateError,
                "cannot call stop before start",
            )),
            SourceState::Stopped => Ok(()),
            SourceState::Started => {
                entry.source = SourceState::Stopped;
                let context = entry.context;
                if let Some(ctx) = arena.contexts.get_mut(&context) {
                    ctx.events.push_back(NativeEvent {
                        node,
                        event_type: "ended".to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    fn get_frequency_response(
        &self,
        node: NativeNodeHandle,
        frequency_hz: &[f32],
        mag_response: &mut [f32],
        phase_response: &mut [f32],
    ) -> NativeResult<()> {
        if mag_response.len() != frequency_hz.len() || phase_response.len() != frequency_hz.len() {
            return Err(reject(
                NativeErrorKind::InvalidAccessError,
                format_args!(
                    "response arrays must match the frequency array length ({}), got {} and {}",
                    frequency_hz.len(),
                    mag_response.len(),
                    phase_response.len()
                ),
            ));
        }

        let arena = self.arena.lock();
        let entry = arena.node(node)?;
        let sample_rate = arena.context(entry.context)?.sample_rate as f64;

        match &entry.state {
            NodeState::Iir {
                feedforward,
                feedback,
            } => response::transfer_response(
                feedforward,
                feedback,
                sample_rate,
                frequency_hz,
                mag_response,
                phase_response,
            ),
            NodeState::Biquad { filter_type } => {
                let value = |name: &str| {
                    entry
                        .params
                        .iter()
                        .filter_map(|p| arena.params.get(p))
                        .find(|p| p.name == name)
                        .map(|p| p.value as f64)
                        .unwrap_or_default()
                };
                let settings = BiquadSettings {
                    filter_type,
                    frequency: value("frequency"),
                    detune: value("detune"),
                    q: value("Q"),
                    gain: value("gain"),
                };
                let coefficients = response::biquad_coefficients(&settings, sample_rate);
                response::biquad_response(
                    &coefficients,
                    sample_rate,
                    frequency_hz,
                    mag_response,
                    phase_response,
                );
            }
            _ => {
                return Err(reject(
                    NativeErrorKind::InvalidAccessError,
                    format_args!("{} has no frequency response", entry.kind),
                ));
            }
        }
        Ok(())
    }

    fn take_events(&self, context: NativeContextHandle) -> Vec<NativeEvent> {
        self.arena
            .lock()
            .contexts
            .get_mut(&context)
            .map(|c| c.events.drain(..).collect())
            .unwrap_or_default()
    }

    fn render_quantum(&self, node: NativeNodeHandle) -> NativeResult<RenderedQuantum> {
        let (mut processor, inputs, mut outputs) = {
            let mut arena = self.arena.lock();
            let entry = arena.node_mut(node)?;
            let inputs = worklet::silent_ports(entry.number_of_inputs, entry.channel_count);
            let outputs = worklet::silent_ports(entry.number_of_outputs, entry.channel_count);

            let NodeState::Worklet { processor, alive } = &mut entry.state else {
                return Err(reject(
                    NativeErrorKind::InvalidStateError,
                    format_args!("{} is not backed by a processor", entry.kind),
                ));
            };
            if !*alive {
                return Ok(RenderedQuantum {
                    outputs,
                    keep_alive: false,
                });
            }
            let processor = processor.take().ok_or_else(|| {
                reject(
                    NativeErrorKind::InvalidStateError,
                    format_args!("{:?} is already rendering", node),
                )
            })?;
            (processor, inputs, outputs)
        };

        // the arena is unlocked so the processor may call back into the engine
        let keep_alive = processor.process(&inputs, &mut outputs, &ProcessorParameters::new());
        if !keep_alive {
            tracing::debug!(?node, "processor finished");
        }

        let mut arena = self.arena.lock();
        // a node released mid-quantum drops its processor here
        if let Ok(entry) = arena.node_mut(node) {
            if let NodeState::Worklet { processor: slot, alive } = &mut entry.state {
                *slot = Some(processor);
                *alive = keep_alive;
            }
        }

        Ok(RenderedQuantum {
            outputs,
            keep_alive,
        })
    }
}

fn event_time(event: &AutomationEvent) -> f64 {
    match *event {
        AutomationEvent::SetValueAtTime { start_time, .. } => start_time,
        AutomationEvent::LinearRampToValueAtTime { end_time, .. } => end_time,
        AutomationEvent::ExponentialRampToValueAtTime { end_time, .. } => end_time,
        AutomationEvent::SetTargetAtTime { start_time, .. } => start_time,
        AutomationEvent::CancelScheduledValues { cancel_time } => cancel_time,
    }
}
