//! Native engine boundary.
//!
//! The bridge only ever talks to the audio engine through [`NativeEngine`]
//! and the opaque handles it hands out. Calls are synchronous from the
//! host's point of view; rendering happens on the engine's own terms.

use std::fmt;

use crate::error::NativeError;
use crate::options::ParsedOptions;
use crate::schema::{AutomationRate, ContextKind, NodeKind};

pub mod reference;
pub mod response;

pub use reference::ReferenceEngine;

pub type NativeResult<T> = std::result::Result<T, NativeError>;

macro_rules! native_handle {
    ($name:ident, $label:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

native_handle!(NativeContextHandle, "context");
native_handle!(NativeNodeHandle, "node");
native_handle!(NativeParamHandle, "param");

/// What the engine needs to allocate a context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextSpec {
    pub kind: ContextKind,
    /// `None` lets the engine pick its configured default.
    pub sample_rate: Option<f32>,
    pub number_of_channels: u32,
    /// Frame count for offline contexts, zero for realtime ones.
    pub length: u32,
}

/// Descriptor of a native parameter as allocated, ranges included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamInfo {
    pub default_value: f32,
    pub min_value: f32,
    pub max_value: f32,
    pub automation_rate: AutomationRate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutomationEvent {
    SetValueAtTime { value: f32, start_time: f64 },
    LinearRampToValueAtTime { value: f32, end_time: f64 },
    ExponentialRampToValueAtTime { value: f32, end_time: f64 },
    SetTargetAtTime { target: f32, start_time: f64, time_constant: f32 },
    CancelScheduledValues { cancel_time: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectTarget {
    Node(NativeNodeHandle),
    Param(NativeParamHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectTarget {
    All,
    Output(u32),
    Destination(ConnectTarget),
}

/// Notification raised by the engine for a node, delivered in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeEvent {
    pub node: NativeNodeHandle,
    pub event_type: String,
}

/// One render quantum of output: `[output][channel][frame]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuantum {
    pub outputs: Vec<Vec<Vec<f32>>>,
    pub keep_alive: bool,
}

pub trait NativeEngine: Send + Sync {
    fn create_context(&self, spec: &ContextSpec) -> NativeResult<NativeContextHandle>;
    fn release_context(&self, context: NativeContextHandle);
    fn context_sample_rate(&self, context: NativeContextHandle) -> NativeResult<f32>;

    fn create_node(
        &self,
        context: NativeContextHandle,
        kind: NodeKind,
        options: &ParsedOptions,
    ) -> NativeResult<NativeNodeHandle>;
    fn release_node(&self, node: NativeNodeHandle);

    fn param_handle(&self, node: NativeNodeHandle, name: &str) -> NativeResult<NativeParamHandle>;
    fn param_info(&self, param: NativeParamHandle) -> NativeResult<ParamInfo>;
    fn param_value(&self, param: NativeParamHandle) -> NativeResult<f32>;
    fn set_param_value(&self, param: NativeParamHandle, value: f32) -> NativeResult<()>;
    fn schedule_param(&self, param: NativeParamHandle, event: AutomationEvent) -> NativeResult<()>;

    fn connect(
        &self,
        from: NativeNodeHandle,
        to: ConnectTarget,
        output: u32,
        input: u32,
    ) -> NativeResult<()>;
    fn disconnect(&self, from: NativeNodeHandle, target: DisconnectTarget) -> NativeResult<()>;

    fn start_source(&self, node: NativeNodeHandle, when: f64) -> NativeResult<()>;
    fn stop_source(&self, node: NativeNodeHandle, when: f64) -> NativeResult<()>;

    fn get_frequency_response(
        &self,
        node: NativeNodeHandle,
        frequency_hz: &[f32],
        mag_response: &mut [f32],
        phase_response: &mut [f32],
    ) -> NativeResult<()>;

    /// Drain pending notifications for every node of `context`.
    fn take_events(&self, context: NativeContextHandle) -> Vec<NativeEvent>;

    /// Run one render quantum for a processor-backed node.
    fn render_quantum(&self, node: NativeNodeHandle) -> NativeResult<RenderedQuantum>;
}
