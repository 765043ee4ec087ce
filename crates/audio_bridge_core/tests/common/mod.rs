#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use audio_bridge_core::engine::{
    AutomationEvent, ConnectTarget, ContextSpec, DisconnectTarget, NativeContextHandle,
    NativeEvent, NativeNodeHandle, NativeParamHandle, NativeResult, ParamInfo, RenderedQuantum,
};
use audio_bridge_core::options::ParsedOptions;
use audio_bridge_core::{
    AudioContext, HostValue, NativeEngine, NativeError, NodeKind, ReferenceEngine,
};

/// Reference engine wrapper that records every native call by name.
#[derive(Default)]
pub struct RecordingEngine {
    pub inner: ReferenceEngine,
    calls: Mutex<Vec<&'static str>>,
    fail_param_handles: AtomicBool,
}

impl RecordingEngine {
    pub fn new(inner: ReferenceEngine) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Make every subsequent `param_handle` call fail with an unstructured
    /// native error.
    pub fn fail_param_handles(&self) {
        self.fail_param_handles.store(true, Ordering::SeqCst);
    }
}

impl NativeEngine for RecordingEngine {
    fn create_context(&self, spec: &ContextSpec) -> NativeResult<NativeContextHandle> {
        self.record("create_context");
        self.inner.create_context(spec)
    }

    fn release_context(&self, context: NativeContextHandle) {
        self.record("release_context");
        self.inner.release_context(context)
    }

    fn context_sample_rate(&self, context: NativeContextHandle) -> NativeResult<f32> {
        self.record("context_sample_rate");
        self.inner.context_sample_rate(context)
    }

    fn create_node(
        &self,
        context: NativeContextHandle,
        kind: NodeKind,
        options: &ParsedOptions,
    ) -> NativeResult<NativeNodeHandle> {
        self.record("create_node");
        self.inner.create_node(context, kind, options)
    }

    fn release_node(&self, node: NativeNodeHandle) {
        self.record("release_node");
        self.inner.release_node(node)
    }

    fn param_handle(&self, node: NativeNodeHandle, name: &str) -> NativeResult<NativeParamHandle> {
        self.record("param_handle");
        if self.fail_param_handles.load(Ordering::SeqCst) {
            return Err(NativeError::new("panicked at 0xdeadbeef: sub-handle table poisoned"));
        }
        self.inner.param_handle(node, name)
    }

    fn param_info(&self, param: NativeParamHandle) -> NativeResult<ParamInfo> {
        self.record("param_info");
        self.inner.param_info(param)
    }

    fn param_value(&self, param: NativeParamHandle) -> NativeResult<f32> {
        self.record("param_value");
        self.inner.param_value(param)
    }

    fn set_param_value(&self, param: NativeParamHandle, value: f32) -> NativeResult<()> {
        self.record("set_param_value");
        self.inner.set_param_value(param, value)
    }

    fn schedule_param(&self, param: NativeParamHandle, event: AutomationEvent) -> NativeResult<()> {
        self.record("schedule_param");
        self.inner.schedule_param(param, event)
    }

    fn connect(
        &self,
        from: NativeNodeHandle,
        to: ConnectTarget,
        output: u32,
        input: u32,
    ) -> NativeResult<()> {
        self.record("connect");
        self.inner.connect(from, to, output, input)
    }

    fn disconnect(&self, from: NativeNodeHandle, target: DisconnectTarget) -> NativeResult<()> {
        self.record("disconnect");
        self.inner.disconnect(from, target)
    }

    fn start_source(&self, node: NativeNodeHandle, when: f64) -> NativeResult<()> {
        self.record("start_source");
        self.inner.start_source(node, when)
    }

    fn stop_source(&self, node: NativeNodeHandle, when: f64) -> NativeResult<()> {
        self.record("stop_source");
        self.inner.stop_source(node, when)
    }

    fn get_frequency_response(
        &self,
        node: NativeNodeHandle,
        frequency_hz: &[f32],
        mag_response: &mut [f32],
        phase_response: &mut [f32],
    ) -> NativeResult<()> {
        self.record("get_frequency_response");
        self.inner
            .get_frequency_response(node, frequency_hz, mag_response, phase_response)
    }

    fn take_events(&self, context: NativeContextHandle) -> Vec<NativeEvent> {
        self.record("take_events");
        self.inner.take_events(context)
    }

    fn render_quantum(&self, node: NativeNodeHandle) -> NativeResult<RenderedQuantum> {
        self.record("render_quantum");
        self.inner.render_quantum(node)
    }
}

pub fn recording() -> Arc<RecordingEngine> {
    Arc::new(RecordingEngine::default())
}

pub fn realtime(engine: &Arc<RecordingEngine>) -> AudioContext {
    let shared: Arc<dyn NativeEngine> = engine.clone();
    AudioContext::new(shared, &[]).unwrap()
}

pub fn offline(engine: &Arc<RecordingEngine>) -> AudioContext {
    let shared: Arc<dyn NativeEngine> = engine.clone();
    AudioContext::new_offline(
        shared,
        &[HostValue::from(serde_json::json!({"length": 128, "sampleRate": 8000}))],
    )
    .unwrap()
}

/// Host options object from JSON.
pub fn opts(value: serde_json::Value) -> HostValue {
    HostValue::from(value)
}
