use std::sync::Arc;

use audio_bridge_core::worklet::ArraySourceProcessor;
use audio_bridge_core::{
  AudioContext, AudioNode, Event, HostObject, HostValue, NodeKind, TypedArray,
};
use napi::Result;
use napi::bindgen_prelude::Float32Array;
use napi_derive::napi;
use parking_lot::Mutex;
use serde_json::Value;

use crate::nodes::JsAudioNode;
use crate::{engine, host_args, parse_kind, to_napi_error};

/// A native notification waiting to be re-dispatched by the JS shim.
#[napi(object)]
#[derive(Debug, Clone)]
pub struct EmittedEvent {
  pub node_id: i64,
  pub node_kind: String,
  pub event_type: String,
}

type EventQueue = Arc<Mutex<Vec<EmittedEvent>>>;

#[napi(js_name = "AudioContext")]
pub struct JsAudioContext {
  inner: AudioContext,
  queue: EventQueue,
}

impl JsAudioContext {
  fn wrap(inner: AudioContext) -> Self {
    Self {
      inner,
      queue: Arc::new(Mutex::new(Vec::new())),
    }
  }

  /// Forward a node's notifications into this context's queue.
  fn adopt(&self, node: AudioNode) -> JsAudioNode {
    let queue = Arc::clone(&self.queue);
    let node_id = node.handle().raw() as i64;
    node.add_event_listener("ended", move |event: &Event| {
      queue.lock().push(EmittedEvent {
        node_id,
        node_kind: event.target.name().to_string(),
        event_type: event.event_type.clone(),
      });
    });
    JsAudioNode::new(node)
  }
}

#[napi]
impl JsAudioContext {
  #[napi(constructor)]
  pub fn new(options: Option<Value>) -> Result<Self> {
    let args: Vec<HostValue> = options.into_iter().map(HostValue::from).collect();
    AudioContext::new(engine(), &args)
      .map(Self::wrap)
      .map_err(to_napi_error)
  }

  /// `new OfflineAudioContext(...)` with the caller's full argument list.
  #[napi(factory)]
  pub fn offline(args: Vec<Value>) -> Result<Self> {
    AudioContext::new_offline(engine(), &host_args(args))
      .map(Self::wrap)
      .map_err(to_napi_error)
  }

  #[napi(getter)]
  pub fn sample_rate(&self) -> f64 {
    self.inner.sample_rate() as f64
  }

  #[napi(getter)]
  pub fn number_of_channels(&self) -> u32 {
    self.inner.number_of_channels()
  }

  #[napi(getter)]
  pub fn length(&self) -> Option<u32> {
    self.inner.length()
  }

  #[napi(getter)]
  pub fn to_string_tag(&self) -> String {
    self.inner.display_name().to_string()
  }

  /// `new <Kind>(this, ...args)`.
  #[napi]
  pub fn create_node(&self, kind: String, args: Vec<Value>) -> Result<JsAudioNode> {
    let kind = parse_kind(&kind)?;
    let node = self
      .inner
      .create_node(kind, &host_args(args))
      .map_err(to_napi_error)?;
    Ok(self.adopt(node))
  }

  /// `new AudioWorkletNode(this, 'array-source', options)` reading from
  /// `samples`.
  #[napi]
  pub fn create_array_source_node(
    &self,
    samples: &JsSharedSamples,
    options: Option<Value>,
  ) -> Result<JsAudioNode> {
    let mut options = match options {
      None | Some(Value::Null) => HostValue::Object(HostObject::new()),
      Some(value) => HostValue::from(value),
    };
    if let HostValue::Object(map) = &mut options {
      let mut processor_options = match map.remove("processorOptions") {
        Some(HostValue::Object(existing)) => existing,
        _ => HostObject::new(),
      };
      processor_options.insert(
        "sharedFloats".to_string(),
        HostValue::Float32Array(samples.inner.clone()),
      );
      map.insert(
        "processorOptions".to_string(),
        HostValue::Object(processor_options),
      );
    }

    let node = self
      .inner
      .create_node(
        NodeKind::AudioWorklet,
        &[HostValue::from(ArraySourceProcessor::NAME), options],
      )
      .map_err(to_napi_error)?;
    Ok(self.adopt(node))
  }

  /// Route pending native notifications and hand them to the shim.
  #[napi]
  pub fn dispatch_events(&self) -> Vec<EmittedEvent> {
    self.inner.dispatch_events();
    std::mem::take(&mut *self.queue.lock())
  }

  #[napi]
  pub fn node_count(&self) -> u32 {
    self.inner.node_count() as u32
  }
}

/// Host-writable sample array shared with the real-time processor.
#[napi(js_name = "SharedSamples")]
pub struct JsSharedSamples {
  inner: TypedArray<f32>,
}

#[napi]
impl JsSharedSamples {
  #[napi(constructor)]
  pub fn new(length: u32) -> Self {
    Self {
      inner: TypedArray::zeroed(length as usize),
    }
  }

  #[napi(getter)]
  pub fn length(&self) -> u32 {
    self.inner.len() as u32
  }

  #[napi]
  pub fn write(&self, values: Float32Array) {
    self.inner.write(&values);
  }

  #[napi]
  pub fn read(&self) -> Float32Array {
    Float32Array::new(self.inner.to_vec())
  }
}
