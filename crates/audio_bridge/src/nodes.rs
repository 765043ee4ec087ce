use std::sync::Arc;

use audio_bridge_core::{AudioNode, AudioParam, HostValue, TypedArray};
use napi::bindgen_prelude::Float32Array;
use napi::{Result, Status};
use napi_derive::napi;
use serde_json::Value;

use crate::{host_args, to_napi_error};

/// One rendered quantum, `outputs[output][channel]`.
#[napi(object)]
pub struct RenderedOutput {
  pub outputs: Vec<Vec<Float32Array>>,
  pub keep_alive: bool,
}

#[napi(js_name = "AudioNode")]
pub struct JsAudioNode {
  inner: Arc<AudioNode>,
}

impl JsAudioNode {
  pub(crate) fn new(node: AudioNode) -> Self {
    Self {
      inner: Arc::new(node),
    }
  }

  fn with_destination(destination: HostValue, rest: Vec<Value>) -> Vec<HostValue> {
    let mut args = vec![destination];
    args.extend(host_args(rest));
    args
  }
}

#[napi]
impl JsAudioNode {
  #[napi(getter)]
  pub fn id(&self) -> i64 {
    self.inner.handle().raw() as i64
  }

  #[napi(getter)]
  pub fn kind(&self) -> String {
    self.inner.kind().name().to_string()
  }

  #[napi(getter)]
  pub fn to_string_tag(&self) -> String {
    self.inner.to_string_tag().to_string()
  }

  #[napi(getter)]
  pub fn number_of_inputs(&self) -> u32 {
    self.inner.number_of_inputs()
  }

  #[napi(getter)]
  pub fn number_of_outputs(&self) -> u32 {
    self.inner.number_of_outputs()
  }

  #[napi(getter)]
  pub fn channel_count(&self) -> u32 {
    self.inner.channel_count()
  }

  #[napi(getter)]
  pub fn channel_count_mode(&self) -> String {
    self.inner.channel_count_mode().to_string()
  }

  #[napi(getter)]
  pub fn channel_interpretation(&self) -> String {
    self.inner.channel_interpretation().to_string()
  }

  #[napi]
  pub fn param_names(&self) -> Vec<String> {
    self
      .inner
      .params()
      .iter()
      .map(|p| p.name().to_string())
      .collect()
  }

  #[napi]
  pub fn param(&self, name: String) -> Option<JsAudioParam> {
    let param = self.inner.param(&name)?;
    Some(JsAudioParam {
      node: Arc::clone(&self.inner),
      name: param.name(),
    })
  }

  #[napi]
  pub fn connect(&self, destination: &JsAudioNode, rest: Vec<Value>) -> Result<()> {
    let args = Self::with_destination(destination.inner.as_host_value(), rest);
    self.inner.connect(&args).map_err(to_napi_error)
  }

  #[napi]
  pub fn connect_param(&self, destination: &JsAudioParam, rest: Vec<Value>) -> Result<()> {
    let param = destination.param()?;
    let args = Self::with_destination(param.as_host_value(), rest);
    self.inner.connect(&args).map_err(to_napi_error)
  }

  /// `connect(...)` with something that is not a wrapper, so the caller
  /// gets the arity or overload error.
  #[napi]
  pub fn connect_value(&self, args: Vec<Value>) -> Result<()> {
    self.inner.connect(&host_args(args)).map_err(to_napi_error)
  }

  #[napi]
  pub fn disconnect(&self, args: Vec<Value>) -> Result<()> {
    self.inner.disconnect(&host_args(args)).map_err(to_napi_error)
  }

  #[napi]
  pub fn disconnect_node(&self, destination: &JsAudioNode) -> Result<()> {
    self
      .inner
      .disconnect(&[destination.inner.as_host_value()])
      .map_err(to_napi_error)
  }

  #[napi]
  pub fn disconnect_param(&self, destination: &JsAudioParam) -> Result<()> {
    let param = destination.param()?;
    self
      .inner
      .disconnect(&[param.as_host_value()])
      .map_err(to_napi_error)
  }

  #[napi]
  pub fn start(&self, args: Vec<Value>) -> Result<()> {
    self.inner.start(&host_args(args)).map_err(to_napi_error)
  }

  #[napi]
  pub fn stop(&self, args: Vec<Value>) -> Result<()> {
    self.inner.stop(&host_args(args)).map_err(to_napi_error)
  }

  /// Fills `mag_response` and `phase_response` in place.
  #[napi]
  pub fn get_frequency_response(
    &self,
    frequency_hz: Option<Float32Array>,
    mut mag_response: Option<Float32Array>,
    mut phase_response: Option<Float32Array>,
  ) -> Result<()> {
    let copy = |a: &Option<Float32Array>| a.as_ref().map(|a| TypedArray::new(a.to_vec()));
    let mag_host = copy(&mag_response);
    let phase_host = copy(&phase_response);

    let mut args: Vec<HostValue> = [copy(&frequency_hz), mag_host.clone(), phase_host.clone()]
      .into_iter()
      .map(|a| a.map(HostValue::Float32Array).unwrap_or_default())
      .collect();
    // absent trailing arguments do not count towards arity
    while matches!(args.last(), Some(HostValue::Undefined)) {
      args.pop();
    }

    self
      .inner
      .get_frequency_response(&args)
      .map_err(to_napi_error)?;

    if let (Some(out), Some(values)) = (mag_response.as_mut(), mag_host) {
      // SAFETY: the host buffer is not touched concurrently during this synchronous call
      unsafe { Float32Array::as_mut(out) }.copy_from_slice(&values.to_vec());
    }
    if let (Some(out), Some(values)) = (phase_response.as_mut(), phase_host) {
      // SAFETY: the host buffer is not touched concurrently during this synchronous call
      unsafe { Float32Array::as_mut(out) }.copy_from_slice(&values.to_vec());
    }
    Ok(())
  }

  #[napi]
  pub fn render_quantum(&self) -> Result<RenderedOutput> {
    let quantum = self.inner.render_quantum().map_err(to_napi_error)?;
    Ok(RenderedOutput {
      outputs: quantum
        .outputs
        .into_iter()
        .map(|port| port.into_iter().map(Float32Array::new).collect())
        .collect(),
      keep_alive: quantum.keep_alive,
    })
  }
}

/// Parameter wrapper. Holds its node so the parameter stays valid for as
/// long as JS can reach it.
#[napi(js_name = "AudioParam")]
pub struct JsAudioParam {
  node: Arc<AudioNode>,
  name: &'static str,
}

impl JsAudioParam {
  fn param(&self) -> Result<&AudioParam> {
    self.node.param(self.name).ok_or_else(|| {
      napi::Error::new(
        Status::GenericFailure,
        format!("Error: {} has no parameter '{}'", self.node.kind(), self.name),
      )
    })
  }
}

#[napi]
impl JsAudioParam {
  #[napi(getter)]
  pub fn name(&self) -> String {
    self.name.to_string()
  }

  #[napi(getter)]
  pub fn value(&self) -> Result<f64> {
    let value = self.param()?.value().map_err(to_napi_error)?;
    Ok(value as f64)
  }

  #[napi(setter, js_name = "value")]
  pub fn set_value(&self, value: Value) -> Result<()> {
    self
      .param()?
      .set_value(&HostValue::from(value))
      .map_err(to_napi_error)
  }

  #[napi(getter)]
  pub fn default_value(&self) -> Result<f64> {
    Ok(self.param()?.default_value() as f64)
  }

  #[napi(getter)]
  pub fn min_value(&self) -> Result<f64> {
    Ok(self.param()?.min_value() as f64)
  }

  #[napi(getter)]
  pub fn max_value(&self) -> Result<f64> {
    Ok(self.param()?.max_value() as f64)
  }

  #[napi(getter)]
  pub fn automation_rate(&self) -> Result<String> {
    Ok(self.param()?.automation_rate().to_string())
  }

  #[napi]
  pub fn set_value_at_time(&self, args: Vec<Value>) -> Result<()> {
    self
      .param()?
      .set_value_at_time(&host_args(args))
      .map(|_| ())
      .map_err(to_napi_error)
  }

  #[napi]
  pub fn linear_ramp_to_value_at_time(&self, args: Vec<Value>) -> Result<()> {
    self
      .param()?
      .linear_ramp_to_value_at_time(&host_args(args))
      .map(|_| ())
      .map_err(to_napi_error)
  }

  #[napi]
  pub fn exponential_ramp_to_value_at_time(&self, args: Vec<Value>) -> Result<()> {
    self
      .param()?
      .exponential_ramp_to_value_at_time(&host_args(args))
      .map(|_| ())
      .map_err(to_napi_error)
  }

  #[napi]
  pub fn set_target_at_time(&self, args: Vec<Value>) -> Result<()> {
    self
      .param()?
      .set_target_at_time(&host_args(args))
      .map(|_| ())
      .map_err(to_napi_error)
  }

  #[napi]
  pub fn cancel_scheduled_values(&self, args: Vec<Value>) -> Result<()> {
    self
      .param()?
      .cancel_scheduled_values(&host_args(args))
      .map(|_| ())
      .map_err(to_napi_error)
  }
}
