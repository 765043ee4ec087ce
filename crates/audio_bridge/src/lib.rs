#![deny(clippy::all)]

mod context;
mod nodes;

use std::sync::{Arc, OnceLock};

use audio_bridge_core::metadata::{registry, MemberKind, TypeDescriptor};
use audio_bridge_core::schema::{node_schemas, NodeSchemaSummary};
use audio_bridge_core::{
  AudioNode, BridgeConfig, BridgeError, HostValue, NativeEngine, NodeKind, ProcessorRegistry,
  ReferenceEngine,
};
use napi::{Result, Status};
use napi_derive::napi;
use serde_json::Value;

pub use crate::context::{EmittedEvent, JsAudioContext, JsSharedSamples};
pub use crate::nodes::{JsAudioNode, JsAudioParam, RenderedOutput};

static ENGINE: OnceLock<Arc<dyn NativeEngine>> = OnceLock::new();

/// Engine shared by every context created through this module.
pub(crate) fn engine() -> Arc<dyn NativeEngine> {
  ENGINE
    .get_or_init(|| {
      install_panic_hook();
      let config = BridgeConfig::from_env().unwrap_or_else(|err| {
        tracing::warn!(%err, "ignoring invalid bridge configuration");
        BridgeConfig::default()
      });
      Arc::new(ReferenceEngine::new(config, ProcessorRegistry::with_builtin()))
    })
    .clone()
}

/// Route panics through tracing instead of the host's stderr.
fn install_panic_hook() {
  let previous = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |panic_info| {
    let location = panic_info
      .location()
      .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
      .unwrap_or_else(|| "<unknown>".to_string());
    tracing::error!(%location, "panic inside the audio bridge");
    if std::env::var_os("AUDIO_BRIDGE_PANIC_STDERR").is_some() {
      previous(panic_info);
    }
  }));
}

/// Map a bridge failure onto a JS error. The message is prefixed with the
/// host error name so the JS shim can rebuild the right error class.
pub(crate) fn to_napi_error(err: BridgeError) -> napi::Error {
  let name = err.host_error_name();
  let status = if name == "TypeError" {
    Status::InvalidArg
  } else {
    Status::GenericFailure
  };
  napi::Error::new(status, format!("{}: {}", name, err))
}

pub(crate) fn host_args(args: Vec<Value>) -> Vec<HostValue> {
  args.into_iter().map(HostValue::from).collect()
}

pub(crate) fn parse_kind(kind: &str) -> Result<NodeKind> {
  NodeKind::from_name(kind).ok_or_else(|| {
    napi::Error::new(
      Status::InvalidArg,
      format!("TypeError: '{}' is not a known node type", kind),
    )
  })
}

/// Construction entry point for calls whose first argument is not a context
/// wrapper. Always runs the full protocol so the caller gets the exact
/// arity or type error.
#[napi]
pub fn construct_node(kind: String, args: Vec<Value>) -> Result<JsAudioNode> {
  let kind = parse_kind(&kind)?;
  AudioNode::construct(kind, &host_args(args))
    .map(JsAudioNode::new)
    .map_err(to_napi_error)
}

#[napi(object)]
pub struct MemberInfo {
  pub name: String,
  pub kind: String,
  pub enumerable: bool,
  pub arity: u32,
}

#[napi(object)]
pub struct TypeInfo {
  pub name: String,
  pub length: u32,
  pub to_string_tag: String,
  pub parent: Option<String>,
  pub members: Vec<MemberInfo>,
}

impl From<&TypeDescriptor> for TypeInfo {
  fn from(descriptor: &TypeDescriptor) -> Self {
    Self {
      name: descriptor.name.to_string(),
      length: descriptor.length as u32,
      to_string_tag: descriptor.to_string_tag.to_string(),
      parent: descriptor.parent.map(str::to_string),
      members: descriptor
        .members
        .iter()
        .map(|m| MemberInfo {
          name: m.name.to_string(),
          kind: match m.kind {
            MemberKind::Method => "method".to_string(),
            MemberKind::Attribute => "attribute".to_string(),
          },
          enumerable: m.enumerable,
          arity: m.arity as u32,
        })
        .collect(),
    }
  }
}

/// Introspection metadata for a type, applied by the JS shim at class
/// definition time.
#[napi]
pub fn describe_type(name: String) -> Option<TypeInfo> {
  registry().get(&name).map(TypeInfo::from)
}

#[napi]
pub fn node_kinds() -> Vec<String> {
  NodeKind::ALL.iter().map(|k| k.name().to_string()).collect()
}

#[napi]
pub fn get_node_schemas() -> Result<Value> {
  let summaries: Vec<NodeSchemaSummary> = node_schemas()
    .into_iter()
    .map(NodeSchemaSummary::from)
    .collect();
  serde_json::to_value(summaries).map_err(|e| napi::Error::from_reason(e.to_string()))
}
