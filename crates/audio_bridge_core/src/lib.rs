//! Audio node bridge core library
//!
//! Validates and coerces host-supplied constructor and method arguments for
//! audio graph node types, forwards well-formed requests to a native audio
//! engine and wraps the handles it returns. Host-facing error messages are
//! part of the contract and are produced here, byte for byte.
//!
//! The crate carries no host runtime. Host values arrive as [`HostValue`]s,
//! native work goes through the [`NativeEngine`] trait.

#[macro_use]
extern crate lazy_static;

extern crate parking_lot;
extern crate serde;
extern crate serde_json;

pub mod buffer;
pub mod call;
pub mod coerce;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod metadata;
pub mod node;
pub mod options;
pub mod param;
pub mod schema;
pub mod sequence;
pub mod value;
pub mod worklet;

// Re-export commonly used items
pub use buffer::AudioBuffer;
pub use config::BridgeConfig;
pub use context::AudioContext;
pub use engine::{NativeEngine, ReferenceEngine};
pub use error::{BridgeError, NativeError, NativeErrorKind, Result};
pub use events::{Event, EventTarget, ListenerId};
pub use metadata::{registry, MemberDescriptor, MemberKind, TypeDescriptor};
pub use node::{AudioNode, NodeRef};
pub use param::{AudioParam, ParamRef};
pub use schema::{ContextKind, NodeKind, NodeSchema};
pub use value::{HostObject, HostValue, TypedArray};
pub use worklet::{AudioWorkletProcessor, ProcessorRegistry};
