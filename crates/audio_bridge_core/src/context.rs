//! Audio contexts.
//!
//! A context exclusively owns its native context handle. Nodes keep a weak
//! back-reference, so dropping the last [`AudioContext`] clone releases the
//! native context even while node wrappers are still around.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::call::CallSite;
use crate::coerce::CoercionTarget;
use crate::engine::{ContextSpec, NativeContextHandle, NativeEngine, NativeNodeHandle};
use crate::error::{sanitize, Result};
use crate::events::{Event, EventTarget};
use crate::node::AudioNode;
use crate::options::KeyReader;
use crate::schema::{ContextKind, NodeKind};
use crate::value::HostValue;

const UNSIGNED_LONG: CoercionTarget = CoercionTarget::UnsignedLong {
    enforce_range: true,
};

struct EventRoute {
    kind: NodeKind,
    target: Weak<EventTarget>,
}

pub(crate) struct ContextInner {
    kind: ContextKind,
    engine: Arc<dyn NativeEngine>,
    handle: NativeContextHandle,
    sample_rate: f32,
    number_of_channels: u32,
    length: u32,
    routes: Mutex<HashMap<NativeNodeHandle, EventRoute>>,
}

impl ContextInner {
    pub(crate) fn register_node(
        &self,
        node: NativeNodeHandle,
        kind: NodeKind,
        target: &Arc<EventTarget>,
    ) {
        self.routes.lock().insert(
            node,
            EventRoute {
                kind,
                target: Arc::downgrade(target),
            },
        );
    }

    pub(crate) fn unregister_node(&self, node: NativeNodeHandle) {
        self.routes.lock().remove(&node);
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        tracing::debug!(handle = ?self.handle, kind = self.kind.name(), "releasing context");
        self.engine.release_context(self.handle);
    }
}

/// Host-visible context. Clones are host references to the same context.
#[derive(Clone)]
pub struct AudioContext {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.display_name())
            .field("handle", &self.inner.handle)
            .field("sample_rate", &self.inner.sample_rate)
            .finish()
    }
}

impl AudioContext {
    /// `new AudioContext(options?)`.
    pub fn new(engine: Arc<dyn NativeEngine>, args: &[HostValue]) -> Result<Self> {
        let site = CallSite::construct(ContextKind::Realtime.name());
        let options = args.first();
        if let Some(value) = options {
            if value.is_truthy() && !value.is_object_like() {
                return Err(site.type_mismatch("argument 1 is not of type 'AudioContextOptions'"));
            }
        }

        let reader = KeyReader::new(&site, "AudioContextOptions", options);
        let sample_rate = reader
            .scalar("sampleRate", CoercionTarget::Float)?
            .and_then(|c| c.as_f32());

        Self::allocate(
            engine,
            ContextSpec {
                kind: ContextKind::Realtime,
                sample_rate,
                number_of_channels: 2,
                length: 0,
            },
        )
    }

    /// `new OfflineAudioContext(options)` or
    /// `new OfflineAudioContext(numberOfChannels, length, sampleRate)`.
    pub fn new_offline(engine: Arc<dyn NativeEngine>, args: &[HostValue]) -> Result<Self> {
        let site = CallSite::construct(ContextKind::Offline.name());
        site.check_arity(1, args)?;

        let spec = if args.len() >= 2 {
            site.check_arity(3, args)?;
            let channels = site.coerce_arg(&args[0], UNSIGNED_LONG)?;
            let length = site.coerce_arg(&args[1], UNSIGNED_LONG)?;
            let sample_rate = site.coerce_arg(&args[2], CoercionTarget::Float)?;
            ContextSpec {
                kind: ContextKind::Offline,
                sample_rate: sample_rate.as_f32(),
                number_of_channels: channels.as_u32().unwrap_or(1),
                length: length.as_u32().unwrap_or_default(),
            }
        } else {
            let options = &args[0];
            if !options.is_object_like() {
                return Err(
                    site.type_mismatch("argument 1 is not of type 'OfflineAudioContextOptions'")
                );
            }
            let reader = KeyReader::new(&site, "OfflineAudioContextOptions", Some(options));
            let channels = reader
                .scalar("numberOfChannels", UNSIGNED_LONG)?
                .and_then(|c| c.as_u32())
                .unwrap_or(1);
            let length = reader
                .scalar("length", UNSIGNED_LONG)?
                .and_then(|c| c.as_u32())
                .ok_or_else(|| reader.missing("length"))?;
            let sample_rate = reader
                .scalar("sampleRate", CoercionTarget::Float)?
                .and_then(|c| c.as_f32())
                .ok_or_else(|| reader.missing("sampleRate"))?;
            ContextSpec {
                kind: ContextKind::Offline,
                sample_rate: Some(sample_rate),
                number_of_channels: channels,
                length,
            }
        };

        Self::allocate(engine, spec)
    }

    fn allocate(engine: Arc<dyn NativeEngine>, spec: ContextSpec) -> Result<Self> {
        let handle = engine.create_context(&spec).map_err(sanitize)?;
        let sample_rate = match engine.context_sample_rate(handle) {
            Ok(rate) => rate,
            Err(err) => {
                engine.release_context(handle);
                return Err(sanitize(err));
            }
        };

        tracing::debug!(?handle, kind = spec.kind.name(), sample_rate, "context ready");
        Ok(Self {
            inner: Arc::new(ContextInner {
                kind: spec.kind,
                engine,
                handle,
                sample_rate,
                number_of_channels: spec.number_of_channels,
                length: spec.length,
                routes: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub(crate) fn from_inner(inner: Arc<ContextInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<ContextInner> {
        &self.inner
    }

    pub fn kind(&self) -> ContextKind {
        self.inner.kind
    }

    pub fn display_name(&self) -> &'static str {
        self.inner.kind.name()
    }

    pub fn handle(&self) -> NativeContextHandle {
        self.inner.handle
    }

    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.inner.engine
    }

    pub fn sample_rate(&self) -> f32 {
        self.inner.sample_rate
    }

    pub fn number_of_channels(&self) -> u32 {
        self.inner.number_of_channels
    }

    /// Frame count of an offline context.
    pub fn length(&self) -> Option<u32> {
        (self.inner.kind == ContextKind::Offline).then_some(self.inner.length)
    }

    pub fn ptr_eq(&self, other: &AudioContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn as_host_value(&self) -> HostValue {
        HostValue::Context(self.clone())
    }

    /// Construct a node on this context. `rest` holds the arguments after
    /// the context, e.g. `[options]` or `[name, options]`.
    pub fn create_node(&self, kind: NodeKind, rest: &[HostValue]) -> Result<AudioNode> {
        let mut args = Vec::with_capacity(rest.len() + 1);
        args.push(self.as_host_value());
        args.extend_from_slice(rest);
        AudioNode::construct(kind, &args)
    }

    /// Number of live node wrappers constructed on this context.
    pub fn node_count(&self) -> usize {
        let mut routes = self.inner.routes.lock();
        routes.retain(|_, route| route.target.strong_count() > 0);
        routes.len()
    }

    /// Drain native notifications and deliver them to node listeners, in
    /// emission order. Events for dropped wrappers are discarded. Returns
    /// the number of events delivered to a live node.
    pub fn dispatch_events(&self) -> usize {
        let events = self.inner.engine.take_events(self.inner.handle);
        let mut delivered = 0;

        for native in events {
            let route = {
                let mut routes = self.inner.routes.lock();
                match routes.get(&native.node) {
                    Some(route) => match route.target.upgrade() {
                        Some(target) => Some((route.kind, target)),
                        None => {
                            routes.remove(&native.node);
                            None
                        }
                    },
                    None => None,
                }
            };

            let Some((kind, target)) = route else {
                tracing::trace!(node = ?native.node, event = %native.event_type, "no live target");
                continue;
            };

            let event = Event {
                event_type: native.event_type,
                target: kind,
            };
            let invoked = target.dispatch(&event);
            tracing::trace!(node = ?native.node, event = %event.event_type, invoked, "dispatched");
            delivered += 1;
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReferenceEngine;
    use crate::error::BridgeError;
    use serde_json::json;

    fn engine() -> Arc<dyn NativeEngine> {
        Arc::new(ReferenceEngine::default())
    }

    #[test]
    fn realtime_context_defaults_sample_rate() {
        let ctx = AudioContext::new(engine(), &[]).unwrap();
        assert_eq!(ctx.sample_rate(), 44_100.0);
        assert_eq!(ctx.display_name(), "AudioContext");
        assert_eq!(ctx.length(), None);
    }

    #[test]
    fn realtime_context_rejects_bad_rate_natively() {
        let err = AudioContext::new(engine(), &[HostValue::from(json!({"sampleRate": 100}))])
            .unwrap_err();
        assert!(matches!(err, BridgeError::Native { .. }));
        assert_eq!(err.host_error_name(), "NotSupportedError");
        assert!(!err.to_string().contains(".rs"));
    }

    #[test]
    fn offline_context_from_positionals() {
        let ctx = AudioContext::new_offline(
            engine(),
            &[HostValue::from(1.0), HostValue::from(128.0), HostValue::from(8_000.0)],
        )
        .unwrap();
        assert_eq!(ctx.sample_rate(), 8_000.0);
        assert_eq!(ctx.length(), Some(128));
        assert_eq!(ctx.number_of_channels(), 1);
    }

    #[test]
    fn offline_context_options_require_length() {
        let err = AudioContext::new_offline(
            engine(),
            &[HostValue::from(json!({"sampleRate": 8000}))],
        )
        .unwrap_err();
        assert_eq!(
            err,
            BridgeError::RequiredMemberMissing(
                "Failed to construct 'OfflineAudioContext': Failed to read the 'length' property from OfflineAudioContextOptions: Required member is undefined".into()
            )
        );

        let err = AudioContext::new_offline(engine(), &[]).unwrap_err();
        assert!(matches!(err, BridgeError::Arity(_)));

        let err =
            AudioContext::new_offline(engine(), &[HostValue::from(1.0), HostValue::from(2.0)])
                .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to construct 'OfflineAudioContext': 3 argument required, but only 2 present"
        );
    }

    #[test]
    fn dropping_the_context_releases_native_state() {
        let reference = Arc::new(ReferenceEngine::default());
        let shared: Arc<dyn NativeEngine> = reference.clone();
        let ctx = AudioContext::new(shared, &[]).unwrap();
        let copy = ctx.clone();
        drop(ctx);
        assert_eq!(reference.live_contexts(), 1);
        drop(copy);
        assert_eq!(reference.live_contexts(), 0);
    }
}
