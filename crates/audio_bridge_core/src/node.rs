//! Node base bridge and the construction protocol shared by every node kind.
//!
//! [`AudioNode::construct`] runs the protocol in its fixed order and stops at
//! the first failure:
//!
//! 1. argument count against the kind's minimum,
//! 2. the first argument must be an accepted context,
//! 3. options shape and every option key (see [`parse_options`]),
//! 4. native allocation, with failures passed through [`sanitize`],
//! 5. wiring: parameter sub-handles and event routing.
//!
//! Nothing escapes a failed construction; a native node allocated before a
//! wiring failure is released again.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::call::{invalid_receiver, CallSite};
use crate::coerce::CoercionTarget;
use crate::context::{AudioContext, ContextInner};
use crate::engine::{
    ConnectTarget, DisconnectTarget, NativeEngine, NativeNodeHandle, RenderedQuantum,
};
use crate::error::{sanitize, Result};
use crate::events::{Event, EventTarget, ListenerId};
use crate::metadata::{self, TypeDescriptor};
use crate::options::{parse_options, ParsedOptions};
use crate::param::AudioParam;
use crate::schema::{
    MethodSpec, NodeKind, NodeSchema, CONNECT, DISCONNECT, GET_FREQUENCY_RESPONSE, START, STOP,
};
use crate::value::HostValue;

const INDEX: CoercionTarget = CoercionTarget::UnsignedLong {
    enforce_range: false,
};

/// Non-owning host reference to a node, usable as a `connect` destination.
#[derive(Clone)]
pub struct NodeRef {
    handle: NativeNodeHandle,
    kind: NodeKind,
    context: Weak<ContextInner>,
}

impl NodeRef {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn handle(&self) -> NativeNodeHandle {
        self.handle
    }

    pub fn context(&self) -> Option<AudioContext> {
        self.context.upgrade().map(AudioContext::from_inner)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.kind, self.handle)
    }
}

pub struct AudioNode {
    kind: NodeKind,
    handle: NativeNodeHandle,
    engine: Arc<dyn NativeEngine>,
    context: Weak<ContextInner>,
    params: Vec<AudioParam>,
    events: Arc<EventTarget>,
    number_of_inputs: u32,
    number_of_outputs: u32,
    channel_count: u32,
    channel_count_mode: String,
    channel_interpretation: String,
}

impl fmt::Debug for AudioNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.kind.name())
            .field("handle", &self.handle)
            .field("params", &self.params)
            .field("channel_count", &self.channel_count)
            .finish()
    }
}

impl AudioNode {
    /// `new <Kind>(context, ...)` with the host-supplied argument list.
    pub fn construct(kind: NodeKind, args: &[HostValue]) -> Result<Self> {
        let schema = kind.schema();
        let site = CallSite::construct(schema.name);

        site.check_arity(schema.min_args(), args)?;

        let context = match &args[0] {
            HostValue::Context(ctx) if schema.accepted_contexts.contains(&ctx.kind()) => ctx,
            _ => return Err(site.type_mismatch("argument 1 is not of type BaseAudioContext")),
        };

        let options = parse_options(schema, args)?;

        let handle = context
            .engine()
            .create_node(context.handle(), kind, &options)
            .map_err(|err| {
                tracing::debug!(%kind, "native allocation rejected");
                sanitize(err)
            })?;

        Self::wrap(context, schema, handle, &options)
    }

    fn wrap(
        context: &AudioContext,
        schema: &NodeSchema,
        handle: NativeNodeHandle,
        options: &ParsedOptions,
    ) -> Result<Self> {
        let engine = Arc::clone(context.engine());

        let mut params = Vec::with_capacity(schema.params.len());
        for spec in schema.params {
            match AudioParam::wrap(&engine, handle, schema.kind, spec.name) {
                Ok(param) => params.push(param),
                Err(err) => {
                    engine.release_node(handle);
                    return Err(err);
                }
            }
        }

        let (number_of_inputs, number_of_outputs) = match schema.kind {
            NodeKind::AudioWorklet => (
                options.u32("numberOfInputs").unwrap_or(1),
                options.u32("numberOfOutputs").unwrap_or(1),
            ),
            _ => (schema.number_of_inputs, schema.number_of_outputs),
        };

        let events = Arc::new(EventTarget::new());
        context.inner().register_node(handle, schema.kind, &events);
        tracing::debug!(kind = schema.name, ?handle, "node constructed");

        Ok(Self {
            kind: schema.kind,
            handle,
            engine,
            context: Arc::downgrade(context.inner()),
            params,
            events,
            number_of_inputs,
            number_of_outputs,
            channel_count: options.channel_count,
            channel_count_mode: options.channel_count_mode.clone(),
            channel_interpretation: options.channel_interpretation.clone(),
        })
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn handle(&self) -> NativeNodeHandle {
        self.handle
    }

    pub fn type_descriptor(&self) -> &'static TypeDescriptor {
        metadata::registry().for_kind(self.kind)
    }

    pub fn to_string_tag(&self) -> &'static str {
        self.type_descriptor().to_string_tag
    }

    /// The owning context, if it is still alive.
    pub fn context(&self) -> Option<AudioContext> {
        self.context.upgrade().map(AudioContext::from_inner)
    }

    pub fn param(&self, name: &str) -> Option<&AudioParam> {
        self.params.iter().find(|p| p.name() == name)
    }

    pub fn params(&self) -> &[AudioParam] {
        &self.params
    }

    pub fn number_of_inputs(&self) -> u32 {
        self.number_of_inputs
    }

    pub fn number_of_outputs(&self) -> u32 {
        self.number_of_outputs
    }

    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    pub fn channel_count_mode(&self) -> &str {
        &self.channel_count_mode
    }

    pub fn channel_interpretation(&self) -> &str {
        &self.channel_interpretation
    }

    pub fn to_ref(&self) -> NodeRef {
        NodeRef {
            handle: self.handle,
            kind: self.kind,
            context: self.context.clone(),
        }
    }

    pub fn as_host_value(&self) -> HostValue {
        HostValue::Node(self.to_ref())
    }

    /// Reject calls to a method this kind does not declare. The message names
    /// the first kind that does.
    fn require_method(&self, method: &MethodSpec) -> Result<()> {
        if self.kind.schema().method(method.name).is_some() {
            return Ok(());
        }
        let owner = NodeKind::ALL
            .into_iter()
            .find(|k| k.schema().method(method.name).is_some())
            .map(NodeKind::name)
            .unwrap_or("AudioNode");
        Err(invalid_receiver(owner))
    }

    fn require_scheduled_source(&self) -> Result<()> {
        if self.kind.schema().scheduled_source {
            Ok(())
        } else {
            Err(invalid_receiver("AudioScheduledSourceNode"))
        }
    }

    /// `connect(destination, output = 0, input = 0)`.
    pub fn connect(&self, args: &[HostValue]) -> Result<()> {
        let site = CallSite::execute(CONNECT.name, "AudioNode");
        site.check_arity(CONNECT.arity(), args)?;

        let target = match &args[0] {
            HostValue::Node(node) => ConnectTarget::Node(node.handle()),
            HostValue::Param(param) => ConnectTarget::Param(param.handle()),
            _ => return Err(site.type_mismatch("parameter 1 is not of type 'AudioNode'.")),
        };
        let output = index_arg(&site, args, 1)?;
        let input = index_arg(&site, args, 2)?;

        self.engine
            .connect(self.handle, target, output, input)
            .map_err(sanitize)
    }

    /// `disconnect()`, `disconnect(output)` or `disconnect(destination)`.
    pub fn disconnect(&self, args: &[HostValue]) -> Result<()> {
        let site = CallSite::execute(DISCONNECT.name, "AudioNode");
        site.check_arity(DISCONNECT.arity(), args)?;

        let target = match args.first() {
            None | Some(HostValue::Undefined) => DisconnectTarget::All,
            Some(HostValue::Node(node)) => {
                DisconnectTarget::Destination(ConnectTarget::Node(node.handle()))
            }
            Some(HostValue::Param(param)) => {
                DisconnectTarget::Destination(ConnectTarget::Param(param.handle()))
            }
            Some(_) => DisconnectTarget::Output(index_arg(&site, args, 0)?),
        };

        self.engine.disconnect(self.handle, target).map_err(sanitize)
    }

    /// `start(when = 0)`, scheduled sources only.
    pub fn start(&self, args: &[HostValue]) -> Result<()> {
        self.require_scheduled_source()?;
        let site = CallSite::execute(START.name, "AudioScheduledSourceNode");
        site.check_arity(START.arity(), args)?;
        let when = time_arg(&site, args, 0)?;
        self.engine.start_source(self.handle, when).map_err(sanitize)
    }

    /// `stop(when = 0)`, scheduled sources only.
    pub fn stop(&self, args: &[HostValue]) -> Result<()> {
        self.require_scheduled_source()?;
        let site = CallSite::execute(STOP.name, "AudioScheduledSourceNode");
        site.check_arity(STOP.arity(), args)?;
        let when = time_arg(&site, args, 0)?;
        self.engine.stop_source(self.handle, when).map_err(sanitize)
    }

    /// `getFrequencyResponse(frequencyHz, magResponse, phaseResponse)`.
    ///
    /// The two response arrays are filled in place by the engine.
    pub fn get_frequency_response(&self, args: &[HostValue]) -> Result<()> {
        self.require_method(&GET_FREQUENCY_RESPONSE)?;
        let site = CallSite::execute(GET_FREQUENCY_RESPONSE.name, self.kind.name());
        site.check_arity(GET_FREQUENCY_RESPONSE.arity(), args)?;

        let mut arrays = Vec::with_capacity(3);
        for (i, arg) in args.iter().take(3).enumerate() {
            match arg {
                HostValue::Float32Array(array) => arrays.push(array),
                _ => {
                    return Err(site.type_mismatch(format_args!(
                        "parameter {} is not of type 'Float32Array'.",
                        i + 1
                    )));
                }
            }
        }

        let frequency_hz = arrays[0].to_vec();
        let mut mag_response = vec![0.0; arrays[1].len()];
        let mut phase_response = vec![0.0; arrays[2].len()];

        self.engine
            .get_frequency_response(
                self.handle,
                &frequency_hz,
                &mut mag_response,
                &mut phase_response,
            )
            .map_err(sanitize)?;

        arrays[1].write(&mag_response);
        arrays[2].write(&phase_response);
        Ok(())
    }

    /// Run one render quantum of a processor-backed node.
    pub fn render_quantum(&self) -> Result<RenderedQuantum> {
        if self.kind != NodeKind::AudioWorklet {
            return Err(invalid_receiver(NodeKind::AudioWorklet.name()));
        }
        self.engine.render_quantum(self.handle).map_err(sanitize)
    }

    pub fn add_event_listener<F>(&self, event_type: &str, listener: F) -> ListenerId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.events.add_listener(event_type, listener)
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.events.remove_listener(id)
    }

    /// Set or clear the `onended` handler.
    pub fn set_onended<F>(&self, handler: Option<F>)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.events.set_handler("ended", handler);
    }

    pub fn event_target(&self) -> &Arc<EventTarget> {
        &self.events
    }
}

impl Drop for AudioNode {
    fn drop(&mut self) {
        if let Some(context) = self.context.upgrade() {
            context.unregister_node(self.handle);
        }
        self.engine.release_node(self.handle);
        tracing::debug!(kind = %self.kind, handle = ?self.handle, "node released");
    }
}

fn index_arg(site: &CallSite, args: &[HostValue], index: usize) -> Result<u32> {
    Ok(site
        .optional_arg(args, index, INDEX)?
        .and_then(|c| c.as_u32())
        .unwrap_or(0))
}

fn time_arg(site: &CallSite, args: &[HostValue], index: usize) -> Result<f64> {
    Ok(site
        .optional_arg(args, index, CoercionTarget::Double)?
        .and_then(|c| c.as_f64())
        .unwrap_or(0.0))
}
