//! Parameter bridge.
//!
//! An [`AudioParam`] wraps one native parameter sub-handle. It is created
//! while its node is being wired and lives exactly as long as that node.

use std::fmt;
use std::sync::Arc;

use crate::call::CallSite;
use crate::coerce::CoercionTarget;
use crate::engine::{AutomationEvent, NativeEngine, NativeNodeHandle, NativeParamHandle, ParamInfo};
use crate::error::{sanitize, BridgeError, Result};
use crate::schema::{
    MethodSpec, NodeKind, CANCEL_SCHEDULED_VALUES, EXPONENTIAL_RAMP_TO_VALUE_AT_TIME,
    LINEAR_RAMP_TO_VALUE_AT_TIME, SET_TARGET_AT_TIME, SET_VALUE_AT_TIME,
};
use crate::value::HostValue;

const TYPE_NAME: &str = "AudioParam";

/// Non-owning host reference to a parameter, usable as a `connect`
/// destination.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ParamRef {
    handle: NativeParamHandle,
    owner: NodeKind,
    name: &'static str,
}

impl ParamRef {
    pub fn handle(&self) -> NativeParamHandle {
        self.handle
    }

    pub fn owner_kind(&self) -> NodeKind {
        self.owner
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({:?})", self.owner, self.name, self.handle)
    }
}

pub struct AudioParam {
    engine: Arc<dyn NativeEngine>,
    handle: NativeParamHandle,
    owner: NodeKind,
    name: &'static str,
    info: ParamInfo,
}

impl fmt::Debug for AudioParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioParam")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("info", &self.info)
            .finish()
    }
}

impl AudioParam {
    /// Request the sub-handle for `name` from a freshly allocated node.
    pub(crate) fn wrap(
        engine: &Arc<dyn NativeEngine>,
        node: NativeNodeHandle,
        owner: NodeKind,
        name: &'static str,
    ) -> Result<Self> {
        let handle = engine.param_handle(node, name).map_err(sanitize)?;
        let info = engine.param_info(handle).map_err(sanitize)?;
        Ok(Self {
            engine: Arc::clone(engine),
            handle,
            owner,
            name,
            info,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn handle(&self) -> NativeParamHandle {
        self.handle
    }

    pub fn default_value(&self) -> f32 {
        self.info.default_value
    }

    pub fn min_value(&self) -> f32 {
        self.info.min_value
    }

    pub fn max_value(&self) -> f32 {
        self.info.max_value
    }

    pub fn automation_rate(&self) -> &'static str {
        self.info.automation_rate.as_str()
    }

    pub fn to_ref(&self) -> ParamRef {
        ParamRef {
            handle: self.handle,
            owner: self.owner,
            name: self.name,
        }
    }

    pub fn as_host_value(&self) -> HostValue {
        HostValue::Param(self.to_ref())
    }

    pub fn value(&self) -> Result<f32> {
        self.engine.param_value(self.handle).map_err(sanitize)
    }

    pub fn set_value(&self, value: &HostValue) -> Result<()> {
        let site = CallSite::set_property("value", TYPE_NAME);
        let n = value.to_number() as f32;
        if !n.is_finite() {
            return Err(BridgeError::Conversion(format!(
                "{} The provided float value is non-finite.",
                site.prefix()
            )));
        }
        self.engine.set_param_value(self.handle, n).map_err(sanitize)
    }

    fn schedule(&self, event: AutomationEvent) -> Result<&Self> {
        self.engine
            .schedule_param(self.handle, event)
            .map_err(sanitize)?;
        Ok(self)
    }

    fn call_site(method: &MethodSpec, args: &[HostValue]) -> Result<CallSite> {
        let site = CallSite::execute(method.name, TYPE_NAME);
        site.check_arity(method.arity(), args)?;
        Ok(site)
    }

    pub fn set_value_at_time(&self, args: &[HostValue]) -> Result<&Self> {
        let site = Self::call_site(&SET_VALUE_AT_TIME, args)?;
        let value = float_arg(&site, &args[0])?;
        let start_time = double_arg(&site, &args[1])?;
        self.schedule(AutomationEvent::SetValueAtTime { value, start_time })
    }

    pub fn linear_ramp_to_value_at_time(&self, args: &[HostValue]) -> Result<&Self> {
        let site = Self::call_site(&LINEAR_RAMP_TO_VALUE_AT_TIME, args)?;
        let value = float_arg(&site, &args[0])?;
        let end_time = double_arg(&site, &args[1])?;
        self.schedule(AutomationEvent::LinearRampToValueAtTime { value, end_time })
    }

    pub fn exponential_ramp_to_value_at_time(&self, args: &[HostValue]) -> Result<&Self> {
        let site = Self::call_site(&EXPONENTIAL_RAMP_TO_VALUE_AT_TIME, args)?;
        let value = float_arg(&site, &args[0])?;
        let end_time = double_arg(&site, &args[1])?;
        self.schedule(AutomationEvent::ExponentialRampToValueAtTime { value, end_time })
    }

    pub fn set_target_at_time(&self, args: &[HostValue]) -> Result<&Self> {
        let site = Self::call_site(&SET_TARGET_AT_TIME, args)?;
        let target = float_arg(&site, &args[0])?;
        let start_time = double_arg(&site, &args[1])?;
        let time_constant = float_arg(&site, &args[2])?;
        self.schedule(AutomationEvent::SetTargetAtTime {
            target,
            start_time,
            time_constant,
        })
    }

    pub fn cancel_scheduled_values(&self, args: &[HostValue]) -> Result<&Self> {
        let site = Self::call_site(&CANCEL_SCHEDULED_VALUES, args)?;
        let cancel_time = double_arg(&site, &args[0])?;
        self.schedule(AutomationEvent::CancelScheduledValues { cancel_time })
    }
}

fn float_arg(site: &CallSite, value: &HostValue) -> Result<f32> {
    let coerced = site.coerce_arg(value, CoercionTarget::Float)?;
    Ok(coerced.as_f32().unwrap_or_default())
}

fn double_arg(site: &CallSite, value: &HostValue) -> Result<f64> {
    let coerced = site.coerce_arg(value, CoercionTarget::Double)?;
    Ok(coerced.as_f64().unwrap_or_default())
}
