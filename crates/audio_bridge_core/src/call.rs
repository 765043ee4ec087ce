//! Call-site descriptions and the argument checks shared by constructors,
//! methods and setters.

use crate::coerce::{self, CoercionTarget, Coerced};
use crate::error::{BridgeError, Result};
use crate::value::HostValue;

/// Where a host call landed. Renders the `Failed to ...:` prefix every
/// validation message starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    prefix: String,
}

impl CallSite {
    pub fn construct(type_name: &str) -> Self {
        Self {
            prefix: format!("Failed to construct '{}':", type_name),
        }
    }

    pub fn execute(method: &str, type_name: &str) -> Self {
        Self {
            prefix: format!("Failed to execute '{}' on '{}':", method, type_name),
        }
    }

    pub fn set_property(property: &str, type_name: &str) -> Self {
        Self {
            prefix: format!("Failed to set the '{}' property on '{}':", property, type_name),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn check_arity(&self, required: usize, args: &[HostValue]) -> Result<()> {
        if args.len() < required {
            return Err(BridgeError::Arity(format!(
                "{} {} argument required, but only {} present",
                self.prefix,
                required,
                args.len()
            )));
        }
        Ok(())
    }

    pub fn type_mismatch(&self, detail: impl std::fmt::Display) -> BridgeError {
        BridgeError::TypeMismatch(format!("{} {}", self.prefix, detail))
    }

    /// Coerce a plain method argument. Conversion messages read
    /// `<prefix> The provided value (<v>) <reason>`.
    pub fn coerce_arg(&self, value: &HostValue, target: CoercionTarget) -> Result<Coerced> {
        let context = format!("{} The provided value ({})", self.prefix, value);
        coerce::coerce(value, target, &context, &self.prefix)
    }

    /// Optional trailing argument: absent or `undefined` yields `default`.
    pub fn optional_arg(
        &self,
        args: &[HostValue],
        index: usize,
        target: CoercionTarget,
    ) -> Result<Option<Coerced>> {
        match args.get(index) {
            None | Some(HostValue::Undefined) => Ok(None),
            Some(value) => self.coerce_arg(value, target).map(Some),
        }
    }
}

/// Error raised when a kind-specific method is invoked on the wrong node.
pub fn invalid_receiver(type_name: &str) -> BridgeError {
    BridgeError::TypeMismatch(format!(
        "Invalid Invocation: Value of 'this' must be of type '{}'",
        type_name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_message_reports_counts() {
        let site = CallSite::construct("IIRFilterNode");
        let err = site.check_arity(2, &[HostValue::Null]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to construct 'IIRFilterNode': 2 argument required, but only 1 present"
        );
        assert!(site.check_arity(2, &[HostValue::Null, HostValue::Null]).is_ok());
    }

    #[test]
    fn execute_prefix() {
        let site = CallSite::execute("setValueAtTime", "AudioParam");
        let err = site
            .coerce_arg(&HostValue::from("soon"), CoercionTarget::Double)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to execute 'setValueAtTime' on 'AudioParam': The provided value (soon) is not a finite floating-point value."
        );
    }

    #[test]
    fn optional_args_default_when_undefined() {
        let site = CallSite::execute("start", "OscillatorNode");
        let args = [HostValue::Undefined];
        assert!(site.optional_arg(&args, 0, CoercionTarget::Double).unwrap().is_none());
        assert!(site.optional_arg(&args, 3, CoercionTarget::Double).unwrap().is_none());
    }
}
