//! Introspection metadata table.
//!
//! Built once from the node schema table plus a handful of shared base
//! types, then read-only for the life of the process. Anything host-facing
//! that reports a type's name, constructor arity, string tag or member
//! visibility reads it from here.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;

use crate::schema::{
    MethodSpec, NodeKind, NodeSchema, ADD_EVENT_LISTENER, CANCEL_SCHEDULED_VALUES, CONNECT,
    DISCONNECT, EXPONENTIAL_RAMP_TO_VALUE_AT_TIME, LINEAR_RAMP_TO_VALUE_AT_TIME,
    REMOVE_EVENT_LISTENER, SET_TARGET_AT_TIME, SET_VALUE_AT_TIME, START, STOP,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MemberKind {
    Method,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDescriptor {
    pub name: &'static str,
    pub kind: MemberKind,
    pub enumerable: bool,
    /// Declared arity; always 0 for attributes.
    pub arity: usize,
}

impl MemberDescriptor {
    fn method(spec: &MethodSpec) -> Self {
        Self {
            name: spec.name,
            kind: MemberKind::Method,
            enumerable: true,
            arity: spec.arity(),
        }
    }

    fn attribute(name: &'static str) -> Self {
        Self {
            name,
            kind: MemberKind::Attribute,
            enumerable: true,
            arity: 0,
        }
    }

    fn constructor(length: usize) -> Self {
        Self {
            name: "constructor",
            kind: MemberKind::Method,
            enumerable: false,
            arity: length,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    pub name: &'static str,
    /// Constructor arity.
    pub length: usize,
    pub to_string_tag: &'static str,
    pub parent: Option<&'static str>,
    pub members: Vec<MemberDescriptor>,
}

impl TypeDescriptor {
    fn new(name: &'static str, length: usize, parent: Option<&'static str>) -> Self {
        Self {
            name,
            length,
            to_string_tag: name,
            parent,
            members: vec![MemberDescriptor::constructor(length)],
        }
    }

    fn methods(mut self, specs: &[MethodSpec]) -> Self {
        self.members.extend(specs.iter().map(MemberDescriptor::method));
        self
    }

    fn attributes(mut self, names: &[&'static str]) -> Self {
        self.members
            .extend(names.iter().copied().map(MemberDescriptor::attribute));
        self
    }

    /// A member declared directly on this type.
    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Names of the members enumeration reports, in declaration order.
    pub fn enumerable_members(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.members
            .iter()
            .filter(|m| m.enumerable)
            .map(|m| m.name)
    }

    fn from_schema(schema: &NodeSchema) -> Self {
        let parent = if schema.scheduled_source {
            "AudioScheduledSourceNode"
        } else {
            "AudioNode"
        };
        let params: Vec<&'static str> = schema.params.iter().map(|p| p.name).collect();
        Self::new(schema.name, schema.min_args(), Some(parent))
            .attributes(&params)
            .attributes(schema.attributes)
            .methods(schema.methods)
    }
}

#[derive(Debug)]
pub struct MetadataRegistry {
    /// Indexed by position in [`NodeKind::ALL`].
    kinds: Vec<TypeDescriptor>,
    by_name: HashMap<&'static str, TypeDescriptor>,
}

impl MetadataRegistry {
    fn build() -> Self {
        let kinds: Vec<TypeDescriptor> = NodeKind::ALL
            .iter()
            .map(|k| TypeDescriptor::from_schema(k.schema()))
            .collect();

        let mut by_name = HashMap::new();
        for descriptor in base_descriptors().into_iter().chain(kinds.iter().cloned()) {
            by_name.insert(descriptor.name, descriptor);
        }

        tracing::debug!(types = by_name.len(), "metadata registry built");
        Self { kinds, by_name }
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.by_name.get(name)
    }

    pub fn for_kind(&self, kind: NodeKind) -> &TypeDescriptor {
        &self.kinds[kind as usize]
    }

    /// All descriptors, sorted by name.
    pub fn descriptors(&self) -> Vec<&TypeDescriptor> {
        let mut all: Vec<_> = self.by_name.values().collect();
        all.sort_by_key(|d| d.name);
        all
    }

    /// Resolve a member through the parent chain.
    pub fn lookup_member(&self, type_name: &str, member: &str) -> Option<&MemberDescriptor> {
        let mut current = self.get(type_name);
        while let Some(descriptor) = current {
            if let Some(found) = descriptor.member(member) {
                return Some(found);
            }
            current = descriptor.parent.and_then(|p| self.get(p));
        }
        None
    }

    /// Declared arity of a method, inherited members included.
    pub fn method_arity(&self, type_name: &str, method: &str) -> Option<usize> {
        self.lookup_member(type_name, method)
            .filter(|m| m.kind == MemberKind::Method)
            .map(|m| m.arity)
    }

    pub fn ancestry(&self, type_name: &str) -> Vec<&'static str> {
        let mut chain = Vec::new();
        let mut current = self.get(type_name);
        while let Some(descriptor) = current {
            chain.push(descriptor.name);
            current = descriptor.parent.and_then(|p| self.get(p));
        }
        chain
    }
}

fn base_descriptors() -> Vec<TypeDescriptor> {
    vec![
        TypeDescriptor::new("EventTarget", 0, None)
            .methods(&[ADD_EVENT_LISTENER, REMOVE_EVENT_LISTENER]),
        TypeDescriptor::new("AudioNode", 0, Some("EventTarget"))
            .attributes(&[
                "context",
                "numberOfInputs",
                "numberOfOutputs",
                "channelCount",
                "channelCountMode",
                "channelInterpretation",
            ])
            .methods(&[CONNECT, DISCONNECT]),
        TypeDescriptor::new("AudioScheduledSourceNode", 0, Some("AudioNode"))
            .attributes(&["onended"])
            .methods(&[START, STOP]),
        TypeDescriptor::new("AudioParam", 0, None)
            .attributes(&[
                "value",
                "automationRate",
                "defaultValue",
                "minValue",
                "maxValue",
            ])
            .methods(&[
                SET_VALUE_AT_TIME,
                LINEAR_RAMP_TO_VALUE_AT_TIME,
                EXPONENTIAL_RAMP_TO_VALUE_AT_TIME,
                SET_TARGET_AT_TIME,
                CANCEL_SCHEDULED_VALUES,
            ]),
        TypeDescriptor::new("BaseAudioContext", 0, Some("EventTarget"))
            .attributes(&["sampleRate", "currentTime", "state"]),
        TypeDescriptor::new("AudioContext", 0, Some("BaseAudioContext")),
        TypeDescriptor::new("OfflineAudioContext", 1, Some("BaseAudioContext"))
            .attributes(&["length"]),
    ]
}

static REGISTRY: OnceLock<MetadataRegistry> = OnceLock::new();

pub fn registry() -> &'static MetadataRegistry {
    REGISTRY.get_or_init(MetadataRegistry::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_arity_counts_required_parameters_only() {
        let reg = registry();
        assert_eq!(reg.method_arity("AudioNode", "connect"), Some(1));
        assert_eq!(reg.method_arity("AudioNode", "disconnect"), Some(0));
        assert_eq!(reg.method_arity("IIRFilterNode", "getFrequencyResponse"), Some(3));
        assert_eq!(reg.method_arity("AudioParam", "setValueAtTime"), Some(2));
        assert_eq!(reg.method_arity("AudioParam", "setTargetAtTime"), Some(3));
        assert_eq!(reg.method_arity("AudioScheduledSourceNode", "start"), Some(0));
        assert_eq!(reg.method_arity("EventTarget", "addEventListener"), Some(2));
    }

    #[test]
    fn constructor_lengths() {
        let reg = registry();
        assert_eq!(reg.for_kind(NodeKind::Gain).length, 1);
        assert_eq!(reg.for_kind(NodeKind::IirFilter).length, 2);
        assert_eq!(reg.for_kind(NodeKind::AudioWorklet).length, 2);
        assert_eq!(reg.get("OfflineAudioContext").map(|d| d.length), Some(1));
        assert_eq!(reg.get("AudioContext").map(|d| d.length), Some(0));
    }

    #[test]
    fn for_kind_matches_registration_order() {
        for kind in NodeKind::ALL {
            assert_eq!(registry().for_kind(kind).name, kind.name());
        }
    }

    #[test]
    fn inherited_members_resolve_through_parents() {
        let reg = registry();
        assert_eq!(reg.method_arity("OscillatorNode", "start"), Some(0));
        assert_eq!(reg.method_arity("GainNode", "connect"), Some(1));
        assert_eq!(reg.method_arity("GainNode", "start"), None);
        assert_eq!(reg.method_arity("GainNode", "gain"), None);
        assert_eq!(
            reg.ancestry("ConstantSourceNode"),
            vec!["ConstantSourceNode", "AudioScheduledSourceNode", "AudioNode", "EventTarget"]
        );
    }

    #[test]
    fn constructor_is_hidden_from_enumeration() {
        let gain = registry().for_kind(NodeKind::Gain);
        let visible: Vec<_> = gain.enumerable_members().collect();
        assert_eq!(visible, vec!["gain"]);
        assert!(gain.member("constructor").is_some());
        assert_eq!(gain.to_string_tag, "GainNode");
    }
}
