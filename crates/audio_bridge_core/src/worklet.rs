//! Real-time processors backing `AudioWorkletNode`.
//!
//! Processors are looked up by name in a [`ProcessorRegistry`] that is built
//! at startup and handed to the engine. `process` runs on the render path:
//! no blocking, no allocation, fixed 128-frame blocks.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::NativeResult;
use crate::error::{NativeError, NativeErrorKind};
use crate::value::{HostValue, TypedArray};

pub const RENDER_QUANTUM_SIZE: usize = 128;

/// `[port][channel][frame]`, each channel [`RENDER_QUANTUM_SIZE`] frames long.
pub type AudioPorts = Vec<Vec<Vec<f32>>>;

pub type ProcessorParameters = BTreeMap<String, Vec<f32>>;

/// Shared sample source written by the host and read by a processor.
pub type SharedSamples = TypedArray<f32>;

pub trait AudioWorkletProcessor: Send {
    /// Fill `outputs` for one quantum. Returning `false` lets the engine
    /// stop invoking this processor.
    fn process(
        &mut self,
        inputs: &AudioPorts,
        outputs: &mut AudioPorts,
        parameters: &ProcessorParameters,
    ) -> bool;
}

/// What a processor constructor gets to see of the node being created.
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub number_of_inputs: u32,
    pub number_of_outputs: u32,
    pub output_channel_count: u32,
    pub processor_options: HostValue,
}

pub type ProcessorConstructor =
    Arc<dyn Fn(&ProcessorOptions) -> NativeResult<Box<dyn AudioWorkletProcessor>> + Send + Sync>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("processor name must not be empty")]
    EmptyName,

    #[error("a processor named '{0}' is already registered")]
    Duplicate(String),
}

#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    constructors: BTreeMap<String, ProcessorConstructor>,
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.constructors.keys()).finish()
    }
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every processor shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        install_processors(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, name: &str, constructor: F) -> Result<(), RegistryError>
    where
        F: Fn(&ProcessorOptions) -> NativeResult<Box<dyn AudioWorkletProcessor>>
            + Send
            + Sync
            + 'static,
    {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.constructors.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.constructors.insert(name.to_string(), Arc::new(constructor));
        tracing::debug!(processor = name, "registered processor");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn instantiate(
        &self,
        name: &str,
        options: &ProcessorOptions,
    ) -> NativeResult<Box<dyn AudioWorkletProcessor>> {
        match self.constructors.get(name) {
            Some(constructor) => constructor(options),
            None => Err(NativeError::categorized(
                NativeErrorKind::InvalidStateError,
                format_args!("no processor registered under the name '{}'", name),
            )),
        }
    }
}

fn install_processors(registry: &mut ProcessorRegistry) {
    let installed = registry.register(ArraySourceProcessor::NAME, |options| {
        ArraySourceProcessor::from_options(options)
            .map(|p| Box::new(p) as Box<dyn AudioWorkletProcessor>)
    });
    debug_assert!(installed.is_ok(), "builtin processor names collide: {:?}", installed);
}

/// Plays the head of a shared sample array on every channel of its first
/// output.
pub struct ArraySourceProcessor {
    source: SharedSamples,
    block: [f32; RENDER_QUANTUM_SIZE],
}

impl ArraySourceProcessor {
    pub const NAME: &'static str = "array-source";

    pub fn new(source: SharedSamples) -> Self {
        Self {
            source,
            block: [0.0; RENDER_QUANTUM_SIZE],
        }
    }

    pub fn from_options(options: &ProcessorOptions) -> NativeResult<Self> {
        match options.processor_options.get("sharedFloats") {
            Some(HostValue::Float32Array(samples)) => Ok(Self::new(samples.clone())),
            _ => Err(NativeError::categorized(
                NativeErrorKind::TypeError,
                "array-source expects processorOptions.sharedFloats to be a Float32Array",
            )),
        }
    }
}

impl AudioWorkletProcessor for ArraySourceProcessor {
    fn process(
        &mut self,
        _inputs: &AudioPorts,
        outputs: &mut AudioPorts,
        _parameters: &ProcessorParameters,
    ) -> bool {
        self.block.fill(0.0);
        // A writer holding the array means this quantum stays silent.
        if let Some(n) = self.source.try_read_into(&mut self.block) {
            self.block[n..].fill(0.0);
        }

        if let Some(output) = outputs.first_mut() {
            for channel in output.iter_mut() {
                let n = channel.len().min(RENDER_QUANTUM_SIZE);
                channel[..n].copy_from_slice(&self.block[..n]);
            }
        }
        true
    }
}

/// Allocate silent ports for one quantum.
pub fn silent_ports(ports: u32, channels: u32) -> AudioPorts {
    (0..ports)
        .map(|_| vec![vec![0.0; RENDER_QUANTUM_SIZE]; channels as usize])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_with(samples: &SharedSamples) -> ProcessorOptions {
        ProcessorOptions {
            number_of_inputs: 0,
            number_of_outputs: 1,
            output_channel_count: 2,
            processor_options: HostValue::object([(
                "sharedFloats",
                HostValue::Float32Array(samples.clone()),
            )]),
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ProcessorRegistry::with_builtin();
        let err = registry
            .register("array-source", |_| {
                Err(NativeError::new("unused"))
            })
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("array-source".into()));
        assert_eq!(registry.register("", |_| Err(NativeError::new("unused"))), Err(RegistryError::EmptyName));
        assert_eq!(registry.names(), vec!["array-source"]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "builtin processor names collide")]
    fn reinstalling_builtins_is_caught() {
        let mut registry = ProcessorRegistry::with_builtin();
        install_processors(&mut registry);
    }

    #[test]
    fn unknown_processor_is_an_invalid_state() {
        let registry = ProcessorRegistry::new();
        let samples = SharedSamples::zeroed(4);
        let err = registry
            .instantiate("missing", &options_with(&samples))
            .err()
            .unwrap();
        assert!(err.raw().starts_with("InvalidStateError - "));
    }

    #[test]
    fn array_source_copies_into_every_channel() {
        let samples: SharedSamples = (0..200).map(|i| i as f32).collect::<Vec<_>>().into();
        let registry = ProcessorRegistry::with_builtin();
        let mut processor = registry
            .instantiate("array-source", &options_with(&samples))
            .unwrap();

        let inputs = silent_ports(0, 0);
        let mut outputs = silent_ports(1, 2);
        assert!(processor.process(&inputs, &mut outputs, &ProcessorParameters::new()));
        for channel in &outputs[0] {
            assert_eq!(channel.len(), RENDER_QUANTUM_SIZE);
            assert_eq!(channel[0], 0.0);
            assert_eq!(channel[127], 127.0);
        }
    }

    #[test]
    fn short_source_is_zero_filled() {
        let samples: SharedSamples = vec![0.5, 0.25].into();
        let mut processor = ArraySourceProcessor::new(samples.clone());
        let mut outputs = silent_ports(1, 1);
        outputs[0][0].fill(9.0);
        processor.process(&silent_ports(0, 0), &mut outputs, &ProcessorParameters::new());
        assert_eq!(&outputs[0][0][..3], &[0.5, 0.25, 0.0]);
        assert!(outputs[0][0][3..].iter().all(|s| *s == 0.0));

        // host writes become visible on the next quantum
        samples.write(&[1.0]);
        processor.process(&silent_ports(0, 0), &mut outputs, &ProcessorParameters::new());
        assert_eq!(outputs[0][0][0], 1.0);
    }

    #[test]
    fn missing_shared_floats_is_rejected() {
        let options = ProcessorOptions {
            number_of_inputs: 0,
            number_of_outputs: 1,
            output_channel_count: 1,
            processor_options: HostValue::Null,
        };
        assert!(ArraySourceProcessor::from_options(&options).is_err());
    }
}
