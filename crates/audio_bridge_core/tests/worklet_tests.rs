mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use serde_json::json;

use audio_bridge_core::worklet::{
    AudioPorts, AudioWorkletProcessor, ProcessorParameters, RENDER_QUANTUM_SIZE,
};
use audio_bridge_core::{
    AudioContext, BridgeConfig, HostValue, NativeEngine, NodeKind, ProcessorRegistry,
    ReferenceEngine, TypedArray,
};

use common::{opts, realtime, recording, RecordingEngine};

fn array_source_args(samples: &TypedArray<f32>, extra: serde_json::Value) -> Vec<HostValue> {
    let mut options = match HostValue::from(extra) {
        HostValue::Object(map) => map,
        _ => Default::default(),
    };
    options.insert(
        "processorOptions".into(),
        HostValue::object([("sharedFloats", HostValue::Float32Array(samples.clone()))]),
    );
    vec![HostValue::from("array-source"), HostValue::Object(options)]
}

#[test]
fn array_source_plays_the_shared_head_on_every_channel() {
    let engine = recording();
    let ctx = realtime(&engine);
    let samples = TypedArray::new(vec![0.5, -0.25, 1.0]);
    let node = ctx
        .create_node(NodeKind::AudioWorklet, &array_source_args(&samples, json!({})))
        .unwrap();

    let quantum = node.render_quantum().unwrap();
    assert!(quantum.keep_alive);
    assert_eq!(quantum.outputs.len(), 1);
    assert_eq!(quantum.outputs[0].len(), 2);
    for channel in &quantum.outputs[0] {
        assert_eq!(channel.len(), RENDER_QUANTUM_SIZE);
        assert_eq!(&channel[..3], &[0.5, -0.25, 1.0]);
        assert!(channel[3..].iter().all(|s| *s == 0.0));
    }
}

#[test]
fn host_writes_show_up_in_the_next_quantum() {
    let engine = recording();
    let ctx = realtime(&engine);
    let samples = TypedArray::<f32>::zeroed(RENDER_QUANTUM_SIZE * 2);
    let node = ctx
        .create_node(
            NodeKind::AudioWorklet,
            &array_source_args(&samples, json!({"channelCount": 1})),
        )
        .unwrap();

    let silent = node.render_quantum().unwrap();
    assert!(silent.outputs[0][0].iter().all(|s| *s == 0.0));

    samples.write(&[0.75; RENDER_QUANTUM_SIZE * 2]);
    let loud = node.render_quantum().unwrap();
    assert_eq!(loud.outputs[0].len(), 1);
    assert!(loud.outputs[0][0].iter().all(|s| *s == 0.75));
}

#[test]
fn only_the_first_output_is_written() {
    let engine = recording();
    let ctx = realtime(&engine);
    let samples = TypedArray::new(vec![1.0; RENDER_QUANTUM_SIZE]);
    let node = ctx
        .create_node(
            NodeKind::AudioWorklet,
            &array_source_args(&samples, json!({"numberOfInputs": 0, "numberOfOutputs": 2})),
        )
        .unwrap();
    assert_eq!(node.number_of_inputs(), 0);
    assert_eq!(node.number_of_outputs(), 2);

    let quantum = node.render_quantum().unwrap();
    assert!(quantum.outputs[0][0].iter().all(|s| *s == 1.0));
    assert!(quantum.outputs[1].iter().flatten().all(|s| *s == 0.0));
}

#[test]
fn missing_shared_samples_are_a_native_type_error() {
    let engine = recording();
    let ctx = realtime(&engine);
    let err = ctx
        .create_node(
            NodeKind::AudioWorklet,
            &[HostValue::from("array-source"), opts(json!({"processorOptions": {}}))],
        )
        .unwrap_err();
    assert_eq!(err.host_error_name(), "TypeError");
    assert!(!err.is_validation());
    assert_eq!(
        err.to_string(),
        "array-source expects processorOptions.sharedFloats to be a Float32Array"
    );

    let err = ctx
        .create_node(
            NodeKind::AudioWorklet,
            &[
                HostValue::from("array-source"),
                opts(json!({"numberOfInputs": 0, "numberOfOutputs": 0})),
            ],
        )
        .unwrap_err();
    assert_eq!(err.host_error_name(), "NotSupportedError");
}

struct OneShot {
    calls: Arc<AtomicUsize>,
}

impl AudioWorkletProcessor for OneShot {
    fn process(
        &mut self,
        _inputs: &AudioPorts,
        outputs: &mut AudioPorts,
        _parameters: &ProcessorParameters,
    ) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for channel in outputs.iter_mut().flatten() {
            channel.fill(0.1);
        }
        false
    }
}

#[test]
fn finished_processors_are_not_invoked_again() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut processors = ProcessorRegistry::with_builtin();
    let counter = calls.clone();
    processors
        .register("one-shot", move |_| {
            Ok(Box::new(OneShot {
                calls: counter.clone(),
            }) as Box<dyn AudioWorkletProcessor>)
        })
        .unwrap();
    assert_eq!(processors.names(), vec!["array-source", "one-shot"]);

    let engine = Arc::new(RecordingEngine::new(ReferenceEngine::new(
        BridgeConfig::default(),
        processors,
    )));
    let shared: Arc<dyn NativeEngine> = engine.clone();
    let ctx = AudioContext::new(shared, &[]).unwrap();
    let node = ctx
        .create_node(NodeKind::AudioWorklet, &[HostValue::from("one-shot")])
        .unwrap();

    let first = node.render_quantum().unwrap();
    assert!(!first.keep_alive);
    assert!(first.outputs[0][0].iter().all(|s| *s == 0.1));

    let second = node.render_quantum().unwrap();
    assert!(!second.keep_alive);
    assert!(second.outputs[0][0].iter().all(|s| *s == 0.0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.count("render_quantum"), 2);
}

/// Reads engine state from inside `process`.
struct EngineObserver {
    engine: Arc<OnceLock<Weak<ReferenceEngine>>>,
    live_nodes: Arc<AtomicUsize>,
}

impl AudioWorkletProcessor for EngineObserver {
    fn process(
        &mut self,
        _inputs: &AudioPorts,
        _outputs: &mut AudioPorts,
        _parameters: &ProcessorParameters,
    ) -> bool {
        if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
            self.live_nodes.store(engine.live_nodes(), Ordering::SeqCst);
        }
        true
    }
}

#[test]
fn processors_can_query_the_engine_while_rendering() {
    let cell: Arc<OnceLock<Weak<ReferenceEngine>>> = Arc::new(OnceLock::new());
    let live_nodes = Arc::new(AtomicUsize::new(0));

    let mut processors = ProcessorRegistry::new();
    let (engine_cell, counter) = (cell.clone(), live_nodes.clone());
    processors
        .register("observer", move |_| {
            Ok(Box::new(EngineObserver {
                engine: engine_cell.clone(),
                live_nodes: counter.clone(),
            }) as Box<dyn AudioWorkletProcessor>)
        })
        .unwrap();

    let engine = Arc::new(ReferenceEngine::new(BridgeConfig::default(), processors));
    cell.set(Arc::downgrade(&engine)).unwrap();
    let shared: Arc<dyn NativeEngine> = engine.clone();
    let ctx = AudioContext::new(shared, &[]).unwrap();
    let node = ctx
        .create_node(NodeKind::AudioWorklet, &[HostValue::from("observer")])
        .unwrap();

    assert!(node.render_quantum().unwrap().keep_alive);
    assert_eq!(live_nodes.load(Ordering::SeqCst), 1);
    // the processor went back into its slot
    assert!(node.render_quantum().unwrap().keep_alive);
}
