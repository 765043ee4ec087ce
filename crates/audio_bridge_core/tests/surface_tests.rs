mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use audio_bridge_core::engine::{AutomationEvent, ConnectTarget};
use audio_bridge_core::{BridgeError, Event, HostValue, NodeKind, TypedArray};

use common::{opts, realtime, recording};

fn f32_array(values: &[f32]) -> (TypedArray<f32>, HostValue) {
    let array = TypedArray::new(values.to_vec());
    let host = HostValue::Float32Array(array.clone());
    (array, host)
}

#[test]
fn frequency_response_checks_arity_before_dispatch() {
    let engine = recording();
    let ctx = realtime(&engine);
    let iir = ctx
        .create_node(
            NodeKind::IirFilter,
            &[opts(json!({"feedforward": [1], "feedback": [1]}))],
        )
        .unwrap();
    let (_, freqs) = f32_array(&[100.0]);
    let (_, mag) = f32_array(&[0.0]);

    let err = iir.get_frequency_response(&[freqs, mag]).unwrap_err();
    assert_eq!(
        err,
        BridgeError::Arity(
            "Failed to execute 'getFrequencyResponse' on 'IIRFilterNode': 3 argument required, but only 2 present".into()
        )
    );
    assert_eq!(engine.count("get_frequency_response"), 0);
}

#[test]
fn identity_iir_has_a_flat_response() {
    let engine = recording();
    let ctx = realtime(&engine);
    let iir = ctx
        .create_node(
            NodeKind::IirFilter,
            &[opts(json!({"feedforward": [1], "feedback": [1]}))],
        )
        .unwrap();

    let (_, freqs) = f32_array(&[0.0, 1_000.0, 10_000.0]);
    let (mag, mag_host) = f32_array(&[0.0; 3]);
    let (phase, phase_host) = f32_array(&[9.0; 3]);

    iir.get_frequency_response(&[freqs, mag_host, phase_host])
        .unwrap();
    assert_eq!(mag.to_vec(), vec![1.0, 1.0, 1.0]);
    assert_eq!(phase.to_vec(), vec![0.0, 0.0, 0.0]);
}

#[test]
fn lowpass_biquad_attenuates_above_cutoff() {
    let engine = recording();
    let ctx = realtime(&engine);
    let biquad = ctx
        .create_node(
            NodeKind::BiquadFilter,
            &[opts(json!({"type": "lowpass", "frequency": 500}))],
        )
        .unwrap();

    let (_, freqs) = f32_array(&[10.0, 10_000.0, 30_000.0]);
    let (mag, mag_host) = f32_array(&[0.0; 3]);
    let (_, phase_host) = f32_array(&[0.0; 3]);
    biquad
        .get_frequency_response(&[freqs, mag_host, phase_host])
        .unwrap();

    let mag = mag.to_vec();
    assert!((mag[0] - 1.0).abs() < 0.01);
    assert!(mag[1] < 0.05);
    assert!(mag[2].is_nan());
}

#[test]
fn frequency_response_argument_types() {
    let engine = recording();
    let ctx = realtime(&engine);
    let biquad = ctx.create_node(NodeKind::BiquadFilter, &[]).unwrap();
    let (_, freqs) = f32_array(&[100.0]);
    let (_, phase) = f32_array(&[0.0]);

    let err = biquad
        .get_frequency_response(&[freqs.clone(), opts(json!([0])), phase.clone()])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to execute 'getFrequencyResponse' on 'BiquadFilterNode': parameter 2 is not of type 'Float32Array'."
    );

    let (_, short) = f32_array(&[]);
    let err = biquad
        .get_frequency_response(&[freqs, short, phase])
        .unwrap_err();
    assert_eq!(err.host_error_name(), "InvalidAccessError");
    assert!(!err.to_string().contains(".rs"));
}

#[test]
fn kind_specific_methods_check_the_receiver() {
    let engine = recording();
    let ctx = realtime(&engine);
    let gain = ctx.create_node(NodeKind::Gain, &[]).unwrap();

    let err = gain.get_frequency_response(&[]).unwrap_err();
    assert_eq!(
        err,
        BridgeError::TypeMismatch(
            "Invalid Invocation: Value of 'this' must be of type 'BiquadFilterNode'".into()
        )
    );

    let err = gain.start(&[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid Invocation: Value of 'this' must be of type 'AudioScheduledSourceNode'"
    );

    let err = gain.render_quantum().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid Invocation: Value of 'this' must be of type 'AudioWorkletNode'"
    );
}

#[test]
fn connect_records_graph_edges() {
    let engine = recording();
    let ctx = realtime(&engine);
    let source = ctx.create_node(NodeKind::ConstantSource, &[]).unwrap();
    let gain = ctx.create_node(NodeKind::Gain, &[]).unwrap();
    let delay = ctx.create_node(NodeKind::Delay, &[]).unwrap();

    source.connect(&[gain.as_host_value()]).unwrap();
    source
        .connect(&[delay.param("delayTime").unwrap().as_host_value()])
        .unwrap();
    gain.connect(&[delay.as_host_value(), HostValue::from(0.0), HostValue::from(0.0)])
        .unwrap();

    let edges = engine.inner.connections(source.handle());
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].target, ConnectTarget::Node(gain.handle()));
    assert_eq!(
        edges[1].target,
        ConnectTarget::Param(delay.param("delayTime").unwrap().handle())
    );

    source.disconnect(&[gain.as_host_value()]).unwrap();
    assert_eq!(engine.inner.connections(source.handle()).len(), 1);
    source.disconnect(&[]).unwrap();
    assert!(engine.inner.connections(source.handle()).is_empty());
}

#[test]
fn connect_validation() {
    let engine = recording();
    let ctx = realtime(&engine);
    let other = realtime(&engine);
    let gain = ctx.create_node(NodeKind::Gain, &[]).unwrap();
    let delay = ctx.create_node(NodeKind::Delay, &[]).unwrap();
    let foreign = other.create_node(NodeKind::Gain, &[]).unwrap();

    let err = gain.connect(&[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to execute 'connect' on 'AudioNode': 1 argument required, but only 0 present"
    );

    let err = gain.connect(&[opts(json!({}))]).unwrap_err();
    assert_eq!(
        err,
        BridgeError::TypeMismatch(
            "Failed to execute 'connect' on 'AudioNode': parameter 1 is not of type 'AudioNode'.".into()
        )
    );

    let err = gain
        .connect(&[delay.as_host_value(), HostValue::from(1.0)])
        .unwrap_err();
    assert_eq!(err.host_error_name(), "IndexSizeError");
    assert_eq!(err.to_string(), "output index (1) exceeds number of outputs (1)");

    let err = gain.connect(&[foreign.as_host_value()]).unwrap_err();
    assert_eq!(err.host_error_name(), "InvalidAccessError");

    let err = gain
        .disconnect(&[delay.as_host_value()])
        .unwrap_err();
    assert_eq!(err.to_string(), "node is not connected to the given destination");

    let err = gain.disconnect(&[HostValue::from(3.0)]).unwrap_err();
    assert_eq!(err.host_error_name(), "IndexSizeError");
}

#[test]
fn scheduled_source_lifecycle() {
    let engine = recording();
    let ctx = realtime(&engine);
    let osc = ctx.create_node(NodeKind::Oscillator, &[]).unwrap();

    let err = osc.stop(&[]).unwrap_err();
    assert_eq!(err.to_string(), "cannot call stop before start");

    let err = osc.start(&[HostValue::from("soon")]).unwrap_err();
    assert_eq!(
        err,
        BridgeError::Conversion(
            "Failed to execute 'start' on 'AudioScheduledSourceNode': The provided value (soon) is not a finite floating-point value.".into()
        )
    );

    let err = osc.start(&[HostValue::from(-1.0)]).unwrap_err();
    assert_eq!(err.host_error_name(), "RangeError");

    osc.start(&[HostValue::Undefined]).unwrap();
    let err = osc.start(&[]).unwrap_err();
    assert_eq!(err.host_error_name(), "InvalidStateError");
    osc.stop(&[HostValue::from(0.5)]).unwrap();
}

#[test]
fn ended_is_routed_to_listeners_in_order() {
    let engine = recording();
    let ctx = realtime(&engine);
    let source = ctx.create_node(NodeKind::ConstantSource, &[]).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let l = log.clone();
    source.add_event_listener("ended", move |e: &Event| l.lock().push(format!("first {}", e.target)));
    let l = log.clone();
    source.set_onended(Some(move |e: &Event| l.lock().push(format!("handler {}", e.event_type))));
    let l = log.clone();
    let removed = source.add_event_listener("ended", move |_: &Event| l.lock().push("removed".into()));
    assert!(source.remove_event_listener(removed));

    source.start(&[]).unwrap();
    assert_eq!(ctx.dispatch_events(), 0);
    source.stop(&[]).unwrap();
    assert_eq!(ctx.dispatch_events(), 1);

    assert_eq!(
        *log.lock(),
        vec!["first ConstantSourceNode".to_string(), "handler ended".to_string()]
    );
    assert_eq!(ctx.dispatch_events(), 0);
}

#[test]
fn events_follow_native_emission_order() {
    let engine = recording();
    let ctx = realtime(&engine);
    let a = ctx.create_node(NodeKind::Oscillator, &[]).unwrap();
    let b = ctx.create_node(NodeKind::ConstantSource, &[]).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    for node in [&a, &b] {
        let l = log.clone();
        node.add_event_listener("ended", move |e: &Event| l.lock().push(e.target));
        node.start(&[]).unwrap();
    }
    b.stop(&[]).unwrap();
    a.stop(&[]).unwrap();

    assert_eq!(ctx.dispatch_events(), 2);
    assert_eq!(*log.lock(), vec![NodeKind::ConstantSource, NodeKind::Oscillator]);
}

#[test]
fn events_for_dropped_nodes_are_discarded() {
    let engine = recording();
    let ctx = realtime(&engine);
    let osc = ctx.create_node(NodeKind::Oscillator, &[]).unwrap();
    let fired = Arc::new(Mutex::new(0));
    let f = fired.clone();
    osc.set_onended(Some(move |_: &Event| *f.lock() += 1));
    osc.start(&[]).unwrap();
    osc.stop(&[]).unwrap();
    drop(osc);

    assert_eq!(ctx.dispatch_events(), 0);
    assert_eq!(*fired.lock(), 0);
}

#[test]
fn param_automation_surface() {
    let engine = recording();
    let ctx = realtime(&engine);
    let gain = ctx.create_node(NodeKind::Gain, &[]).unwrap();
    let param = gain.param("gain").unwrap();

    let err = param.set_value_at_time(&[HostValue::from(0.5)]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to execute 'setValueAtTime' on 'AudioParam': 2 argument required, but only 1 present"
    );

    let err = param
        .linear_ramp_to_value_at_time(&[HostValue::from("loud"), HostValue::from(1.0)])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to execute 'linearRampToValueAtTime' on 'AudioParam': The provided value (loud) is not a finite floating-point value."
    );

    let err = param
        .exponential_ramp_to_value_at_time(&[HostValue::from(0.0), HostValue::from(1.0)])
        .unwrap_err();
    assert_eq!(err.host_error_name(), "RangeError");

    let err = param
        .set_target_at_time(&[HostValue::from(1.0), HostValue::from(1.0)])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to execute 'setTargetAtTime' on 'AudioParam': 3 argument required, but only 2 present"
    );

    param
        .set_value_at_time(&[HostValue::from(0.25), HostValue::from(0.0)])
        .unwrap()
        .linear_ramp_to_value_at_time(&[HostValue::from(1.0), HostValue::from(2.0)])
        .unwrap();
    assert_eq!(param.value().unwrap(), 0.25);

    param.cancel_scheduled_values(&[HostValue::from(1.0)]).unwrap();
    assert_eq!(
        engine.inner.timeline(param.handle()),
        vec![AutomationEvent::SetValueAtTime {
            value: 0.25,
            start_time: 0.0
        }]
    );
}

#[test]
fn param_value_setter() {
    let engine = recording();
    let ctx = realtime(&engine);
    let panner = ctx.create_node(NodeKind::StereoPanner, &[]).unwrap();
    let pan = panner.param("pan").unwrap();

    pan.set_value(&HostValue::from("-0.5")).unwrap();
    assert_eq!(pan.value().unwrap(), -0.5);

    let err = pan.set_value(&HostValue::from(f64::NAN)).unwrap_err();
    assert_eq!(
        err,
        BridgeError::Conversion(
            "Failed to set the 'value' property on 'AudioParam': The provided float value is non-finite.".into()
        )
    );
    assert_eq!(pan.min_value(), -1.0);
    assert_eq!(pan.max_value(), 1.0);
}

#[test]
fn descriptors_are_reachable_from_nodes() {
    let engine = recording();
    let ctx = realtime(&engine);
    let osc = ctx.create_node(NodeKind::Oscillator, &[]).unwrap();
    let descriptor = osc.type_descriptor();
    assert_eq!(descriptor.name, "OscillatorNode");
    assert_eq!(descriptor.length, 1);
    assert_eq!(descriptor.parent, Some("AudioScheduledSourceNode"));
    assert_eq!(
        audio_bridge_core::registry().method_arity(descriptor.name, "connect"),
        Some(1)
    );
}
