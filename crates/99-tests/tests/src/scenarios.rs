//! End-to-end scenarios driven through the public handle surface.

use std::sync::Arc;

use parking_lot::Mutex;

use mediaroute::{
    Context, FrameHandle, FrameInit, GlobalParam, PinCommand, SamplingFormat,
};

use crate::common::{init_logs, recording_callback, ticks, wait_for};

#[test]
fn pool_exhaustion_and_slot_reuse() {
    init_logs();
    let ctx = Context::with_pool_cap(3);

    let h0 = ctx.frame_create();
    let h1 = ctx.frame_create();
    let h2 = ctx.frame_create();
    assert!(h0.is_valid() && h1.is_valid() && h2.is_valid());
    assert!(h0 < h1 && h1 < h2, "handles grow monotonically");

    assert_eq!(
        ctx.frame_create(),
        FrameHandle::INVALID,
        "fourth acquire fails at cap 3"
    );

    assert_eq!(ctx.frame_release(h1), 0);
    let h3 = ctx.frame_create();
    assert!(h3.is_valid());
    assert!(h3 > h2, "reused slot gets a fresh handle");
    assert_eq!(
        ctx.get_parameter(GlobalParam::CurFramesInList),
        3,
        "slot list stays at three"
    );

    for handle in [h0, h2, h3] {
        assert_eq!(ctx.frame_release(handle), 0);
    }
}

#[test]
fn video_sizing_derives_from_geometry() {
    init_logs();
    let ctx = Context::new();
    let frame = ctx.frame_create_ext(&FrameInit::video(1920, 1080, 8, SamplingFormat::YCbCr422));
    assert!(frame.is_valid());
    assert_eq!(ctx.frame_getsize(frame), 4_147_200);
    ctx.frame_release(frame);
}

#[test]
fn audio_without_size_is_rejected() {
    init_logs();
    let ctx = Context::new();
    assert_eq!(
        ctx.frame_create_ext(&FrameInit::audio(0)),
        FrameHandle::INVALID
    );
    assert_eq!(ctx.get_parameter(GlobalParam::CurFramesInList), 0);
}

#[test]
fn config_string_splits_into_groups() {
    let groups = module_hub::split_pin_groups(
        "type=A,x=1,in_type=udp,p=5,out_type=tcp,q=6,out_type=tcp,r=7",
    );
    assert_eq!(groups.module, "type=A,x=1");
    assert_eq!(groups.inputs.as_slice(), ["in_type=udp,p=5"]);
    assert_eq!(
        groups.outputs.as_slice(),
        ["out_type=tcp,q=6", "out_type=tcp,r=7"]
    );
}

#[test]
fn config_string_declares_pins_in_order() {
    init_logs();
    let ctx = Arc::new(Context::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let module = ctx.create_module(
        0,
        recording_callback(&ctx, &seen),
        "type=A,x=1,in_type=queue,in_queue=cfg_in,out_type=queue,out_queue=cfg_a,out_type=queue,out_queue=cfg_b",
        0,
    );
    assert!(module.is_valid());
    assert_eq!(ctx.get_input_count(module), 1);
    assert_eq!(ctx.get_output_count(module), 2);

    let input = ctx.get_input_handle(module, 0);
    let out_a = ctx.get_output_handle(module, 0);
    let out_b = ctx.get_output_handle(module, 1);
    assert!(input.is_valid() && out_a.is_valid() && out_b.is_valid());
    assert!(input.raw() < out_a.raw() && out_a.raw() < out_b.raw());

    assert_eq!(ctx.close(module), 0);
}

#[test]
fn loopback_module_delivers_in_send_order() {
    init_logs();
    let ctx = Arc::new(Context::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let module = ctx.create_module(
        0,
        recording_callback(&ctx, &seen),
        "in_type=queue,in_queue=fifo,out_type=queue,out_queue=fifo",
        0,
    );
    assert!(module.is_valid());
    assert_eq!(ctx.start_module(module), 0);
    let output = ctx.get_output_handle(module, 0);

    for fill in [0xA_u8, 0xB] {
        let frame = ctx.frame_create_ext(&FrameInit::audio(4));
        assert!(frame.is_valid());
        ctx.with_frame_buffer(frame, |buffer| buffer.fill(fill))
            .expect("fill payload");
        assert_eq!(ctx.send(module, output, frame), 0);
        ctx.frame_release(frame);
    }

    wait_for("both frames delivered", || ticks(&seen) == 2);
    assert_eq!(ctx.stop_module(module), 0);

    let events = seen.lock();
    let payloads: Vec<u8> = events
        .iter()
        .filter(|event| event.command == PinCommand::Tick)
        .map(|event| event.payload[0])
        .collect();
    assert_eq!(payloads, vec![0xA, 0xB], "a transmits before b");
    drop(events);
    assert_eq!(ctx.close(module), 0);
}

#[test]
fn send_holds_a_reference_until_transmitted() {
    init_logs();
    let ctx = Arc::new(Context::new());
    let module = ctx.create_module(
        0,
        Arc::new(|_| {}),
        "out_type=queue,out_queue=ref_sink",
        0,
    );
    assert!(module.is_valid());
    assert_eq!(ctx.start_module(module), 0);
    let output = ctx.get_output_handle(module, 0);

    let frame = ctx.frame_create_ext(&FrameInit::audio(8));
    assert!(frame.is_valid());
    assert_eq!(ctx.send(module, output, frame), 0);

    // Caller's reference goes away; the queued send ref keeps the frame
    // alive until the transmit thread releases it.
    assert!(ctx.frame_release(frame) >= 0);
    wait_for("send ref released", || ctx.pool().live_count() == 0);

    assert_eq!(
        ctx.get_parameter(GlobalParam::CurFramesInList),
        1,
        "one slot retained in the list, free"
    );
    assert_eq!(ctx.close(module), 0);
}

#[test]
fn send_quirks_match_the_documented_surface() {
    init_logs();
    let ctx = Arc::new(Context::new());
    let module = ctx.create_module(
        0,
        Arc::new(|_| {}),
        "out_type=queue,out_queue=quirk_sink",
        0,
    );
    assert_eq!(ctx.start_module(module), 0);
    let output = ctx.get_output_handle(module, 0);

    let unknown_pin = mediaroute::PinHandle::from_raw(99);
    let frame = ctx.frame_create_ext(&FrameInit::audio(4));
    assert_eq!(
        ctx.send(module, unknown_pin, frame),
        0,
        "unknown output pin is a success no-op"
    );
    assert_eq!(ctx.frame_release(frame), 0, "no ref was taken by the no-op");

    let unknown_frame = FrameHandle::from_raw(12_345);
    assert_eq!(
        ctx.send(module, output, unknown_frame),
        -1,
        "unknown frame handle is a failure"
    );
    assert_eq!(ctx.close(module), 0);
}

#[test]
fn lifecycle_events_bracket_the_data_path() {
    init_logs();
    let ctx = Arc::new(Context::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let module = ctx.create_module(
        0,
        recording_callback(&ctx, &seen),
        "in_type=queue,in_queue=life,out_type=queue,out_queue=life",
        7,
    );
    assert_eq!(ctx.start_module(module), 0);
    {
        let events = seen.lock();
        assert_eq!(events.len(), 1, "start delivered synchronously");
        assert_eq!(events[0].command, PinCommand::Start);
        assert_eq!(events[0].pin_raw, -1, "module-level event has no pin");
        assert!(!events[0].frame_valid);
    }

    let output = ctx.get_output_handle(module, 0);
    let frame = ctx.frame_create_ext(&FrameInit::audio(2));
    ctx.send(module, output, frame);
    ctx.frame_release(frame);
    wait_for("tick delivered", || ticks(&seen) == 1);

    assert_eq!(ctx.stop_module(module), 0);
    assert_eq!(ctx.stop_module(module), 0, "stop is idempotent");
    {
        let events = seen.lock();
        let last = events.last().expect("events recorded");
        assert_eq!(last.command, PinCommand::Stop);
    }
    assert_eq!(ctx.close(module), 0);
    assert_eq!(ctx.close(module), -1, "close is terminal");
}

#[test]
fn stopped_module_can_restart() {
    init_logs();
    let ctx = Arc::new(Context::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let module = ctx.create_module(
        0,
        recording_callback(&ctx, &seen),
        "in_type=queue,in_queue=restart,out_type=queue,out_queue=restart",
        0,
    );
    assert_eq!(ctx.start_module(module), 0);
    assert_eq!(ctx.stop_module(module), 0);
    assert_eq!(ctx.start_module(module), 0);

    let output = ctx.get_output_handle(module, 0);
    let frame = ctx.frame_create_ext(&FrameInit::audio(2));
    ctx.send(module, output, frame);
    ctx.frame_release(frame);
    wait_for("tick after restart", || ticks(&seen) == 1);

    assert_eq!(ctx.close(module), 0);
}
