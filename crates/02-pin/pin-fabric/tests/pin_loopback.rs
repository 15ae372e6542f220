//! Pin pair over the in-process queue transport.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use frame_pool::{FrameInit, FramePool, HeaderKind};
use pin_fabric::{
    FrameCallback, InputContext, InputPin, ModuleHandle, OutputPin, PinCommand, PinEvent,
    PinHandle, SendOutcome, TransportRegistry, QUEUE_KIND,
};

const MODULE: ModuleHandle = ModuleHandle::INVALID;

struct Rig {
    pool: Arc<FramePool>,
    input: InputPin,
    output: OutputPin,
    seen: Arc<Mutex<Vec<(PinEvent, Vec<u8>)>>>,
}

fn rig(queue: &str) -> Rig {
    let _ = env_logger::builder().is_test(true).try_init();
    let pool = Arc::new(FramePool::new());
    let registry = TransportRegistry::with_builtin();

    let in_cfg = pin_fabric::KvConfig::parse(&format!("in_type=queue,in_queue={queue}"));
    let out_cfg = pin_fabric::KvConfig::parse(&format!("out_type=queue,out_queue={queue}"));
    let (in_transport, _) = registry.open_input(QUEUE_KIND, &in_cfg).expect("input end");
    let (out_transport, descriptor) = registry
        .open_output(QUEUE_KIND, &out_cfg)
        .expect("output end");

    let input = InputPin::new(PinHandle::from_raw(0), QUEUE_KIND.into(), in_cfg, in_transport);
    let output = OutputPin::new(
        PinHandle::from_raw(1),
        QUEUE_KIND.into(),
        out_cfg,
        out_transport,
        descriptor,
        Arc::clone(&pool),
    );

    Rig {
        pool,
        input,
        output,
        seen: Arc::new(Mutex::new(Vec::new())),
    }
}

fn recording_callback(
    pool: &Arc<FramePool>,
    seen: &Arc<Mutex<Vec<(PinEvent, Vec<u8>)>>>,
) -> FrameCallback {
    let pool = Arc::clone(pool);
    let seen = Arc::clone(seen);
    Arc::new(move |event: PinEvent| {
        let payload = if event.command == PinCommand::Tick {
            pool.with_frame(event.frame, |frame| frame.buffer().to_vec())
                .expect("tick frames are live during the callback")
        } else {
            Vec::new()
        };
        seen.lock().push((event, payload));
    })
}

fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::yield_now();
    }
}

fn audio_frame(pool: &FramePool, fill: u8, size: u64) -> frame_pool::FrameHandle {
    let handle = pool
        .acquire_with_init(&FrameInit::audio(size))
        .expect("audio frame");
    pool.with_frame(handle, |frame| frame.buffer_mut().fill(fill))
        .expect("fill payload");
    handle
}

#[test]
fn frames_cross_the_loopback_in_send_order() {
    let mut rig = rig("order");
    let callback = recording_callback(&rig.pool, &rig.seen);
    rig.output.start().expect("start output");
    rig.input
        .start(InputContext {
            pool: Arc::clone(&rig.pool),
            module: MODULE,
            user_data: 7,
            callback,
        })
        .expect("start input");

    for fill in 0..8u8 {
        let handle = audio_frame(&rig.pool, fill, 4);
        assert_eq!(rig.output.send(handle).expect("send"), SendOutcome::Accepted);
        rig.pool.release(handle);
    }

    wait_for("all frames delivered", || rig.seen.lock().len() == 8);
    rig.input.stop();
    rig.output.stop();

    let seen = rig.seen.lock();
    for (fill, (event, payload)) in seen.iter().enumerate() {
        assert_eq!(event.command, PinCommand::Tick);
        assert_eq!(event.user_data, 7);
        assert_eq!(payload, &vec![fill as u8; 4], "delivery order matches send order");
    }
}

#[test]
fn send_ref_keeps_frame_live_until_transmitted() {
    let mut rig = rig("lifecycle");
    let callback = recording_callback(&rig.pool, &rig.seen);
    rig.output.start().expect("start output");

    let handle = audio_frame(&rig.pool, 0xAB, 16);
    rig.output.send(handle).expect("send holds a ref");
    // Caller drops its ref; the frame must survive until the transmit
    // thread releases the send ref.
    rig.pool.release(handle);

    wait_for("send ref released", || rig.pool.live_count() == 0);
    assert_eq!(rig.pool.slot_count(), 1, "slot retained, marked free");

    rig.input
        .start(InputContext {
            pool: Arc::clone(&rig.pool),
            module: MODULE,
            user_data: 0,
            callback,
        })
        .expect("start input");
    wait_for("frame delivered", || !rig.seen.lock().is_empty());
    rig.input.stop();
    rig.output.stop();

    let seen = rig.seen.lock();
    assert_eq!(seen[0].1, vec![0xAB; 16]);
    assert_eq!(rig.pool.live_count(), 0, "input ref released after callback");
}

#[test]
fn stop_flushes_queued_frames() {
    let mut rig = rig("flush");
    rig.output.start().expect("start output");

    for fill in 0..4u8 {
        let handle = audio_frame(&rig.pool, fill, 2);
        rig.output.send(handle).expect("send");
        rig.pool.release(handle);
    }
    rig.output.stop();
    assert_eq!(rig.output.metrics().sent, 4, "stop drains the queue first");
    assert_eq!(rig.pool.live_count(), 0, "all send refs released");

    // The flushed frames are still waiting on the loopback channel.
    let callback = recording_callback(&rig.pool, &rig.seen);
    rig.input
        .start(InputContext {
            pool: Arc::clone(&rig.pool),
            module: MODULE,
            user_data: 0,
            callback,
        })
        .expect("start input");
    wait_for("flushed frames delivered", || rig.seen.lock().len() == 4);
    rig.input.stop();
}

#[test]
fn send_rejects_unknown_frames() {
    let mut rig = rig("unknown");
    rig.output.start().expect("start output");
    let bogus = frame_pool::FrameHandle::from_raw(404);
    assert!(rig.output.send(bogus).is_err());
    rig.output.stop();
}

#[test]
fn callback_addref_extends_frame_lifetime() {
    let mut rig = rig("retain");
    let pool = Arc::clone(&rig.pool);
    let retained: Arc<Mutex<Vec<frame_pool::FrameHandle>>> = Arc::new(Mutex::new(Vec::new()));
    let retained_cb = Arc::clone(&retained);
    let pool_cb = Arc::clone(&rig.pool);
    let callback: FrameCallback = Arc::new(move |event: PinEvent| {
        if event.command == PinCommand::Tick {
            pool_cb.addref(event.frame);
            retained_cb.lock().push(event.frame);
        }
    });

    rig.output.start().expect("start output");
    rig.input
        .start(InputContext {
            pool: Arc::clone(&rig.pool),
            module: MODULE,
            user_data: 0,
            callback,
        })
        .expect("start input");

    let handle = audio_frame(&rig.pool, 1, 8);
    rig.output.send(handle).expect("send");
    rig.pool.release(handle);

    wait_for("callback retained the frame", || !retained.lock().is_empty());
    rig.input.stop();
    rig.output.stop();

    let kept = retained.lock()[0];
    assert_eq!(
        pool.with_frame(kept, |frame| frame.media_size()),
        Some(8),
        "retained handle stays live past the callback"
    );
    assert_eq!(pool.release(kept), 0);
}

#[test]
fn header_values_ride_the_wire() {
    let mut rig = rig("headers");
    let observed = Arc::new(Mutex::new(None));
    let pool = Arc::clone(&rig.pool);
    let observed_cb = Arc::clone(&observed);
    let callback: FrameCallback = Arc::new(move |event: PinEvent| {
        if event.command == PinCommand::Tick {
            let pts = pool.header(event.frame, HeaderKind::Timestamp);
            let ext = pool.header(event.frame, HeaderKind::Other(9));
            *observed_cb.lock() = Some((pts, ext));
        }
    });

    rig.output.start().expect("start output");
    rig.input
        .start(InputContext {
            pool: Arc::clone(&rig.pool),
            module: MODULE,
            user_data: 0,
            callback,
        })
        .expect("start input");

    let handle = audio_frame(&rig.pool, 0, 4);
    rig.pool
        .set_header(handle, HeaderKind::Timestamp, 1234)
        .expect("set pts");
    rig.pool
        .set_header(handle, HeaderKind::Other(9), 55)
        .expect("set ext tag");
    rig.output.send(handle).expect("send");
    rig.pool.release(handle);

    wait_for("headers observed", || observed.lock().is_some());
    rig.input.stop();
    rig.output.stop();
    assert_eq!(*observed.lock(), Some((Some(1234), Some(55))));
}
