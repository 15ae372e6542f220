//! Shared fixtures for the end-to-end suite.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use mediaroute::{Context, FrameCallback, PinCommand, PinEvent};

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Event record kept by the recording callback.
#[derive(Clone, Debug)]
pub struct SeenEvent {
    pub command: PinCommand,
    pub pin_raw: i32,
    pub frame_valid: bool,
    pub payload: Vec<u8>,
}

/// Callback that records every event, copying tick payloads out while the
/// pin's reference still covers the frame.
pub fn recording_callback(
    ctx: &Arc<Context>,
    seen: &Arc<Mutex<Vec<SeenEvent>>>,
) -> FrameCallback {
    let ctx = Arc::clone(ctx);
    let seen = Arc::clone(seen);
    Arc::new(move |event: PinEvent| {
        let payload = if event.command == PinCommand::Tick {
            ctx.with_frame_buffer(event.frame, |buffer| buffer.to_vec())
                .expect("tick frames are live during the callback")
        } else {
            Vec::new()
        };
        seen.lock().push(SeenEvent {
            command: event.command,
            pin_raw: event.pin.raw(),
            frame_valid: event.frame.is_valid(),
            payload,
        });
    })
}

pub fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::yield_now();
    }
}

/// Count of tick events recorded so far.
pub fn ticks(seen: &Mutex<Vec<SeenEvent>>) -> usize {
    seen.lock()
        .iter()
        .filter(|event| event.command == PinCommand::Tick)
        .count()
}
