//! Smoke test for the process-wide free-function surface.
//!
//! Only this test touches the global context so the rest of the suite can
//! run on isolated [`mediaroute::Context`] instances in parallel.

use mediaroute::{FrameInit, GlobalParam, HeaderKind, DEFAULT_MAX_FRAMES};

use crate::common::init_logs;

#[test]
fn global_surface_smoke() {
    init_logs();
    assert_eq!(
        mediaroute::get_parameter(GlobalParam::MaxFramesInList),
        DEFAULT_MAX_FRAMES as i64
    );

    let frame = mediaroute::frame_create_ext(&FrameInit::audio(16));
    assert!(frame.is_valid());
    assert_eq!(mediaroute::frame_getsize(frame), 16);

    assert_eq!(mediaroute::set_frame_headers(frame, HeaderKind::Timestamp, 42), 0);
    assert_eq!(
        mediaroute::get_frame_headers(frame, HeaderKind::Timestamp),
        Some(42)
    );
    let written = mediaroute::with_frame_buffer(frame, |buffer| {
        buffer.fill(0x5A);
        buffer.len()
    });
    assert_eq!(written, Some(16));

    assert_eq!(mediaroute::frame_addref(frame), 2);
    assert_eq!(mediaroute::frame_release(frame), 1);
    assert_eq!(mediaroute::frame_release(frame), 0);

    let module = mediaroute::create_module(
        0,
        std::sync::Arc::new(|_| {}),
        "name=global,out_type=queue,out_queue=gsink",
        0,
    );
    assert!(module.is_valid());
    assert_eq!(mediaroute::get_output_count(module), 1);
    assert!(mediaroute::get_output_handle(module, 0).is_valid());
    assert_eq!(mediaroute::start_module(module), 0);
    assert_eq!(mediaroute::stop_module(module), 0);
    assert_eq!(mediaroute::close(module), 0);
}
