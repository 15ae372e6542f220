//! Control channel driven through a live module.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use parking_lot::Mutex;

use mediaroute::{Context, FrameInit, PinCommand};

use crate::common::{init_logs, recording_callback, ticks, wait_for};

/// Grabs an ephemeral port the OS considers free right now.
fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("probe ephemeral port");
    listener.local_addr().expect("probe local addr").port()
}

fn request(port: u16, line: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect control port");
    stream
        .write_all(format!("{line}\n").as_bytes())
        .expect("send command");
    let mut reader = BufReader::new(stream);
    let mut reply = String::new();
    reader.read_line(&mut reply).expect("read reply");
    reply.trim_end().to_owned()
}

#[test]
fn start_stop_status_over_the_wire() {
    init_logs();
    let port = free_port();
    let ctx = Arc::new(Context::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let module = ctx.create_module(
        port,
        recording_callback(&ctx, &seen),
        "name=ctl,in_type=queue,in_queue=ctl,out_type=queue,out_queue=ctl",
        0,
    );
    assert!(module.is_valid());

    // The accept task only runs on a started module.
    assert_eq!(ctx.start_module(module), 0);

    let status = request(port, "STATUS");
    let parsed: serde_json::Value = serde_json::from_str(&status).expect("status is JSON");
    assert_eq!(parsed["state"], "Started");
    assert_eq!(parsed["inputs"].as_array().map(Vec::len), Some(1));
    assert_eq!(parsed["outputs"].as_array().map(Vec::len), Some(1));

    assert_eq!(request(port, "STOP"), "OK");
    let status = request(port, "STATUS");
    let parsed: serde_json::Value = serde_json::from_str(&status).expect("status is JSON");
    assert_eq!(parsed["state"], "Stopped");

    assert_eq!(request(port, "START"), "OK");
    {
        let events = seen.lock();
        let starts = events
            .iter()
            .filter(|event| event.command == PinCommand::Start)
            .count();
        assert_eq!(starts, 2, "restart delivered a second start event");
    }

    // Data still flows after an out-of-band restart.
    let output = ctx.get_output_handle(module, 0);
    let frame = ctx.frame_create_ext(&FrameInit::audio(2));
    ctx.send(module, output, frame);
    ctx.frame_release(frame);
    wait_for("tick after control restart", || ticks(&seen) == 1);

    assert_eq!(ctx.close(module), 0);
}

#[test]
fn unknown_control_commands_are_answered_not_fatal() {
    init_logs();
    let port = free_port();
    let ctx = Arc::new(Context::new());
    let module = ctx.create_module(port, Arc::new(|_| {}), "name=vendor", 0);
    assert_eq!(ctx.start_module(module), 0);

    assert_eq!(request(port, "REWIND"), "ERR unknown command");
    // The channel survives the unknown command.
    let status = request(port, "STATUS");
    assert!(status.starts_with('{'), "status still served: {status}");

    assert_eq!(ctx.close(module), 0);
}

#[test]
fn status_reports_pin_metrics() {
    init_logs();
    let port = free_port();
    let ctx = Arc::new(Context::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let module = ctx.create_module(
        port,
        recording_callback(&ctx, &seen),
        "in_type=queue,in_queue=met,out_type=queue,out_queue=met",
        0,
    );
    assert_eq!(ctx.start_module(module), 0);

    let output = ctx.get_output_handle(module, 0);
    for _ in 0..3 {
        let frame = ctx.frame_create_ext(&FrameInit::audio(2));
        ctx.send(module, output, frame);
        ctx.frame_release(frame);
    }
    wait_for("three ticks", || ticks(&seen) == 3);
    // The transmit thread bumps its counter after handing the unit over;
    // wait on the snapshot before asserting the wire reply.
    wait_for("metrics settled", || {
        ctx.module_status(module).is_some_and(|status| {
            status.outputs[0].metrics.sent == 3 && status.inputs[0].metrics.delivered == 3
        })
    });

    let status = request(port, "STATUS");
    let parsed: serde_json::Value = serde_json::from_str(&status).expect("status is JSON");
    assert_eq!(parsed["outputs"][0]["metrics"]["sent"], 3);
    assert_eq!(parsed["inputs"][0]["metrics"]["delivered"], 3);

    assert_eq!(ctx.close(module), 0);
}
