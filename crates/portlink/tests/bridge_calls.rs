use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use portlink::{
    Bridge, BridgeError, CompletionSink, Direction, PortId, Request, Response, Side,
};

fn echo_handler(request: Request) -> Response {
    match request.method_text() {
        Some("echo") => Response::new(request.payload),
        Some("reverse") => {
            let mut bytes = request.payload.into_vec();
            bytes.reverse();
            Response::new(bytes)
        }
        _ => Response::empty(),
    }
}

fn poll_deadline(bridge: &Bridge, side: Side) -> Option<(PortId, Response)> {
    bridge.poll_completion(side, Duration::from_secs(5))
}

#[test]
fn sync_echo_round_trips_both_directions() {
    let bridge = Bridge::new();
    bridge.register_handler(Side::Native, Arc::new(echo_handler));
    bridge.register_handler(Side::Managed, Arc::new(echo_handler));

    let response = bridge.call_method(
        Direction::ManagedToNative,
        Request::new("echo", vec![9u8, 9]),
    );
    assert_eq!(response.payload.as_slice(), &[9, 9]);

    let response = bridge.call_method(
        Direction::NativeToManaged,
        Request::new("reverse", vec![1u8, 2, 3]),
    );
    assert_eq!(response.payload.as_slice(), &[3, 2, 1]);
}

#[test]
fn unbound_handler_yields_empty_response() {
    let bridge = Bridge::new();
    let response = bridge.call_method(
        Direction::ManagedToNative,
        Request::new("echo", vec![1u8]),
    );
    assert_eq!(response, Response::empty());
    assert_eq!(bridge.stats().unbound_dispatches, 1);
}

#[test]
fn unknown_method_reaches_handler_unfiltered() {
    let bridge = Bridge::new();
    bridge.register_handler(
        Side::Native,
        Arc::new(|request: Request| Response::new(request.method)),
    );

    // Empty method names are routed like any other.
    let response = bridge.call_method(Direction::ManagedToNative, Request::empty());
    assert!(response.payload.is_empty());

    let response = bridge.call_method(
        Direction::ManagedToNative,
        Request::new("no_such_method", Vec::new()),
    );
    assert_eq!(response.payload.as_slice(), b"no_such_method");
}

#[test]
fn async_call_completes_exactly_once() {
    let bridge = Bridge::new();
    bridge.register_handler(Side::Native, Arc::new(echo_handler));

    let port = bridge.next_port_id();
    bridge
        .call_method_async(
            Direction::ManagedToNative,
            port,
            Request::new("echo", vec![7u8, 8]),
        )
        .expect("dispatch");

    let (completed_port, response) =
        poll_deadline(&bridge, Side::Managed).expect("one completion");
    assert_eq!(completed_port, port);
    assert_eq!(response.payload.as_slice(), &[7, 8]);
    assert_eq!(bridge.pending_calls(Side::Managed), 0);

    // No second completion for the same port.
    assert!(bridge
        .poll_completion(Side::Managed, Duration::from_millis(100))
        .is_none());
    assert_eq!(bridge.stats().completed_calls, 1);
}

#[test]
fn async_completions_cover_all_ports() {
    let bridge = Bridge::new();
    bridge.register_handler(Side::Native, Arc::new(echo_handler));

    let mut expected: HashMap<PortId, Vec<u8>> = HashMap::new();
    for i in 0..32u8 {
        let port = bridge.next_port_id();
        let payload = vec![i, i.wrapping_mul(3)];
        expected.insert(port, payload.clone());
        bridge
            .call_method_async(
                Direction::ManagedToNative,
                port,
                Request::new("echo", payload),
            )
            .expect("dispatch");
    }

    // Completion order across ports is not guaranteed; only the pairing
    // is.
    for _ in 0..expected.len() {
        let (port, response) = poll_deadline(&bridge, Side::Managed).expect("completion");
        let payload = expected.remove(&port).expect("known port, seen once");
        assert_eq!(response.payload.into_vec(), payload);
    }
    assert!(expected.is_empty());
    assert_eq!(bridge.pending_calls(Side::Managed), 0);
}

#[test]
fn duplicate_port_is_rejected_before_dispatch() {
    let bridge = Bridge::new();
    bridge.register_handler(Side::Native, Arc::new(|_req: Request| {
        std::thread::sleep(Duration::from_millis(50));
        Response::empty()
    }));

    let port = bridge.next_port_id();
    bridge
        .call_method_async(Direction::ManagedToNative, port, Request::empty())
        .expect("first dispatch");
    assert_eq!(
        bridge.call_method_async(Direction::ManagedToNative, port, Request::empty()),
        Err(BridgeError::DuplicatePort(port))
    );

    poll_deadline(&bridge, Side::Managed).expect("first call still completes");
}

#[test]
fn stray_completion_is_surfaced_not_dropped() {
    let bridge = Bridge::new();
    bridge.register_handler(Side::Native, Arc::new(echo_handler));

    assert_eq!(
        bridge.complete_call(Direction::ManagedToNative, 12345, Response::empty()),
        Err(BridgeError::StrayCompletion(12345))
    );
    assert_eq!(bridge.stats().stray_completions, 1);

    // A violation must not poison the paths used by later calls.
    let port = bridge.next_port_id();
    bridge
        .call_method_async(
            Direction::ManagedToNative,
            port,
            Request::new("echo", vec![4u8]),
        )
        .expect("dispatch after violation");
    let (completed_port, response) =
        poll_deadline(&bridge, Side::Managed).expect("completion");
    assert_eq!(completed_port, port);
    assert_eq!(response.payload.as_slice(), &[4]);

    assert_eq!(
        bridge.complete_call(Direction::ManagedToNative, port, Response::empty()),
        Err(BridgeError::StrayCompletion(port))
    );
    assert_eq!(bridge.stats().stray_completions, 2);
    assert_eq!(bridge.stats().completed_calls, 1);
}

struct ChannelSink(mpsc::Sender<(PortId, Response)>);

impl CompletionSink for ChannelSink {
    fn complete(&self, port: PortId, response: Response) {
        let _ = self.0.send((port, response));
    }
}

#[test]
fn registered_sink_receives_completions_instead_of_queue() {
    let bridge = Bridge::new();
    bridge.register_handler(Side::Managed, Arc::new(echo_handler));

    let (tx, rx) = mpsc::channel();
    bridge.set_completion_sink(Side::Native, Arc::new(ChannelSink(tx)));

    let port = bridge.next_port_id();
    bridge
        .call_method_async(
            Direction::NativeToManaged,
            port,
            Request::new("echo", vec![0xABu8]),
        )
        .expect("dispatch");

    let (completed_port, response) = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("sink delivery");
    assert_eq!(completed_port, port);
    assert_eq!(response.payload.as_slice(), &[0xAB]);

    // Nothing leaked into the pull queue.
    assert!(bridge
        .poll_completion(Side::Native, Duration::from_millis(100))
        .is_none());
}

#[test]
fn out_of_band_completion_resolves_pending_call() {
    let bridge = Bridge::new();
    // Managed handler parks the call; runtime glue completes it later.
    let (started_tx, started_rx) = mpsc::channel();
    bridge.register_handler(
        Side::Managed,
        Arc::new(move |_req: Request| {
            let _ = started_tx.send(());
            Response::empty()
        }),
    );

    let port = bridge.next_port_id();
    bridge
        .call_method_async(Direction::NativeToManaged, port, Request::empty())
        .expect("dispatch");
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("handler ran");

    // The worker's own empty completion and the out-of-band one race;
    // exactly one wins, the other is a detected stray.
    let first = bridge.complete_call(Direction::NativeToManaged, port, Response::new("late"));
    let pumped = poll_deadline(&bridge, Side::Native).expect("one completion");
    assert_eq!(pumped.0, port);
    let second = bridge.complete_call(Direction::NativeToManaged, port, Response::new("later"));
    assert_eq!(second, Err(BridgeError::StrayCompletion(port)));
    let _ = first;
    assert_eq!(bridge.stats().completed_calls, 1);
}
