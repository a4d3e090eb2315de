use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use portlink::{Bridge, Direction, PortId, Request, Response, Side};
use portlink_contracts::LOOPBACK_REPORT_SCHEMA_VERSION;

/// Drives all four call shapes of one in-process bridge instance and
/// prints a JSON report.
#[derive(Parser, Debug)]
#[command(name = "portlink-loopback")]
struct Args {
    /// Calls to issue per direction and mode.
    #[arg(long, default_value_t = 64)]
    calls: u32,

    /// Payload size in bytes for generated requests.
    #[arg(long, default_value_t = 32)]
    payload_bytes: u32,

    /// Seconds to wait for each async completion.
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,
}

#[derive(Serialize)]
struct Report {
    schema_version: &'static str,
    ok: bool,
    sync_managed_to_native: u32,
    sync_native_to_managed: u32,
    async_managed_to_native: u32,
    async_native_to_managed: u32,
    completed_calls: u64,
    stray_completions: u64,
    unbound_dispatches: u64,
}

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

fn make_payload(seed: u32, len: u32) -> Vec<u8> {
    (0..len)
        .map(|i| (seed.wrapping_add(i).wrapping_mul(31) & 0xFF) as u8)
        .collect()
}

fn run_sync(bridge: &Bridge, direction: Direction, args: &Args) -> Result<u32> {
    let mut ok = 0u32;
    for seed in 0..args.calls {
        let payload = make_payload(seed, args.payload_bytes);
        let response = bridge.call_method(direction, Request::new("echo", payload.clone()));
        if response.payload.as_slice() != payload.as_slice() {
            bail!("sync echo mismatch in {direction:?} at call {seed}");
        }
        ok += 1;
    }
    Ok(ok)
}

fn run_async(bridge: &Bridge, direction: Direction, args: &Args) -> Result<u32> {
    let mut expected: HashMap<PortId, Vec<u8>> = HashMap::new();
    for seed in 0..args.calls {
        let port = bridge.next_port_id();
        let payload = make_payload(seed, args.payload_bytes);
        let mut reversed = payload.clone();
        reversed.reverse();
        expected.insert(port, reversed);
        bridge
            .call_method_async(direction, port, Request::new("reverse", payload))
            .with_context(|| format!("async dispatch in {direction:?} at call {seed}"))?;
    }

    let side = direction.initiator();
    let timeout = Duration::from_secs(args.timeout_secs);
    let mut ok = 0u32;
    for _ in 0..args.calls {
        let Some((port, response)) = bridge.poll_completion(side, timeout) else {
            bail!(
                "timed out waiting for completion in {direction:?}, {} still pending",
                bridge.pending_calls(side)
            );
        };
        let Some(payload) = expected.remove(&port) else {
            bail!("completion for unexpected or repeated port {port} in {direction:?}");
        };
        if response.payload.as_slice() != payload.as_slice() {
            bail!("async reverse mismatch for port {port} in {direction:?}");
        }
        ok += 1;
    }

    if !expected.is_empty() {
        bail!("{} async calls never completed in {direction:?}", expected.len());
    }
    Ok(ok)
}

fn run(args: &Args) -> Result<Report> {
    let bridge = Bridge::new();
    bridge.register_handler(Side::Native, Arc::new(echo_handler));
    bridge.register_handler(Side::Managed, Arc::new(echo_handler));

    let sync_managed_to_native = run_sync(&bridge, Direction::ManagedToNative, args)?;
    let sync_native_to_managed = run_sync(&bridge, Direction::NativeToManaged, args)?;
    let async_managed_to_native = run_async(&bridge, Direction::ManagedToNative, args)?;
    let async_native_to_managed = run_async(&bridge, Direction::NativeToManaged, args)?;

    let stats = bridge.stats();
    if stats.stray_completions != 0 {
        bail!("{} stray completions observed", stats.stray_completions);
    }
    if stats.unbound_dispatches != 0 {
        bail!("{} dispatches hit an unbound handler", stats.unbound_dispatches);
    }

    Ok(Report {
        schema_version: LOOPBACK_REPORT_SCHEMA_VERSION,
        ok: true,
        sync_managed_to_native,
        sync_native_to_managed,
        async_managed_to_native,
        async_native_to_managed,
        completed_calls: stats.completed_calls,
        stray_completions: stats.stray_completions,
        unbound_dispatches: stats.unbound_dispatches,
    })
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(text) => println!("{text}"),
                Err(err) => {
                    eprintln!("portlink-loopback: report serialization failed: {err}");
                    std::process::exit(1);
                }
            }
        }
        Err(err) => {
            eprintln!("portlink-loopback: {err:#}");
            std::process::exit(1);
        }
    }
}
