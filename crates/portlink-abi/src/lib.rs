#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

//! C ABI surface of the bridge, unified-packet revision
//! (`portlink_contracts::BRIDGE_ABI_PACKET_V2`).
//!
//! The exported names below are the canonical, unsuffixed symbols. When
//! several statically linked bridge instances must coexist in one
//! binary, the binding generator appends a build-time-unique token (see
//! `portlink_contracts::SYMBOL_SUFFIX_ENV`) to every exported name and
//! builds one copy of this crate per instance; isolation itself comes
//! from each copy owning its own [`Bridge`].
//!
//! Buffer ownership convention: every `pl_bytes` handed across this
//! boundary was allocated with [`pl_bytes_alloc`] and is owned by the
//! receiver, which must release it with [`pl_bytes_free`] exactly once.
//! The empty value carries a null pointer and zero length; it is never
//! dereferenced and is safe to pass to `pl_bytes_free`.

use std::panic::catch_unwind;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use portlink::{
    Bridge, Direction, MethodHandler, Payload, PortId, Request, Response, Side,
};

#[repr(C)]
#[derive(Copy, Clone)]
pub struct pl_bytes {
    pub ptr: *mut u8,
    pub len: i32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct pl_packet {
    pub id: i64,
    pub method: pl_bytes,
    pub data: pl_bytes,
}

/// Handler function pointer registered by the managed runtime. Receives
/// an owned packet and writes an owned response packet through the out
/// pointer; both follow the crate-level buffer ownership convention.
pub type pl_method_handle = extern "C" fn(pl_packet, *mut pl_packet);

const DIRECTION_TO_NATIVE: i32 = 0;
const DIRECTION_TO_MANAGED: i32 = 1;

static BRIDGE: OnceCell<Bridge> = OnceCell::new();

/// The bridge instance owned by this linked copy of the crate.
pub fn bridge() -> &'static Bridge {
    BRIDGE.get_or_init(Bridge::new)
}

fn direction_from_raw(raw: i32) -> Option<Direction> {
    match raw {
        DIRECTION_TO_NATIVE => Some(Direction::ManagedToNative),
        DIRECTION_TO_MANAGED => Some(Direction::NativeToManaged),
        _ => None,
    }
}

#[no_mangle]
pub extern "C" fn pl_empty_data() -> pl_bytes {
    pl_bytes {
        ptr: std::ptr::null_mut(),
        len: 0,
    }
}

#[no_mangle]
pub extern "C" fn pl_empty_packet() -> pl_packet {
    pl_packet {
        id: 0,
        method: pl_empty_data(),
        data: pl_empty_data(),
    }
}

#[no_mangle]
pub extern "C" fn pl_bytes_alloc(len: i32) -> pl_bytes {
    if len <= 0 {
        return pl_empty_data();
    }
    let ptr = unsafe { libc::malloc(len as usize) } as *mut u8;
    if ptr.is_null() {
        return pl_empty_data();
    }
    pl_bytes { ptr, len }
}

#[no_mangle]
pub extern "C" fn pl_bytes_free(bytes: pl_bytes) {
    if !bytes.ptr.is_null() {
        unsafe { libc::free(bytes.ptr as *mut libc::c_void) };
    }
}

/// Copies without releasing; callers that own the bytes pair this with
/// `pl_bytes_free`.
unsafe fn bytes_to_vec(bytes: pl_bytes) -> Vec<u8> {
    if bytes.ptr.is_null() || bytes.len <= 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(bytes.ptr, bytes.len as usize).to_vec()
}

/// Takes ownership: copies into a payload, then releases the storage.
unsafe fn take_bytes(bytes: pl_bytes) -> Payload {
    let copied = bytes_to_vec(bytes);
    pl_bytes_free(bytes);
    Payload::from_vec(copied)
}

fn vec_into_bytes(bytes: Vec<u8>) -> pl_bytes {
    if bytes.is_empty() {
        return pl_empty_data();
    }
    if bytes.len() > i32::MAX as usize {
        eprintln!("portlink-abi: payload exceeds pl_bytes length range, dropped");
        return pl_empty_data();
    }
    let out = pl_bytes_alloc(bytes.len() as i32);
    if out.ptr.is_null() {
        return pl_empty_data();
    }
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), out.ptr, bytes.len()) };
    out
}

/// Takes ownership of both inbound buffers.
unsafe fn packet_into_parts(packet: pl_packet) -> (PortId, Request) {
    let method = take_bytes(packet.method);
    let payload = take_bytes(packet.data);
    (
        packet.id,
        Request {
            method,
            payload,
        },
    )
}

fn packet_from_request(id: PortId, request: Request) -> pl_packet {
    pl_packet {
        id,
        method: vec_into_bytes(request.method.into_vec()),
        data: vec_into_bytes(request.payload.into_vec()),
    }
}

/// Responses carry no method name, so the method field is the empty
/// value.
fn packet_from_response(id: PortId, response: Response) -> pl_packet {
    pl_packet {
        id,
        method: pl_empty_data(),
        data: vec_into_bytes(response.payload.into_vec()),
    }
}

#[cfg(test)]
unsafe fn drop_packet(packet: pl_packet) {
    pl_bytes_free(packet.method);
    pl_bytes_free(packet.data);
}

/// Adapts the managed runtime's registered function pointer to the
/// bridge's handler seam.
struct ForeignHandler(pl_method_handle);

impl MethodHandler for ForeignHandler {
    fn handle(&self, request: Request) -> Response {
        // Sync dispatch carries no port; the id field is zero here.
        let packet = packet_from_request(0, request);
        let mut out = pl_empty_packet();
        (self.0)(packet, &mut out);
        let payload = unsafe { take_bytes(out.data) };
        pl_bytes_free(out.method);
        Response { payload }
    }
}

#[no_mangle]
pub extern "C" fn pl_next_port_id() -> i64 {
    bridge().next_port_id()
}

/// Registers the managed-side method handle. Calling again replaces the
/// previous handle.
#[no_mangle]
pub extern "C" fn pl_init_method_handle(handle: pl_method_handle) {
    let _ = catch_unwind(|| {
        bridge().register_handler(Side::Managed, Arc::new(ForeignHandler(handle)));
    });
}

/// Synchronous entry point. Blocks until the target side's handler
/// returns; always yields a well-formed packet, empty on any failure.
#[no_mangle]
pub extern "C" fn pl_call_method(direction: i32, packet: pl_packet) -> pl_packet {
    catch_unwind(|| {
        let (id, request) = unsafe { packet_into_parts(packet) };
        let Some(direction) = direction_from_raw(direction) else {
            eprintln!("portlink-abi: unknown call direction {direction}");
            return pl_empty_packet();
        };
        let response = bridge().call_method(direction, request);
        packet_from_response(id, response)
    })
    .unwrap_or_else(|_| pl_empty_packet())
}

/// Asynchronous entry point; the packet's id field is the port obtained
/// from `pl_next_port_id`. Returns immediately; the completion arrives
/// through `pl_packet_loop` on the initiating side.
#[no_mangle]
pub extern "C" fn pl_call_method_async(direction: i32, packet: pl_packet) {
    let _ = catch_unwind(|| {
        let (port, request) = unsafe { packet_into_parts(packet) };
        let Some(direction) = direction_from_raw(direction) else {
            eprintln!("portlink-abi: unknown call direction {direction}");
            return;
        };
        if let Err(err) = bridge().call_method_async(direction, port, request) {
            eprintln!("portlink-abi: {err}");
        }
    });
}

/// Managed-side completion pump: blocks up to one second for the next
/// completion of a managed-initiated async call. Returns the empty
/// packet on timeout. Native-side code links the `portlink` crate
/// directly and pumps through `Bridge::poll_completion`.
#[no_mangle]
pub extern "C" fn pl_packet_loop() -> pl_packet {
    catch_unwind(|| {
        match bridge().poll_completion(Side::Managed, Duration::from_secs(1)) {
            Some((port, response)) => packet_from_response(port, response),
            None => pl_empty_packet(),
        }
    })
    .unwrap_or_else(|_| pl_empty_packet())
}

/// ABI revision this surface implements, as an owned buffer the caller
/// frees. Generated bindings assert it against the revision they were
/// built for.
#[no_mangle]
pub extern "C" fn pl_abi_revision() -> pl_bytes {
    vec_into_bytes(portlink_contracts::BRIDGE_ABI_CURRENT.as_bytes().to_vec())
}

/// Liveness probe: present and callable, nothing more. The build step
/// invokes it to verify the native library was actually linked.
#[no_mangle]
pub extern "C" fn pl_enforce_binding() {
    let mut probe = 0usize;
    probe ^= pl_empty_data as usize;
    probe ^= pl_empty_packet as usize;
    probe ^= pl_bytes_alloc as usize;
    probe ^= pl_bytes_free as usize;
    probe ^= pl_next_port_id as usize;
    probe ^= pl_init_method_handle as usize;
    probe ^= pl_call_method as usize;
    probe ^= pl_call_method_async as usize;
    probe ^= pl_packet_loop as usize;
    probe ^= pl_abi_revision as usize;
    std::hint::black_box(probe);
}
