//! In-process method-invocation bridge between a managed runtime and
//! native code linked into the same binary.
//!
//! A [`Bridge`] joins two sides, each with a single registered
//! [`MethodHandler`]. Callers on either side invoke named methods on the
//! other synchronously ([`Bridge::call_method`]) or asynchronously
//! ([`Bridge::call_method_async`]), with async completions correlated by
//! [`PortId`] and delivered through the initiating side's pull queue or
//! its registered [`CompletionSink`]. Payloads cross the boundary as
//! owned [`Payload`] buffers; nothing is shared and nothing is freed
//! twice.
//!
//! The protocol layer never propagates errors across the boundary: every
//! call path yields a structurally valid envelope, empty on failure, and
//! error semantics live in the payload contract between the two
//! application handlers.

pub mod engine;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod payload;
pub mod ports;

pub use engine::{Bridge, BridgeStats, CompletionSink, Direction, Side};
pub use envelope::{Packet, Request, Response};
pub use error::BridgeError;
pub use handler::MethodHandler;
pub use payload::Payload;
pub use ports::{PortCounter, PortId};
