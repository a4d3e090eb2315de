//! Shared, version-pinned bridge protocol identifiers.
//!
//! These constants are the single source of truth for the ABI revision
//! strings and protocol-wide numeric ranges that generated bindings embed.
//! The three ABI revisions are successive and not wire compatible; a
//! binding generated against one revision must assert that exact string.

/// First revision: method and data passed as bare pointer/length pairs
/// folded directly into the call struct.
pub const BRIDGE_ABI_FLAT_V1: &str = "portlink.flat-packet@1";

/// Second revision: unified packet carrying a correlation id plus method
/// and data buffers, with a pull-style completion loop.
pub const BRIDGE_ABI_PACKET_V2: &str = "portlink.packet@2";

/// Third revision: split request/response envelopes with the port id
/// passed out of band and push-style completion delivery.
pub const BRIDGE_ABI_REQUEST_V3: &str = "portlink.request@3";

pub const BRIDGE_ABI_CURRENT: &str = BRIDGE_ABI_PACKET_V2;

/// Inclusive range of issuable port ids. Values below `MIN_PORT_ID` are
/// reserved for runtime-internal control ports.
pub const MIN_PORT_ID: i64 = 0xFF;
pub const MAX_PORT_ID: i64 = 0xFFFF_FFFF_FFFF;

/// Environment variable read by the binding generator to pick the token
/// appended to every exported symbol when several statically linked
/// bridge instances must coexist in one binary.
pub const SYMBOL_SUFFIX_ENV: &str = "PORTLINK_SYMBOL_SUFFIX";

pub const LOOPBACK_REPORT_SCHEMA_VERSION: &str = "portlink-loopback.report@0.1.0";
