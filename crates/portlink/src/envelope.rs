use crate::payload::Payload;
use crate::ports::PortId;

/// A method invocation crossing the bridge: which handler-visible method
/// to run, and its argument bytes.
///
/// The method name is an uninterpreted buffer; the protocol layer never
/// validates it. An unknown or empty name is dispatched like any other
/// and left to the registered handler to reject.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Request {
    pub method: Payload,
    pub payload: Payload,
}

impl Request {
    /// Canonical empty request, safe to return on any failure path.
    pub const fn empty() -> Self {
        Request {
            method: Payload::empty(),
            payload: Payload::empty(),
        }
    }

    pub fn new(method: impl Into<Payload>, payload: impl Into<Payload>) -> Self {
        Request {
            method: method.into(),
            payload: payload.into(),
        }
    }

    /// Method name as text, when it happens to be valid UTF-8.
    pub fn method_text(&self) -> Option<&str> {
        std::str::from_utf8(self.method.as_slice()).ok()
    }
}

/// The reply to one call. Carries no method name and no success marker;
/// whether the payload encodes an error is a contract between the two
/// application-level handlers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    pub payload: Payload,
}

impl Response {
    pub const fn empty() -> Self {
        Response {
            payload: Payload::empty(),
        }
    }

    pub fn new(payload: impl Into<Payload>) -> Self {
        Response {
            payload: payload.into(),
        }
    }
}

/// Older unified envelope: the correlation id folded into the call struct
/// itself. An alternate encoding of (port, request), not a distinct
/// entity; the conversions below are loss free.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Packet {
    pub id: PortId,
    pub method: Payload,
    pub payload: Payload,
}

impl Packet {
    pub const fn empty() -> Self {
        Packet {
            id: 0,
            method: Payload::empty(),
            payload: Payload::empty(),
        }
    }

    pub fn from_parts(id: PortId, request: Request) -> Self {
        Packet {
            id,
            method: request.method,
            payload: request.payload,
        }
    }

    pub fn into_parts(self) -> (PortId, Request) {
        (
            self.id,
            Request {
                method: self.method,
                payload: self.payload,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Packet, Request, Response};
    use crate::payload::Payload;

    #[test]
    fn packet_round_trips_request() {
        let request = Request::new("ping", vec![0x01, 0x02, 0x03]);
        let packet = Packet::from_parts(7, request.clone());
        let (id, back) = packet.into_parts();
        assert_eq!(id, 7);
        assert_eq!(back, request);
        assert_eq!(back.method_text(), Some("ping"));
        assert_eq!(back.payload.as_slice(), &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn method_text_rejects_invalid_utf8() {
        let request = Request::new(vec![0xFF, 0xFE], Payload::empty());
        assert_eq!(request.method_text(), None);
    }

    #[test]
    fn empties_are_well_formed() {
        assert_eq!(Request::empty(), Request::default());
        assert_eq!(Response::empty(), Response::default());
        assert_eq!(Packet::empty().id, 0);
        assert!(Packet::empty().method.is_empty());
    }
}
