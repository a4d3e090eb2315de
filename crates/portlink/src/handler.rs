use std::sync::{Arc, PoisonError, RwLock};

use crate::envelope::{Request, Response};

/// Inbound dispatch target for one side of the bridge.
///
/// Each side registers at most one handler; fan-out to logical methods
/// happens inside the handler via the request's method field, never via
/// multiple registrations.
pub trait MethodHandler: Send + Sync {
    fn handle(&self, request: Request) -> Response;
}

impl<F> MethodHandler for F
where
    F: Fn(Request) -> Response + Send + Sync,
{
    fn handle(&self, request: Request) -> Response {
        self(request)
    }
}

/// The single replaceable handler slot of one endpoint. Registration
/// must not race with dispatch reading the slot, hence the lock.
pub(crate) struct HandlerSlot {
    slot: RwLock<Option<Arc<dyn MethodHandler>>>,
}

impl HandlerSlot {
    pub(crate) fn new() -> Self {
        HandlerSlot {
            slot: RwLock::new(None),
        }
    }

    /// Binds a handler, returning the one it replaced, if any.
    pub(crate) fn replace(
        &self,
        handler: Arc<dyn MethodHandler>,
    ) -> Option<Arc<dyn MethodHandler>> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(handler)
    }

    pub(crate) fn get(&self) -> Option<Arc<dyn MethodHandler>> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        slot.clone()
    }
}
