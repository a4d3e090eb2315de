use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError, RwLock, Weak};
use std::thread;
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::envelope::{Request, Response};
use crate::error::BridgeError;
use crate::handler::{HandlerSlot, MethodHandler};
use crate::ports::{PendingCalls, PortCounter, PortId};

/// Which way a call crosses the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    ManagedToNative,
    NativeToManaged,
}

impl Direction {
    /// The side that issued the call and receives its completion.
    pub fn initiator(self) -> Side {
        match self {
            Direction::ManagedToNative => Side::Managed,
            Direction::NativeToManaged => Side::Native,
        }
    }

    /// The side whose handler runs the call.
    pub fn target(self) -> Side {
        match self {
            Direction::ManagedToNative => Side::Native,
            Direction::NativeToManaged => Side::Managed,
        }
    }
}

/// One of the two runtimes joined by a bridge instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Native,
    Managed,
}

impl Side {
    fn name(self) -> &'static str {
        match self {
            Side::Native => "native",
            Side::Managed => "managed",
        }
    }
}

/// Push-style completion delivery into a runtime's own scheduling
/// context, e.g. a managed event loop's wake port. When a side registers
/// a sink, its async completions bypass the pull queue.
pub trait CompletionSink: Send + Sync {
    fn complete(&self, port: PortId, response: Response);
}

/// Single-shot completion route captured when an async call is
/// dispatched. Taking the pending entry and resolving it is the only way
/// a completion reaches the caller, so each fires at most once.
enum Delivery {
    Queue(mpsc::Sender<(PortId, Response)>),
    Sink(Arc<dyn CompletionSink>),
}

struct Job {
    direction: Direction,
    port: PortId,
    request: Request,
}

struct Endpoint {
    side: Side,
    handler: HandlerSlot,
    pending: PendingCalls<Delivery>,
    sink: RwLock<Option<Arc<dyn CompletionSink>>>,
    queue_tx: mpsc::Sender<(PortId, Response)>,
    queue_rx: Mutex<mpsc::Receiver<(PortId, Response)>>,
    jobs: OnceCell<mpsc::Sender<Job>>,
}

impl Endpoint {
    fn new(side: Side) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel();
        Endpoint {
            side,
            handler: HandlerSlot::new(),
            pending: PendingCalls::new(),
            sink: RwLock::new(None),
            queue_tx,
            queue_rx: Mutex::new(queue_rx),
            jobs: OnceCell::new(),
        }
    }

    fn dispatch(&self, request: Request, counters: &Counters) -> Response {
        match self.handler.get() {
            Some(handler) => handler.handle(request),
            None => {
                counters.unbound_dispatches.fetch_add(1, Ordering::Relaxed);
                eprintln!("portlink: {} method handle not bound", self.side.name());
                Response::empty()
            }
        }
    }

    fn delivery(&self) -> Delivery {
        let sink = self.sink.read().unwrap_or_else(PoisonError::into_inner);
        match sink.as_ref() {
            Some(sink) => Delivery::Sink(Arc::clone(sink)),
            None => Delivery::Queue(self.queue_tx.clone()),
        }
    }
}

#[derive(Default)]
struct Counters {
    unbound_dispatches: AtomicU64,
    stray_completions: AtomicU64,
    completed_calls: AtomicU64,
}

/// Point-in-time diagnostic snapshot of one bridge instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub unbound_dispatches: u64,
    pub stray_completions: u64,
    pub completed_calls: u64,
}

struct Shared {
    ports: PortCounter,
    native: Endpoint,
    managed: Endpoint,
    counters: Counters,
}

impl Shared {
    fn endpoint(&self, side: Side) -> &Endpoint {
        match side {
            Side::Native => &self.native,
            Side::Managed => &self.managed,
        }
    }

    fn complete_call(
        &self,
        direction: Direction,
        port: PortId,
        response: Response,
    ) -> Result<(), BridgeError> {
        let origin = self.endpoint(direction.initiator());
        let Some(delivery) = origin.pending.take(port) else {
            self.counters.stray_completions.fetch_add(1, Ordering::Relaxed);
            return Err(BridgeError::StrayCompletion(port));
        };
        self.counters.completed_calls.fetch_add(1, Ordering::Relaxed);
        match delivery {
            Delivery::Queue(tx) => {
                // Receiver gone means the initiator stopped pumping; the
                // call still counts as completed.
                let _ = tx.send((port, response));
            }
            Delivery::Sink(sink) => sink.complete(port, response),
        }
        Ok(())
    }
}

/// One bridge instance: both directions of one managed/native boundary.
///
/// All mutable state lives behind this object, so two instances linked
/// into the same process never share a handler slot, a port counter, or
/// a pending-call table. Clones are handles onto the same instance.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Shared>,
}

impl Bridge {
    pub fn new() -> Self {
        Bridge {
            inner: Arc::new(Shared {
                ports: PortCounter::new(),
                native: Endpoint::new(Side::Native),
                managed: Endpoint::new(Side::Managed),
                counters: Counters::default(),
            }),
        }
    }

    /// Binds the inbound handler for `side`, returning the handler it
    /// replaced. Re-registration is allowed and replaces silently apart
    /// from one diagnostic line.
    pub fn register_handler(
        &self,
        side: Side,
        handler: Arc<dyn MethodHandler>,
    ) -> Option<Arc<dyn MethodHandler>> {
        let previous = self.inner.endpoint(side).handler.replace(handler);
        if previous.is_some() {
            eprintln!("portlink: replacing {} method handle", side.name());
        }
        previous
    }

    /// Routes `side`'s future async completions through `sink` instead
    /// of the pull queue. Calls already pending keep the route captured
    /// at dispatch time.
    pub fn set_completion_sink(&self, side: Side, sink: Arc<dyn CompletionSink>) {
        let mut slot = self
            .inner
            .endpoint(side)
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(sink);
    }

    /// Thread-safe, strictly increasing per call order. Never blocks
    /// outside the wrap window at the end of the id range.
    pub fn next_port_id(&self) -> PortId {
        self.inner.ports.issue()
    }

    /// Synchronous call: blocks the calling thread until the target
    /// side's handler returns. With no handler bound the canonical empty
    /// response comes back instead of an error.
    ///
    /// The handler runs on the caller's thread here, so a handler must
    /// not issue a synchronous call back in the opposite direction on
    /// the same thread; the two blocking waits would deadlock.
    pub fn call_method(&self, direction: Direction, request: Request) -> Response {
        self.inner
            .endpoint(direction.target())
            .dispatch(request, &self.inner.counters)
    }

    /// Asynchronous call: records `port` as pending for the initiating
    /// side and hands the request to the target side's dispatch worker.
    /// Returns as soon as the job is queued. The completion arrives
    /// later through the initiator's sink or pull queue, tagged with
    /// `port`.
    pub fn call_method_async(
        &self,
        direction: Direction,
        port: PortId,
        request: Request,
    ) -> Result<(), BridgeError> {
        let origin = self.inner.endpoint(direction.initiator());
        origin.pending.begin(port, origin.delivery())?;

        let jobs = self.jobs_sender(direction.target());
        if jobs
            .send(Job {
                direction,
                port,
                request,
            })
            .is_err()
        {
            let _ = origin.pending.take(port);
            return Err(BridgeError::Shutdown);
        }
        Ok(())
    }

    /// Resolves the pending call `port` issued in `direction`. Used by
    /// runtime glue that produces a completion out of band; the dispatch
    /// workers use the same path internally. Exactly-once: a second
    /// delivery for the same port reports `StrayCompletion` and leaves
    /// all other state untouched.
    pub fn complete_call(
        &self,
        direction: Direction,
        port: PortId,
        response: Response,
    ) -> Result<(), BridgeError> {
        self.inner.complete_call(direction, port, response)
    }

    /// Pull-style completion pump for `side`: blocks up to `timeout` for
    /// the next completion of a call that side initiated. `None` on
    /// timeout.
    pub fn poll_completion(&self, side: Side, timeout: Duration) -> Option<(PortId, Response)> {
        let rx = self
            .inner
            .endpoint(side)
            .queue_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        rx.recv_timeout(timeout).ok()
    }

    /// Async calls initiated by `side` still awaiting completion.
    pub fn pending_calls(&self, side: Side) -> usize {
        self.inner.endpoint(side).pending.len()
    }

    pub fn stats(&self) -> BridgeStats {
        let counters = &self.inner.counters;
        BridgeStats {
            unbound_dispatches: counters.unbound_dispatches.load(Ordering::Relaxed),
            stray_completions: counters.stray_completions.load(Ordering::Relaxed),
            completed_calls: counters.completed_calls.load(Ordering::Relaxed),
        }
    }

    fn jobs_sender(&self, side: Side) -> mpsc::Sender<Job> {
        self.inner
            .endpoint(side)
            .jobs
            .get_or_init(|| {
                let (tx, rx) = mpsc::channel();
                let shared = Arc::downgrade(&self.inner);
                let _ = thread::Builder::new()
                    .name(format!("portlink-{}-dispatch", side.name()))
                    .spawn(move || dispatch_worker(shared, side, rx));
                tx
            })
            .clone()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Bridge::new()
    }
}

/// Runs async dispatches for one endpoint. Exits when every handle to
/// the bridge is dropped and the job channel disconnects.
fn dispatch_worker(shared: Weak<Shared>, side: Side, rx: mpsc::Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let response = shared.endpoint(side).dispatch(job.request, &shared.counters);
        if let Err(err) = shared.complete_call(job.direction, job.port, response) {
            eprintln!("portlink: {err}");
        }
    }
}
