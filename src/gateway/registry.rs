use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::oneshot;
use tracing::warn;

/// Cancellation handles for in-flight calls, keyed by request id
#[derive(Debug, Default)]
pub struct ActiveRequests {
    inner: Mutex<Registry>,
}

#[derive(Debug, Default)]
struct Registry {
    next_generation: u64,
    handles: HashMap<String, (u64, oneshot::Sender<()>)>,
}

/// Returned by [`ActiveRequests::register`]; resolves when the call is cancelled
pub(crate) struct CancelSignal {
    pub generation: u64,
    receiver: oneshot::Receiver<()>,
}

impl CancelSignal {
    /// Completes only on an explicit cancel. A handle displaced by a newer call
    /// reusing the same id never fires.
    pub fn cancelled(self) -> impl Future<Output = ()> {
        async move {
            if self.receiver.await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl ActiveRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, request_id: &str) -> CancelSignal {
        let (sender, receiver) = oneshot::channel();
        let mut registry = self.inner.lock();
        registry.next_generation += 1;
        let generation = registry.next_generation;
        if registry
            .handles
            .insert(request_id.to_string(), (generation, sender))
            .is_some()
        {
            warn!("request id {} reused while still in flight", request_id);
        }
        CancelSignal {
            generation,
            receiver,
        }
    }

    /// Forget the handle once its call has settled
    pub(crate) fn release(&self, request_id: &str, generation: u64) {
        let mut registry = self.inner.lock();
        if registry
            .handles
            .get(request_id)
            .is_some_and(|(g, _)| *g == generation)
        {
            registry.handles.remove(request_id);
        }
    }

    /// Cancel the call registered under `request_id`; false if none is in flight
    pub fn cancel(&self, request_id: &str) -> bool {
        let handle = self.inner.lock().handles.remove(request_id);
        match handle {
            Some((_, sender)) => sender.send(()).is_ok(),
            None => false,
        }
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.inner.lock().handles.contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
