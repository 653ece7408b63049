//! The in-memory state container.
//!
//! A `StoreHandle` is an explicitly owned, cloneable handle to one piece
//! of state. Mutations commit synchronously under a mutex; observers are
//! notified after each commit; when a persistence sink is attached (see
//! [`super::persist`]), every committed snapshot is also enqueued for the
//! background writer. Callers never see persistence errors.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

type Observer<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Message protocol between a handle and its persistence writer task.
pub(crate) enum PersistMsg<S> {
    /// Persist this committed snapshot.
    Write(S),
    /// Acknowledge once everything enqueued earlier has been written.
    Flush(oneshot::Sender<()>),
}

struct HandleInner<S> {
    state: Mutex<S>,
    observers: Mutex<Vec<Observer<S>>>,
    sink: Mutex<Option<mpsc::UnboundedSender<PersistMsg<S>>>>,
}

/// Cloneable handle to a single state value. Clones share the state.
pub struct StoreHandle<S> {
    inner: Arc<HandleInner<S>>,
}

impl<S> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Clone + Send + 'static> StoreHandle<S> {
    pub fn new(initial: S) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                state: Mutex::new(initial),
                observers: Mutex::new(Vec::new()),
                sink: Mutex::new(None),
            }),
        }
    }

    /// Clone of the current state.
    pub fn get(&self) -> S {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Read without cloning the whole state.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }

    /// Apply a mutation, commit it exactly once, notify observers, and
    /// enqueue the committed snapshot for persistence. Returns the
    /// snapshot.
    pub fn update(&self, mutate: impl FnOnce(&mut S)) -> S {
        self.update_with(|state| mutate(state)).0
    }

    /// Like [`update`](Self::update), but the mutation closure can hand
    /// back a value computed while the state lock is held.
    pub fn update_with<R>(&self, mutate: impl FnOnce(&mut S) -> R) -> (S, R) {
        let (snapshot, out) = {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            let out = mutate(&mut state);
            let snapshot = state.clone();
            // Enqueue while still holding the state lock so the writer
            // sees snapshots in commit order.
            let sink = self.inner.sink.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(tx) = sink.as_ref() {
                let _ = tx.send(PersistMsg::Write(snapshot.clone()));
            }
            (snapshot, out)
        };
        self.notify(&snapshot);
        (snapshot, out)
    }

    /// Replace the state wholesale. Observers are notified, but the new
    /// state is *not* enqueued for persistence -- rehydration uses this
    /// so that loading does not immediately write back.
    pub fn replace(&self, next: S) -> S {
        let snapshot = {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            *state = next;
            state.clone()
        };
        self.notify(&snapshot);
        snapshot
    }

    /// Register an observer invoked with the committed state after every
    /// mutation or replace.
    pub fn subscribe(&self, observer: impl Fn(&S) + Send + Sync + 'static) {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(observer));
    }

    /// Wait until every snapshot enqueued so far has been written.
    /// Returns immediately when no persistence sink is attached.
    pub async fn flush(&self) {
        let waiter = {
            let sink = self.inner.sink.lock().unwrap_or_else(|e| e.into_inner());
            sink.as_ref().map(|tx| {
                let (ack, waiter) = oneshot::channel();
                let _ = tx.send(PersistMsg::Flush(ack));
                waiter
            })
        };
        if let Some(waiter) = waiter {
            // A dropped writer acks by closing the channel.
            let _ = waiter.await;
        }
    }

    /// Install the persistence sink. At most one is active; attaching
    /// again replaces the previous one and its writer drains out.
    pub(crate) fn attach_sink(&self, tx: mpsc::UnboundedSender<PersistMsg<S>>) {
        *self.inner.sink.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
    }

    fn notify(&self, snapshot: &S) {
        // Clone the list out so observers can call back into the handle.
        let observers: Vec<Observer<S>> = self
            .inner
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for observer in observers {
            observer(snapshot);
        }
    }
}
