//! Persistence middleware for [`StoreHandle`].
//!
//! Attaching persistence to a handle installs two background tasks:
//!
//! - a **writer** fed by an unbounded channel: every committed mutation
//!   enqueues a full-state snapshot, the writer serializes it with a
//!   `_persistVersion` tag and overwrites the named blob in the store
//!   document. Failures are logged at `warn` and never reach the caller.
//! - a one-shot **rehydration** task: loads the persisted blob, checks
//!   its version, migrates or discards on mismatch, merges with the
//!   initial state, wholesale-replaces the live state, and fires the
//!   `on_rehydrate` hook.
//!
//! A mutation racing rehydration is last-write-wins over the whole
//! state; the returned `watch` receiver settles once rehydration is done
//! so disciplined callers can sequence after it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::document::StoreDocument;
use super::handle::{PersistMsg, StoreHandle};

/// Version tag stored alongside the state fields in every blob.
pub const PERSIST_VERSION_KEY: &str = "_persistVersion";

type MigrateFn = Box<dyn Fn(Value, u32) -> Value + Send>;
type MergeFn<S> = Box<dyn Fn(Value, &S) -> S + Send>;
type RehydrateHook<S> = Box<dyn FnOnce(&S, &StoreHandle<S>) + Send>;

/// Configuration for one persisted store.
pub struct PersistOptions<S> {
    name: String,
    version: u32,
    migrate: Option<MigrateFn>,
    merge: Option<MergeFn<S>>,
    on_rehydrate: Option<RehydrateHook<S>>,
}

impl<S> PersistOptions<S> {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            migrate: None,
            merge: None,
            on_rehydrate: None,
        }
    }

    /// Total migration from any older persisted shape to the current
    /// one. Called with the raw blob and its recorded version; the
    /// result becomes the rehydration candidate. Without it, a version
    /// mismatch discards the persisted state.
    pub fn migrate(mut self, f: impl Fn(Value, u32) -> Value + Send + 'static) -> Self {
        self.migrate = Some(Box::new(f));
        self
    }

    /// Combine the candidate blob with the initial in-memory state.
    /// Defaults to shallow override: persisted fields win, fields the
    /// blob omits keep their initial values.
    pub fn merge(mut self, f: impl Fn(Value, &S) -> S + Send + 'static) -> Self {
        self.merge = Some(Box::new(f));
        self
    }

    /// Invoked once with the final state after a persisted blob was
    /// applied. Not invoked when nothing was persisted or the blob was
    /// discarded.
    pub fn on_rehydrate(mut self, f: impl FnOnce(&S, &StoreHandle<S>) + Send + 'static) -> Self {
        self.on_rehydrate = Some(Box::new(f));
        self
    }
}

/// Build a persisted store from an initial state. Must be called within
/// a tokio runtime. The returned receiver settles to `true` once
/// rehydration has finished.
///
/// `S` must serialize to a JSON object, since the version tag is stored
/// as a sibling of the state fields.
pub fn wrap<S>(
    initial: S,
    document: StoreDocument,
    options: PersistOptions<S>,
) -> (StoreHandle<S>, watch::Receiver<bool>)
where
    S: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    let store = StoreHandle::new(initial);
    let ready = attach(&store, document, options);
    (store, ready)
}

/// Install persistence on an existing handle. Same contract as [`wrap`];
/// exists so the rehydration hook can capture structures built around
/// the handle before persistence starts.
pub fn attach<S>(
    store: &StoreHandle<S>,
    document: StoreDocument,
    options: PersistOptions<S>,
) -> watch::Receiver<bool>
where
    S: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    store.attach_sink(tx);
    tokio::spawn(writer_task(
        document.clone(),
        options.name.clone(),
        options.version,
        rx,
    ));

    let (ready_tx, ready_rx) = watch::channel(false);
    let store = store.clone();
    tokio::spawn(async move {
        rehydrate(&store, &document, options);
        let _ = ready_tx.send(true);
    });
    ready_rx
}

async fn writer_task<S: Serialize + Send + 'static>(
    document: StoreDocument,
    name: String,
    version: u32,
    mut rx: mpsc::UnboundedReceiver<PersistMsg<S>>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            PersistMsg::Write(state) => {
                // Snapshots are wholesale overwrites, so drain the queue
                // and keep only the newest before touching the disk.
                let mut state = state;
                let mut pending_acks = Vec::new();
                while let Ok(next) = rx.try_recv() {
                    match next {
                        PersistMsg::Write(newer) => state = newer,
                        PersistMsg::Flush(ack) => pending_acks.push(ack),
                    }
                }
                write_snapshot(&document, &name, version, &state);
                for ack in pending_acks {
                    let _ = ack.send(());
                }
            }
            PersistMsg::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("persistence writer for '{name}' drained");
}

fn write_snapshot<S: Serialize>(document: &StoreDocument, name: &str, version: u32, state: &S) {
    let mut blob = match serde_json::to_value(state) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!("store '{name}': state is not a JSON object, skipping write");
            return;
        }
        Err(e) => {
            warn!("store '{name}': failed to serialize state: {e}");
            return;
        }
    };
    blob.insert(PERSIST_VERSION_KEY.to_string(), Value::from(version));
    if let Err(e) = document.set(name, Value::Object(blob)) {
        warn!("store '{name}': persist failed: {e}");
    }
}

fn rehydrate<S>(store: &StoreHandle<S>, document: &StoreDocument, options: PersistOptions<S>)
where
    S: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    let PersistOptions {
        name,
        version,
        migrate,
        merge,
        on_rehydrate,
    } = options;

    let raw = match document.get(&name) {
        Ok(Some(raw)) => raw,
        Ok(None) => return, // Nothing persisted; defaults stand.
        Err(e) => {
            warn!("store '{name}': failed to load persisted state: {e}");
            return;
        }
    };

    let persisted_version = raw
        .get(PERSIST_VERSION_KEY)
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .unwrap_or(0);

    let mut candidate = if persisted_version == version {
        raw
    } else if let Some(migrate) = migrate {
        debug!("store '{name}': migrating persisted state v{persisted_version} -> v{version}");
        migrate(raw, persisted_version)
    } else {
        warn!(
            "store '{name}': persisted v{persisted_version} has no migration path to \
             v{version}, discarding"
        );
        return;
    };

    if let Value::Object(map) = &mut candidate {
        map.remove(PERSIST_VERSION_KEY);
    }

    let next = {
        let current = store.get();
        match merge {
            Some(merge) => merge(candidate, &current),
            None => match shallow_override(&current, candidate) {
                Ok(next) => next,
                Err(e) => {
                    warn!("store '{name}': persisted state does not fit the schema: {e}");
                    return;
                }
            },
        }
    };

    let final_state = store.replace(next);
    if let Some(hook) = on_rehydrate {
        hook(&final_state, store);
    }
}

/// Default merge: overlay the candidate's top-level fields onto the
/// current state. Fields the candidate omits keep their current values;
/// a non-object candidate changes nothing.
fn shallow_override<S>(current: &S, candidate: Value) -> Result<S, serde_json::Error>
where
    S: Serialize + DeserializeOwned,
{
    let mut base = serde_json::to_value(current)?;
    if let (Value::Object(base_map), Value::Object(overlay)) = (&mut base, candidate) {
        for (key, value) in overlay {
            base_map.insert(key, value);
        }
    }
    serde_json::from_value(base)
}
