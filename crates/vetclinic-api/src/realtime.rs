//! The realtime hub: which live connections each user has, and delivery of
//! events to them.
//!
//! A single task owns the registry; handles talk to it over a channel, so
//! registration, removal and fan-out never race. Each connection has a
//! bounded queue. An event that does not fit is dropped for that connection
//! only, and queues whose receiver is gone are pruned on the next delivery.

use std::{
  collections::HashMap,
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
};

use tokio::sync::{
  mpsc::{self, error::TrySendError},
  oneshot,
};
use uuid::Uuid;
use vetclinic_core::realtime::{Event, Notifier};

/// Events buffered per connection before new ones are dropped.
pub const CONNECTION_QUEUE: usize = 64;

type EventTx = mpsc::Sender<Arc<Event>>;

enum Command {
  Register { user_id: Uuid, conn_id: u64, tx: EventTx },
  Unregister { user_id: Uuid, conn_id: u64 },
  Emit { recipient: Uuid, event: Arc<Event> },
  Count { user_id: Uuid, reply: oneshot::Sender<usize> },
}

/// Handle to the hub task. Cheap to clone.
#[derive(Clone)]
pub struct Hub {
  tx:      mpsc::UnboundedSender<Command>,
  next_id: Arc<AtomicU64>,
}

impl Hub {
  /// Start the hub task on the current runtime. It stops once every handle
  /// and connection is dropped.
  pub fn spawn() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(rx));
    Self {
      tx,
      next_id: Arc::new(AtomicU64::new(1)),
    }
  }

  /// Register a live connection for `user_id`. Dropping the returned
  /// [`Connection`] unregisters it.
  pub fn register(&self, user_id: Uuid) -> Connection {
    let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::channel(CONNECTION_QUEUE);
    self.send(Command::Register { user_id, conn_id, tx });
    tracing::debug!(%user_id, conn_id, "connection registered");
    Connection {
      user_id,
      conn_id,
      events: rx,
      hub: self.clone(),
    }
  }

  /// Number of live connections `user_id` currently has.
  pub async fn connection_count(&self, user_id: Uuid) -> usize {
    let (reply, rx) = oneshot::channel();
    self.send(Command::Count { user_id, reply });
    rx.await.unwrap_or(0)
  }

  fn send(&self, cmd: Command) {
    if self.tx.send(cmd).is_err() {
      tracing::warn!("realtime hub has stopped");
    }
  }
}

impl Notifier for Hub {
  fn emit(&self, recipient: Uuid, event: Arc<Event>) {
    self.send(Command::Emit { recipient, event });
  }
}

/// One registered connection's event stream.
pub struct Connection {
  user_id: Uuid,
  conn_id: u64,
  events:  mpsc::Receiver<Arc<Event>>,
  hub:     Hub,
}

impl Connection {
  pub fn user_id(&self) -> Uuid { self.user_id }

  /// The next event for this connection, or `None` once the hub is gone.
  pub async fn recv(&mut self) -> Option<Arc<Event>> { self.events.recv().await }
}

impl Drop for Connection {
  fn drop(&mut self) {
    // The hub may already be gone at shutdown.
    let _ = self.hub.tx.send(Command::Unregister {
      user_id: self.user_id,
      conn_id: self.conn_id,
    });
  }
}

// ─── Hub task ────────────────────────────────────────────────────────────────

async fn run(mut rx: mpsc::UnboundedReceiver<Command>) {
  let mut registry: HashMap<Uuid, Vec<(u64, EventTx)>> = HashMap::new();

  while let Some(cmd) = rx.recv().await {
    match cmd {
      Command::Register { user_id, conn_id, tx } => {
        registry.entry(user_id).or_default().push((conn_id, tx));
      }
      Command::Unregister { user_id, conn_id } => {
        if let Some(conns) = registry.get_mut(&user_id) {
          conns.retain(|(id, _)| *id != conn_id);
          if conns.is_empty() {
            registry.remove(&user_id);
          }
        }
        tracing::debug!(%user_id, conn_id, "connection unregistered");
      }
      Command::Emit { recipient, event } => deliver(&mut registry, recipient, event),
      Command::Count { user_id, reply } => {
        let _ = reply.send(registry.get(&user_id).map_or(0, Vec::len));
      }
    }
  }
}

fn deliver(
  registry: &mut HashMap<Uuid, Vec<(u64, EventTx)>>,
  recipient: Uuid,
  event: Arc<Event>,
) {
  let Some(conns) = registry.get_mut(&recipient) else {
    tracing::trace!(%recipient, event = event.name(), "recipient offline");
    return;
  };

  conns.retain(|(conn_id, tx)| match tx.try_send(Arc::clone(&event)) {
    Ok(()) => true,
    Err(TrySendError::Full(_)) => {
      tracing::warn!(%recipient, conn_id, event = event.name(), "connection queue full; event dropped");
      true
    }
    Err(TrySendError::Closed(_)) => false,
  });

  if conns.is_empty() {
    registry.remove(&recipient);
  }
}
