//! HTTP and socket surface for the clinic.
//!
//! Exposes an axum [`Router`] over any [`ClinicStore`]: JSON routes under
//! `/api` and the realtime socket at `/ws`. Callers are identified by the
//! [`auth::USER_HEADER`] header.

pub mod appointments;
pub mod auth;
pub mod chats;
pub mod error;
pub mod notifications;
pub mod realtime;
pub mod ws;


pub use error::ApiError;
pub use realtime::Hub;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use vetclinic_core::{
  conversation::ConversationResolver,
  scheduler::{Scheduler, SchedulerConfig},
  store::ClinicStore,
};

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:         Arc<S>,
  pub scheduler:     Arc<Scheduler<S>>,
  pub conversations: Arc<ConversationResolver<S, Hub>>,
  pub hub:           Hub,
}

impl<S: ClinicStore> AppState<S> {
  pub fn new(store: Arc<S>, config: SchedulerConfig, hub: Hub) -> Self {
    Self {
      scheduler: Arc::new(Scheduler::new(Arc::clone(&store), config)),
      conversations: Arc::new(ConversationResolver::new(Arc::clone(&store), hub.clone())),
      store,
      hub,
    }
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:         Arc::clone(&self.store),
      scheduler:     Arc::clone(&self.scheduler),
      conversations: Arc::clone(&self.conversations),
      hub:           self.hub.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The JSON routes, relative to `/api`.
pub fn api_router<S>() -> Router<AppState<S>>
where
  S: ClinicStore + 'static,
{
  use appointments as appt;

  Router::new()
    .route("/appointments",                       post(appt::create::<S>))
    .route(
      "/appointments/{id}",
      get(appt::get_one::<S>).patch(appt::update::<S>).delete(appt::delete::<S>),
    )
    .route("/appointments/{id}/accept",           post(appt::accept::<S>))
    .route("/appointments/{id}/reject",           post(appt::reject::<S>))
    .route("/clients/{id}/appointments",          get(appt::for_client::<S>))
    .route("/veterinarians/{id}/appointments",    get(appt::for_veterinarian::<S>))
    .route("/veterinarians/{id}/clients",         get(appt::clients_of::<S>))
    .route(
      "/veterinarians/{id}/clients/{client_id}/animals",
      get(appt::animals_of::<S>),
    )
    .route("/chats",                              get(chats::list::<S>))
    .route("/chats/messages",                     post(chats::send::<S>))
    .route("/chats/{id}/messages",                get(chats::messages::<S>))
    .route("/chats/{id}/read",                    post(chats::mark_read::<S>))
    .route("/notifications",                      get(notifications::feed::<S>))
    .route("/notifications/{id}/read",            post(notifications::mark_read::<S>))
}

/// Build the full application [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ClinicStore + 'static,
{
  Router::new()
    .nest("/api", api_router::<S>())
    .route("/ws", get(ws::upgrade::<S>))
    .with_state(state)
}
