//! The appointment scheduler: booking lifecycle and the no-double-booking
//! rule.
//!
//! Two conflict policies exist. Booking uses [`ConflictWindow::creation`]
//! (±29 minutes, accepted appointments of the same veterinarian only, both
//! ends inclusive); moving a pending appointment uses
//! [`ConflictWindow::update`] (±20 minutes, any status and any veterinarian,
//! end exclusive). Accepting does not re-check conflicts.

use std::{str::FromStr as _, sync::Arc};

use chrono_tz::Tz;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  appointment::{
    Appointment, AppointmentChanges, AppointmentKind, AppointmentStatus,
    ConflictWindow, NewAppointment, agenda_order,
  },
  id::{parse_id, parse_opt_id},
  page::Page,
  store::{AgendaOwner, AmendOutcome, BookingOutcome, ClinicStore, TransitionOutcome},
  time::parse_booking_date,
  user::{Animal, Role, User, UserSummary},
};

/// Appointments per listing page.
pub const AGENDA_PAGE_SIZE: usize = 10;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
  /// Civil zone used to read offset-less booking dates.
  pub zone:            Tz,
  pub creation_window: ConflictWindow,
  pub update_window:   ConflictWindow,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      zone:            chrono_tz::Africa::Tunis,
      creation_window: ConflictWindow::creation(29),
      update_window:   ConflictWindow::update(20),
    }
  }
}

// ─── Requests ────────────────────────────────────────────────────────────────

/// A client's booking request, as received. Fields are validated by
/// [`Scheduler::create`], not by deserialisation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingRequest {
  pub date:             Option<String>,
  pub animal_id:        Option<String>,
  #[serde(rename = "type")]
  pub kind:             Option<String>,
  pub veterinarian_id:  Option<String>,
  pub services:         Option<Vec<String>>,
  pub case_description: Option<String>,
}

/// A client's edit of a pending appointment. Identity, ownership, status and
/// timestamps are not part of it; such keys in an incoming body are dropped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentPatch {
  pub date:             Option<String>,
  pub animal_id:        Option<String>,
  #[serde(rename = "type")]
  pub kind:             Option<String>,
  pub services:         Option<Vec<String>>,
  pub case_description: Option<String>,
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

pub struct Scheduler<S> {
  store:  Arc<S>,
  config: SchedulerConfig,
}

impl<S: ClinicStore> Scheduler<S> {
  pub fn new(store: Arc<S>, config: SchedulerConfig) -> Self {
    Self { store, config }
  }

  pub fn config(&self) -> &SchedulerConfig { &self.config }

  /// Book an appointment for one of the requesting client's animals.
  pub async fn create(&self, requester: &User, req: BookingRequest) -> Result<Appointment> {
    if requester.role != Role::Client {
      return Err(Error::forbidden("only a client can book an appointment"));
    }

    let (Some(date), Some(animal_id), Some(kind)) = (
      non_blank(req.date.as_deref()),
      non_blank(req.animal_id.as_deref()),
      non_blank(req.kind.as_deref()),
    ) else {
      return Err(Error::invalid("date, animal_id and type are required"));
    };

    let animal_id = parse_id(animal_id, "animal")?;
    let kind = parse_kind(kind)?;

    self
      .store
      .find_owned_animal(animal_id, requester.user_id)
      .await
      .map_err(Error::internal)?
      .ok_or_else(|| Error::not_found("animal not found or not owned by this client"))?;

    let veterinarian_id = parse_opt_id(req.veterinarian_id.as_deref(), "veterinarian")?
      .ok_or_else(|| Error::invalid("veterinarian_id is required"))?;
    let is_vet = self
      .store
      .exists_with_role(veterinarian_id, Role::Veterinarian)
      .await
      .map_err(Error::internal)?;
    if !is_vet {
      return Err(Error::not_found("veterinarian not found"));
    }

    let date = parse_booking_date(date, self.config.zone)?;

    let input = NewAppointment {
      date,
      client_id: requester.user_id,
      veterinarian_id,
      animal_id,
      kind,
      services: clean_services(req.services.unwrap_or_default()),
      case_description: req.case_description.unwrap_or_default(),
    };

    let window = self.config.creation_window;
    match self
      .store
      .book_appointment(input, window)
      .await
      .map_err(Error::internal)?
    {
      BookingOutcome::Booked(appointment) => {
        tracing::info!(
          appointment_id = %appointment.appointment_id,
          veterinarian_id = %veterinarian_id,
          date = %appointment.date,
          "appointment booked"
        );
        Ok(appointment)
      }
      BookingOutcome::Conflict(ids) => {
        tracing::info!(veterinarian_id = %veterinarian_id, %date, conflicts = ?ids, "booking refused");
        Err(Error::Conflict(format!(
          "slot unavailable: an accepted appointment is already scheduled within {} minutes",
          window.radius.num_minutes()
        )))
      }
    }
  }

  /// A single appointment, visible to its client and to the veterinarian's
  /// side.
  pub async fn get(&self, requester: &User, id: Uuid) -> Result<Appointment> {
    let appointment = self.load(id).await?;
    if !involved(requester, &appointment) {
      return Err(Error::forbidden("not a party to this appointment"));
    }
    Ok(appointment)
  }

  /// Edit a pending appointment. Only its client may do so.
  pub async fn update(
    &self,
    requester: &User,
    id: Uuid,
    patch: AppointmentPatch,
  ) -> Result<Appointment> {
    let current = self.load(id).await?;

    if requester.role != Role::Client || current.client_id != requester.user_id {
      return Err(Error::forbidden("you cannot modify this appointment"));
    }
    if current.status != AppointmentStatus::Pending {
      return Err(Error::forbidden(format!(
        "appointment is {}, only pending appointments can be modified",
        current.status.as_ref()
      )));
    }

    let mut changes = AppointmentChanges {
      services: patch.services.map(clean_services),
      case_description: patch.case_description,
      ..Default::default()
    };

    if let Some(raw) = non_blank(patch.animal_id.as_deref()) {
      let animal_id = parse_id(raw, "animal")?;
      self
        .store
        .find_owned_animal(animal_id, requester.user_id)
        .await
        .map_err(Error::internal)?
        .ok_or_else(|| Error::forbidden("this animal does not exist or is not yours"))?;
      changes.animal_id = Some(animal_id);
    }
    if let Some(raw) = non_blank(patch.kind.as_deref()) {
      changes.kind = Some(parse_kind(raw)?);
    }
    if let Some(raw) = non_blank(patch.date.as_deref()) {
      changes.date = Some(parse_booking_date(raw, self.config.zone)?);
    }

    if changes.is_empty() {
      return Ok(current);
    }

    let window = self.config.update_window;
    match self
      .store
      .amend_appointment(id, changes, window)
      .await
      .map_err(Error::internal)?
    {
      AmendOutcome::Amended(appointment) => Ok(appointment),
      AmendOutcome::NotFound => Err(appointment_not_found()),
      AmendOutcome::NotPending(status) => Err(Error::forbidden(format!(
        "appointment is {}, only pending appointments can be modified",
        status.as_ref()
      ))),
      AmendOutcome::Conflict(ids) => {
        tracing::info!(appointment_id = %id, conflicts = ?ids, "reschedule refused");
        Err(Error::Conflict(format!(
          "slot unavailable: appointments must be at least {} minutes apart",
          window.radius.num_minutes()
        )))
      }
    }
  }

  pub async fn accept(&self, requester: &User, id: Uuid) -> Result<Appointment> {
    self.transition(requester, id, AppointmentStatus::Accepted).await
  }

  pub async fn reject(&self, requester: &User, id: Uuid) -> Result<Appointment> {
    self.transition(requester, id, AppointmentStatus::Rejected).await
  }

  async fn transition(
    &self,
    requester: &User,
    id: Uuid,
    to: AppointmentStatus,
  ) -> Result<Appointment> {
    let current = self.load(id).await?;
    if !requester.acts_for(current.veterinarian_id) {
      return Err(Error::forbidden(
        "only the veterinarian or their secretaries can decide on this appointment",
      ));
    }

    match self
      .store
      .transition_appointment(id, to)
      .await
      .map_err(Error::internal)?
    {
      TransitionOutcome::Transitioned(appointment) => {
        tracing::info!(appointment_id = %id, status = to.as_ref(), by = %requester.user_id, "appointment decided");
        Ok(appointment)
      }
      TransitionOutcome::NotFound => Err(appointment_not_found()),
      TransitionOutcome::NotPending(status) => Err(Error::forbidden(format!(
        "appointment is already {}",
        status.as_ref()
      ))),
    }
  }

  pub async fn delete(&self, requester: &User, id: Uuid) -> Result<()> {
    let current = self.load(id).await?;
    if !involved(requester, &current) {
      return Err(Error::forbidden("not a party to this appointment"));
    }
    let deleted = self
      .store
      .delete_appointment(id)
      .await
      .map_err(Error::internal)?;
    if !deleted {
      return Err(appointment_not_found());
    }
    tracing::info!(appointment_id = %id, by = %requester.user_id, "appointment deleted");
    Ok(())
  }

  /// A client's pending and accepted appointments: pending by creation time,
  /// then accepted by date.
  pub async fn list_for_client(
    &self,
    requester: &User,
    client_id: Uuid,
    page: usize,
  ) -> Result<Page<Appointment>> {
    if requester.role == Role::Client && requester.user_id != client_id {
      return Err(Error::forbidden("you can only list your own appointments"));
    }
    self.agenda(AgendaOwner::Client(client_id), Role::Client, page).await
  }

  /// A veterinarian's pending and accepted appointments, same order as
  /// [`Self::list_for_client`].
  pub async fn list_for_veterinarian(
    &self,
    requester: &User,
    veterinarian_id: Uuid,
    page: usize,
  ) -> Result<Page<Appointment>> {
    if !requester.acts_for(veterinarian_id) {
      return Err(Error::forbidden("you cannot list this veterinarian's appointments"));
    }
    self
      .agenda(AgendaOwner::Veterinarian(veterinarian_id), Role::Veterinarian, page)
      .await
  }

  async fn agenda(&self, owner: AgendaOwner, role: Role, page: usize) -> Result<Page<Appointment>> {
    let owner_id = match owner {
      AgendaOwner::Client(id) | AgendaOwner::Veterinarian(id) => id,
    };
    let exists = self
      .store
      .exists_with_role(owner_id, role)
      .await
      .map_err(Error::internal)?;
    if !exists {
      return Err(Error::not_found(format!("{} not found", role.as_ref())));
    }

    let all = self.store.list_agenda(owner).await.map_err(Error::internal)?;
    let ordered = agenda_order(all);
    if ordered.is_empty() {
      return Err(Error::not_found("no pending or accepted appointments"));
    }
    Ok(Page::slice(ordered, page, AGENDA_PAGE_SIZE))
  }

  /// Clients with at least one accepted appointment with the veterinarian,
  /// optionally narrowed to those whose first or last name contains `name`.
  pub async fn clients_with_accepted(
    &self,
    requester: &User,
    veterinarian_id: Uuid,
    name: Option<&str>,
  ) -> Result<Vec<UserSummary>> {
    if !requester.acts_for(veterinarian_id) {
      return Err(Error::forbidden("you cannot list this veterinarian's clients"));
    }
    let exists = self
      .store
      .exists_with_role(veterinarian_id, Role::Veterinarian)
      .await
      .map_err(Error::internal)?;
    if !exists {
      return Err(Error::not_found("veterinarian not found"));
    }

    let needle = non_blank(name).map(str::to_lowercase);
    let clients = self
      .store
      .clients_with_accepted(veterinarian_id)
      .await
      .map_err(Error::internal)?;

    Ok(
      clients
        .iter()
        .filter(|c| match &needle {
          Some(n) => {
            c.first_name.to_lowercase().contains(n) || c.last_name.to_lowercase().contains(n)
          }
          None => true,
        })
        .map(UserSummary::from)
        .collect(),
    )
  }

  /// The client's animals that have at least one accepted appointment with
  /// the veterinarian.
  pub async fn animals_with_accepted(
    &self,
    requester: &User,
    veterinarian_id: Uuid,
    client_id: Uuid,
  ) -> Result<Vec<Animal>> {
    if !requester.acts_for(veterinarian_id) {
      return Err(Error::forbidden("you cannot list this veterinarian's patients"));
    }
    for (id, role) in [(client_id, Role::Client), (veterinarian_id, Role::Veterinarian)] {
      let exists = self
        .store
        .exists_with_role(id, role)
        .await
        .map_err(Error::internal)?;
      if !exists {
        return Err(Error::not_found(format!("{} not found", role.as_ref())));
      }
    }

    let animals = self
      .store
      .animals_with_accepted(veterinarian_id, client_id)
      .await
      .map_err(Error::internal)?;
    if animals.is_empty() {
      return Err(Error::not_found(
        "no animal of this client has an accepted appointment with this veterinarian",
      ));
    }
    Ok(animals)
  }

  async fn load(&self, id: Uuid) -> Result<Appointment> {
    self
      .store
      .get_appointment(id)
      .await
      .map_err(Error::internal)?
      .ok_or_else(appointment_not_found)
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn appointment_not_found() -> Error { Error::not_found("appointment not found") }

fn involved(user: &User, appointment: &Appointment) -> bool {
  user.user_id == appointment.client_id || user.acts_for(appointment.veterinarian_id)
}

fn non_blank(s: Option<&str>) -> Option<&str> {
  s.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_kind(raw: &str) -> Result<AppointmentKind> {
  AppointmentKind::from_str(raw).map_err(|_| {
    Error::invalid(format!(
      "invalid appointment type {raw:?}, allowed: {}, {}",
      AppointmentKind::Household.as_ref(),
      AppointmentKind::Clinic.as_ref()
    ))
  })
}

fn clean_services(services: Vec<String>) -> Vec<String> {
  services
    .into_iter()
    .map(|s| s.trim().to_owned())
    .filter(|s| !s.is_empty())
    .collect()
}
