//! Opaque identifiers as they arrive from callers.

use uuid::Uuid;

use crate::{Error, Result};

/// Parse a caller-supplied id; `what` names it in the error message.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
  Uuid::parse_str(raw.trim()).map_err(|_| Error::invalid(format!("invalid {what} id: {raw:?}")))
}

/// Parse an optional id, treating a blank string as absent.
pub fn parse_opt_id(raw: Option<&str>, what: &str) -> Result<Option<Uuid>> {
  match raw.map(str::trim) {
    None | Some("") => Ok(None),
    Some(s) => parse_id(s, what).map(Some),
  }
}
