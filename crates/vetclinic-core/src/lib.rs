//! Core types and services for the veterinary clinic backend.
//!
//! This crate is free of HTTP and database dependencies. It holds the domain
//! records, the [`store::ClinicStore`] persistence trait, the
//! [`realtime::Notifier`] outbound seam, and the two services built on them:
//! the appointment [`scheduler`] and the chat [`conversation`] resolver.

// Native `async fn` in trait impls; the trait itself spells out `Send`.
#![allow(async_fn_in_trait)]

pub mod appointment;
pub mod chat;
pub mod conversation;
pub mod error;
pub mod id;
pub mod notification;
pub mod page;
pub mod realtime;
pub mod reminder;
pub mod scheduler;
pub mod store;
pub mod time;
pub mod user;

pub use error::{Error, Result};
