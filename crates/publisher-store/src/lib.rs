//! PublisherStore — source of truth for publisher identity,
//! config, status, and quota counters. Backed by PostgreSQL via `sqlx`; every
//! mutation of `blog_slots_reserved`/`total_blogs_processed` runs inside an
//! explicit transaction that takes a row-level exclusive lock
//! (`SELECT ... FOR UPDATE`) before reading the counters it's about to change.

mod reservation;
mod store;

pub use reservation::SlotReservation;
pub use store::{PublisherStore, PublisherStoreError};
