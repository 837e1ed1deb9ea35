//! Board Provider adapters: one vendor-specific implementation of
//! [`marcus_core::BoardProvider`] per supported kanban backend, plus an
//! in-memory stand-in used by tests and the default configuration.
//!
//! Each adapter owns its own list-name/status mapping table and label/priority
//! table: the core never sees a raw vendor payload, only a normalized
//! [`marcus_core::Task`].

pub mod github;
pub mod http_retry;
pub mod in_memory;
pub mod linear;
pub mod planka;

pub use github::GitHubProjectsProvider;
pub use in_memory::InMemoryBoardProvider;
pub use linear::LinearProvider;
pub use planka::PlankaProvider;
