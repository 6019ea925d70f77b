//! ActivityPub activity processing.
//!
//! [`Processor`] is the engine: it validates client and server activities,
//! applies their side effects to a [`WriteStore`], resolves recipients and
//! disseminates through a [`Client`]. Each processing concern lives in its
//! own module as an `impl` block of the processor.

mod content;
mod delivery;
mod dereference;
mod flatten;
mod hs2019;
mod machine;
mod mailman;
mod object_serde;
mod reactions;
mod recipients;
mod repo;
mod undo;
mod validate;

pub mod model;

#[cfg(test)]
pub(crate) mod testing;

pub use flatten::flatten_properties;
pub use hs2019::{Hs2019Signer, SignRequest};
pub use machine::Processor;
pub use mailman::{Client, Mailman};
pub use repo::{CollectionStore, KeyLoader, ReadStore, Repo, WriteStore};
