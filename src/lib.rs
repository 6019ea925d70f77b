//! Server side ActivityPub activity processing.
//!
//! Validates activities posted by local clients to their outbox or delivered
//! by remote servers to an inbox, applies their side effects, and
//! disseminates them to local collections and remote inboxes.

pub mod activity_pub;
pub mod config;
pub mod error;

pub use activity_pub::model::{
    Activity, ActivityType, Actor, Collection, CollectionType, Iri, Item, ItemCollection,
    Motivation, Object,
};
pub use activity_pub::{
    Client, CollectionStore, Hs2019Signer, KeyLoader, Mailman, Processor, ReadStore, Repo,
    SignRequest, WriteStore, flatten_properties,
};
pub use config::{Config, Locality};
pub use error::{Error, FanOut, Result};
