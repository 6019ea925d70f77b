mod activity;
mod actor;
mod collection;
mod iri;
mod item;
mod object;
mod vocab;

pub use activity::Activity;
pub use actor::{Actor, Endpoints, PublicKey};
pub use collection::Collection;
pub use iri::{Iri, PUBLIC_NS};
pub use item::{Item, ItemCollection};
pub use object::Object;
pub use vocab::{ActivityType, ActorType, CollectionKind, CollectionType, Motivation, UnknownType};
