use anyhow::Result;
use fjall::{Batch, Keyspace, PartitionCreateOptions, PartitionHandle};

use crate::activity_pub::model::{Iri, Item};
use crate::activity_pub::object_serde::ObjectSerDe;

/// Flattened items keyed by their IRI.
#[derive(Clone)]
pub(super) struct ObjectRepo {
    objects: PartitionHandle,
}

impl ObjectRepo {
    pub(super) fn new(keyspace: &Keyspace) -> Result<ObjectRepo> {
        let objects = keyspace.open_partition("objects", PartitionCreateOptions::default())?;
        Ok(ObjectRepo { objects })
    }
    pub(super) fn insert(&self, b: &mut Batch, iri: &Iri, item: &Item) -> Result<()> {
        let bytes = item.to_bytes()?;
        b.insert(&self.objects, iri.as_str(), bytes);
        Ok(())
    }
    pub(super) fn remove(&self, b: &mut Batch, iri: &Iri) {
        b.remove(&self.objects, iri.as_str());
    }
    pub(super) fn contains(&self, iri: &Iri) -> Result<bool> {
        Ok(self.objects.contains_key(iri.as_str())?)
    }
    pub(super) fn find_one(&self, iri: &Iri) -> Result<Option<Item>> {
        if let Some(bytes) = self.objects.get(iri.as_str())? {
            let item = Item::from_bytes(&bytes)?;
            return Ok(Some(item));
        }
        Ok(None)
    }
}
