use anyhow::{Context, Result};
use fjall::{Batch, Keyspace, PartitionCreateOptions, PartitionHandle, UserKey};
use uuid::Uuid;

use crate::activity_pub::model::Iri;

/// `{collection}\0{sort key}` in the members index
struct MemberKey<'a> {
    collection: &'a Iri,
    sort_key: Uuid,
}

impl From<MemberKey<'_>> for UserKey {
    fn from(value: MemberKey<'_>) -> Self {
        let mut key = collection_prefix(value.collection);
        key.extend_from_slice(value.sort_key.as_bytes());
        key.into()
    }
}

/// `{collection}\0{item}` in the lookup index
struct LookupKey<'a> {
    collection: &'a Iri,
    item: &'a Iri,
}

impl From<LookupKey<'_>> for UserKey {
    fn from(value: LookupKey<'_>) -> Self {
        let mut key = collection_prefix(value.collection);
        key.extend_from_slice(value.item.as_str().as_bytes());
        key.into()
    }
}

fn collection_prefix(collection: &Iri) -> Vec<u8> {
    let mut key = Vec::with_capacity(collection.as_str().len() + 17);
    key.extend_from_slice(collection.as_str().as_bytes());
    key.push(0);
    key
}

/// Membership of collections in insertion order.
///
/// Members are kept as IRIs only, a collection never stores an item body.
#[derive(Clone)]
pub(super) struct CollectionIndex {
    members: PartitionHandle,
    lookup: PartitionHandle,
}

impl CollectionIndex {
    pub(super) fn new(keyspace: &Keyspace) -> Result<CollectionIndex> {
        let options = PartitionCreateOptions::default();
        let members = keyspace.open_partition("collection_members", options.clone())?;
        let lookup = keyspace.open_partition("collection_lookup", options)?;
        Ok(CollectionIndex { members, lookup })
    }
    /// Returns false when the item is already a member.
    pub(super) fn insert(&self, b: &mut Batch, collection: &Iri, item: &Iri) -> Result<bool> {
        let lookup_key: UserKey = LookupKey { collection, item }.into();
        if self.lookup.contains_key(&lookup_key)? {
            return Ok(false);
        }
        let sort_key = Uuid::now_v7();
        b.insert(&self.lookup, lookup_key, sort_key.as_bytes().to_vec());
        b.insert(
            &self.members,
            MemberKey {
                collection,
                sort_key,
            },
            item.as_str(),
        );
        Ok(true)
    }
    /// Returns false when the item was not a member.
    pub(super) fn remove(&self, b: &mut Batch, collection: &Iri, item: &Iri) -> Result<bool> {
        let lookup_key: UserKey = LookupKey { collection, item }.into();
        let Some(sort_key) = self.lookup.get(&lookup_key)? else {
            return Ok(false);
        };
        let sort_key = Uuid::from_slice(&sort_key).context("corrupted collection index")?;
        b.remove(&self.lookup, lookup_key);
        b.remove(
            &self.members,
            MemberKey {
                collection,
                sort_key,
            },
        );
        Ok(true)
    }
    pub(super) fn contains(&self, collection: &Iri, item: &Iri) -> Result<bool> {
        Ok(self.lookup.contains_key(UserKey::from(LookupKey { collection, item }))?)
    }
    pub(super) fn find_all(&self, collection: &Iri) -> Result<Vec<Iri>> {
        let mut items = vec![];
        for pair in self.members.prefix(collection_prefix(collection)) {
            let (_, item) = pair?;
            let item = std::str::from_utf8(&item).context("corrupted collection index")?;
            items.push(Iri::from(item));
        }
        Ok(items)
    }
    pub(super) fn clear(&self, b: &mut Batch, collection: &Iri) -> Result<()> {
        let prefix = collection_prefix(collection);
        for pair in self.members.prefix(&prefix) {
            let (key, _) = pair?;
            b.remove(&self.members, key);
        }
        for pair in self.lookup.prefix(&prefix) {
            let (key, _) = pair?;
            b.remove(&self.lookup, key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use fjall::Config;
    use tempfile::tempdir;

    use super::{CollectionIndex, Iri};

    #[test]
    fn membership_keeps_insertion_order() -> Result<()> {
        let tmp_dir = tempdir()?;
        let keyspace = Config::new(tmp_dir.path()).temporary(true).open()?;
        let index = CollectionIndex::new(&keyspace)?;
        let outbox = Iri::from("https://social.example.com/users/john/outbox");
        let first = Iri::from("https://social.example.com/activities/1");
        let second = Iri::from("https://social.example.com/activities/2");

        let mut b = keyspace.batch();
        assert!(index.insert(&mut b, &outbox, &first)?);
        b.commit()?;
        let mut b = keyspace.batch();
        assert!(index.insert(&mut b, &outbox, &second)?);
        b.commit()?;
        let mut b = keyspace.batch();
        assert!(!index.insert(&mut b, &outbox, &first)?);
        b.commit()?;
        assert_eq!(index.find_all(&outbox)?, vec![first.clone(), second.clone()]);

        let mut b = keyspace.batch();
        assert!(index.remove(&mut b, &outbox, &first)?);
        b.commit()?;
        assert!(!index.contains(&outbox, &first)?);
        assert_eq!(index.find_all(&outbox)?, vec![second]);
        Ok(())
    }

    #[test]
    fn prefixes_do_not_overlap() -> Result<()> {
        let tmp_dir = tempdir()?;
        let keyspace = Config::new(tmp_dir.path()).temporary(true).open()?;
        let index = CollectionIndex::new(&keyspace)?;
        let likes = Iri::from("https://social.example.com/notes/1/likes");
        let liked = Iri::from("https://social.example.com/notes/1/likesx");
        let mut b = keyspace.batch();
        index.insert(&mut b, &liked, &Iri::from("https://a.example/1"))?;
        b.commit()?;
        assert!(index.find_all(&likes)?.is_empty());

        let mut b = keyspace.batch();
        index.clear(&mut b, &liked)?;
        b.commit()?;
        assert!(index.find_all(&liked)?.is_empty());
        Ok(())
    }
}
