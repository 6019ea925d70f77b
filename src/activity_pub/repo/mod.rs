//! Storage seam of the processor and its fjall backed reference store.

mod collection_index;
mod crypto_repo;
mod object_repo;

use async_trait::async_trait;
use fjall::Keyspace;
use secrecy::SecretSlice;
use tracing::debug;
use uuid::Uuid;

use crate::activity_pub::model::{Collection, Iri, Item};
use crate::error::{Error, Result};

use self::collection_index::CollectionIndex;
use self::crypto_repo::CryptoRepo;
use self::object_repo::ObjectRepo;

#[async_trait]
pub trait ReadStore: Send + Sync {
    /// Fails with [`Error::NotFound`] when nothing is stored under `iri`.
    async fn load(&self, iri: &Iri) -> Result<Item>;
}

#[async_trait]
pub trait WriteStore: ReadStore {
    /// Persist a new item, fails with [`Error::DuplicateKey`] if the id is taken.
    async fn save(&self, item: Item) -> Result<Item>;
    /// Replace an existing item.
    async fn update(&self, item: Item) -> Result<Item> {
        self.delete(&item).await?;
        self.save(item).await
    }
    async fn delete(&self, item: &Item) -> Result<()>;
    async fn generate_id(&self, item: &Item, part_of: &Iri) -> Result<Iri>;

    /// Collection capability, needed for every collection side effect.
    fn collections(&self) -> Option<&dyn CollectionStore> {
        None
    }
    /// Key loading capability, needed for remote dissemination.
    fn keys(&self) -> Option<&dyn KeyLoader> {
        None
    }
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Creating a collection that already exists returns the stored one.
    async fn create(&self, collection: Collection) -> Result<Collection>;
    async fn add_to(&self, collection: &Iri, item: &Item) -> Result<()>;
    async fn remove_from(&self, collection: &Iri, item: &Item) -> Result<()>;
}

#[async_trait]
pub trait KeyLoader: Send + Sync {
    /// PKCS#8 encoded private key of a local actor.
    async fn load_key(&self, actor: &Iri) -> Result<SecretSlice<u8>>;
}

/// Reference store over a fjall keyspace.
#[derive(Clone)]
pub struct Repo {
    keyspace: Keyspace,
    objects: ObjectRepo,
    members: CollectionIndex,
    keys: CryptoRepo,
}

impl Repo {
    pub fn new(keyspace: Keyspace) -> anyhow::Result<Repo> {
        let objects = ObjectRepo::new(&keyspace)?;
        let members = CollectionIndex::new(&keyspace)?;
        let keys = CryptoRepo::new(&keyspace)?;
        Ok(Repo {
            keyspace,
            objects,
            members,
            keys,
        })
    }
    pub fn insert_key(&self, actor: &Iri, pkcs8: &[u8]) -> anyhow::Result<()> {
        let mut b = self.keyspace.batch();
        self.keys.insert(&mut b, actor, pkcs8);
        b.commit()?;
        Ok(())
    }
    fn persistent_id(item: &Item) -> Result<&Iri> {
        match item {
            Item::Iri(_) | Item::Items(_) => Err(Error::bad_request("only objects can be stored")),
            _ => item
                .id()
                .ok_or_else(|| Error::bad_request("transient item can not be stored")),
        }
    }
    /// Collections are stored bare, their members live in the index.
    fn store_collection(&self, mut collection: Collection) -> anyhow::Result<Collection> {
        let iri = collection.id().clone();
        let members = std::mem::take(collection.members_mut());
        collection.total_items = None;
        let mut b = self.keyspace.batch();
        self.objects
            .insert(&mut b, &iri, &Item::from(collection.clone()))?;
        for member in members.iris() {
            self.members.insert(&mut b, &iri, &member)?;
        }
        b.commit()?;
        Ok(collection)
    }
    fn with_members(&self, mut collection: Collection) -> anyhow::Result<Collection> {
        let members = self.members.find_all(collection.id())?;
        collection.total_items = Some(members.len() as u64);
        *collection.members_mut() = members.into_iter().collect();
        Ok(collection)
    }
}

#[async_trait]
impl ReadStore for Repo {
    async fn load(&self, iri: &Iri) -> Result<Item> {
        match self.objects.find_one(iri)? {
            Some(Item::Collection(collection)) => Ok(self.with_members(*collection)?.into()),
            Some(item) => Ok(item),
            None => Err(Error::not_found(format!("{iri} is not stored"))),
        }
    }
}

#[async_trait]
impl WriteStore for Repo {
    async fn save(&self, item: Item) -> Result<Item> {
        let iri = Self::persistent_id(&item)?.clone();
        if self.objects.contains(&iri)? {
            return Err(Error::DuplicateKey(iri.to_string()));
        }
        debug!(target: "apub::repo", %iri, "save");
        if let Item::Collection(collection) = item {
            return Ok(self.store_collection(*collection)?.into());
        }
        let mut b = self.keyspace.batch();
        self.objects.insert(&mut b, &iri, &item)?;
        b.commit().map_err(anyhow::Error::from)?;
        Ok(item)
    }
    async fn update(&self, item: Item) -> Result<Item> {
        let iri = Self::persistent_id(&item)?.clone();
        if !self.objects.contains(&iri)? {
            return Err(Error::not_found(format!("{iri} is not stored")));
        }
        debug!(target: "apub::repo", %iri, "update");
        let mut b = self.keyspace.batch();
        self.objects.insert(&mut b, &iri, &item)?;
        b.commit().map_err(anyhow::Error::from)?;
        Ok(item)
    }
    async fn delete(&self, item: &Item) -> Result<()> {
        let Some(iri) = item.id() else {
            return Err(Error::bad_request("transient item can not be deleted"));
        };
        debug!(target: "apub::repo", %iri, "delete");
        let mut b = self.keyspace.batch();
        self.objects.remove(&mut b, iri);
        self.members.clear(&mut b, iri)?;
        b.commit().map_err(anyhow::Error::from)?;
        Ok(())
    }
    async fn generate_id(&self, _item: &Item, part_of: &Iri) -> Result<Iri> {
        Ok(part_of.join(&Uuid::now_v7().to_string()))
    }
    fn collections(&self) -> Option<&dyn CollectionStore> {
        Some(self)
    }
    fn keys(&self) -> Option<&dyn KeyLoader> {
        Some(self)
    }
}

#[async_trait]
impl CollectionStore for Repo {
    async fn create(&self, collection: Collection) -> Result<Collection> {
        let iri = collection.id().clone();
        if iri.is_empty() {
            return Err(Error::bad_request("collection without id"));
        }
        if let Some(Item::Collection(stored)) = self.objects.find_one(&iri)? {
            return Ok(self.with_members(*stored)?);
        }
        debug!(target: "apub::repo", %iri, "create collection");
        Ok(self.store_collection(collection)?)
    }
    async fn add_to(&self, collection: &Iri, item: &Item) -> Result<()> {
        let Some(member) = item.id() else {
            return Err(Error::bad_request(format!(
                "transient item can not be added to {collection}"
            )));
        };
        if self.members.contains(collection, member)? {
            return Ok(());
        }
        let mut b = self.keyspace.batch();
        if !self.objects.contains(collection)? {
            let bare = Collection::new(collection.clone()).ordered();
            self.objects.insert(&mut b, collection, &Item::from(bare))?;
        }
        if self.members.insert(&mut b, collection, member)? {
            debug!(target: "apub::repo", %collection, %member, "add to collection");
        }
        b.commit().map_err(anyhow::Error::from)?;
        Ok(())
    }
    async fn remove_from(&self, collection: &Iri, item: &Item) -> Result<()> {
        let Some(member) = item.id() else {
            return Err(Error::bad_request(format!(
                "transient item is not a member of {collection}"
            )));
        };
        let mut b = self.keyspace.batch();
        if self.members.remove(&mut b, collection, member)? {
            debug!(target: "apub::repo", %collection, %member, "remove from collection");
        }
        b.commit().map_err(anyhow::Error::from)?;
        Ok(())
    }
}

#[async_trait]
impl KeyLoader for Repo {
    async fn load_key(&self, actor: &Iri) -> Result<SecretSlice<u8>> {
        self.keys
            .find_one(actor)?
            .ok_or_else(|| Error::not_found(format!("no key pair stored for {actor}")))
    }
}
