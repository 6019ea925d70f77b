//! Fixtures shared by the processing tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use aws_lc_rs::encoding::AsDer;
use aws_lc_rs::rsa::{KeySize, PrivateDecryptingKey};
use reqwest::StatusCode;
use secrecy::SecretSlice;
use tempfile::{TempDir, tempdir};

use crate::config::Config;
use crate::error::Error;

use super::hs2019::SignRequest;
use super::machine::Processor;
use super::mailman::Client;
use super::model::{Actor, Collection, Iri, Item};
use super::repo::{CollectionStore, KeyLoader, ReadStore, Repo, WriteStore};

pub(crate) const JOHN: &str = "john";
pub(crate) const JANE: &str = "jane";

const BASE_URL: &str = "https://social.example.com";

pub(crate) fn local(name: &str) -> Iri {
    Iri::from(format!("{BASE_URL}/users/{name}"))
}

pub(crate) fn remote(name: &str) -> Iri {
    Iri::from(format!("https://remote.example/users/{name}"))
}

static RSA_KEY: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let key = PrivateDecryptingKey::generate(KeySize::Rsa2048).expect("rsa key generation");
    key.as_der().expect("pkcs8 encoding").as_ref().to_vec()
});

/// PKCS#8 encoded RSA key, generated once per test binary.
pub(crate) fn rsa_private_key() -> SecretSlice<u8> {
    SecretSlice::from(RSA_KEY.clone())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// One recorded push.
#[derive(Debug, Clone)]
pub(crate) struct Push {
    pub(crate) collection: Iri,
    pub(crate) item: Item,
    pub(crate) signed: bool,
}

/// [`Client`] that serves canned items and records pushes.
#[derive(Default)]
pub(crate) struct MockClient {
    served: Mutex<HashMap<Iri, Item>>,
    fetched: Mutex<Vec<Iri>>,
    pushes: Mutex<Vec<Push>>,
    failing: Mutex<HashSet<Iri>>,
}

impl MockClient {
    pub(crate) fn serve(&self, item: Item) {
        let iri = item.link();
        self.served.lock().unwrap().insert(iri, item);
    }
    pub(crate) fn fail_on(&self, collection: Iri) {
        self.failing.lock().unwrap().insert(collection);
    }
    pub(crate) fn fetched(&self) -> Vec<Iri> {
        self.fetched.lock().unwrap().clone()
    }
    pub(crate) fn pushes(&self) -> Vec<Push> {
        self.pushes.lock().unwrap().clone()
    }
    /// Collections that accepted a push, in push order.
    pub(crate) fn pushed_to(&self) -> Vec<Iri> {
        self.pushes()
            .into_iter()
            .map(|push| push.collection)
            .collect()
    }
}

#[async_trait]
impl Client for MockClient {
    async fn load_iri(&self, iri: &Iri) -> crate::error::Result<Item> {
        self.fetched.lock().unwrap().push(iri.clone());
        self.served
            .lock()
            .unwrap()
            .get(iri)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("{iri} is not served")))
    }

    async fn push_to_collection(
        &self,
        collection: &Iri,
        item: &Item,
        signer: Option<&dyn SignRequest>,
    ) -> crate::error::Result<StatusCode> {
        if self.failing.lock().unwrap().contains(collection) {
            return Err(Error::Other(anyhow::anyhow!("{collection} is down")));
        }
        let signed = match signer {
            Some(signer) => {
                let url = reqwest::Url::parse(collection.as_str()).map_err(anyhow::Error::from)?;
                let body = serde_json::to_vec(item).map_err(anyhow::Error::from)?;
                signer.sign_post(&url, &body)?.contains_key("signature")
            }
            None => false,
        };
        self.pushes.lock().unwrap().push(Push {
            collection: collection.clone(),
            item: item.clone(),
            signed,
        });
        Ok(StatusCode::ACCEPTED)
    }
}

/// A processor over a temporary store with two local actors, john and jane.
pub(crate) struct TestEnv {
    _tmp_dir: TempDir,
    pub(crate) repo: Arc<Repo>,
    pub(crate) client: Arc<MockClient>,
    pub(crate) processor: Processor<Repo, MockClient>,
}

impl TestEnv {
    pub(crate) async fn new() -> Result<TestEnv> {
        TestEnv::with_config(test_config()).await
    }
    pub(crate) async fn with_shared_inbox() -> Result<TestEnv> {
        let mut config = test_config();
        config.activity_pub.shared_inbox = Some(format!("{BASE_URL}/inbox"));
        TestEnv::with_config(config).await
    }
    pub(crate) async fn with_async_delivery() -> Result<TestEnv> {
        let mut config = test_config();
        config.delivery.async_delivery = true;
        TestEnv::with_config(config).await
    }

    async fn with_config(config: Config) -> Result<TestEnv> {
        init_tracing();
        let tmp_dir = tempdir()?;
        let keyspace = fjall::Config::new(tmp_dir.path()).temporary(true).open()?;
        let repo = Arc::new(Repo::new(keyspace)?);
        let client = Arc::new(MockClient::default());
        let processor = Processor::new(&config, repo.clone(), client.clone());

        let pkcs8 = RSA_KEY.as_slice();
        for name in [JOHN, JANE] {
            let mut actor = Actor::new("Person", local(name));
            actor.preferred_username = Some(name.to_string());
            for collection in actor.ensure_collections() {
                repo.create(Collection::new(collection).ordered()).await?;
            }
            repo.save(Item::from(actor)).await?;
            repo.insert_key(&local(name), pkcs8)?;
        }
        Ok(TestEnv {
            _tmp_dir: tmp_dir,
            repo,
            client,
            processor,
        })
    }

    /// A processor over the same store with some capabilities hidden.
    pub(crate) fn limited(
        &self,
        collections: bool,
        keys: bool,
    ) -> Processor<LimitedStore, MockClient> {
        let store = LimitedStore {
            repo: self.repo.clone(),
            collections,
            keys,
        };
        Processor::new(&test_config(), Arc::new(store), self.client.clone())
    }

    pub(crate) async fn actor(&self, name: &str) -> Result<Actor> {
        let item = self.repo.load(&local(name)).await?;
        item.into_actor()
            .ok_or_else(|| anyhow::anyhow!("{name} is not an actor"))
    }

    /// Members of a stored collection, none for unknown collections.
    pub(crate) async fn members(&self, collection: &Iri) -> Result<Vec<Iri>> {
        match self.repo.load(collection).await {
            Ok(Item::Collection(collection)) => Ok(collection.members().iris()),
            Ok(other) => anyhow::bail!("{collection} is a {:?}", other.kind()),
            Err(error) if error.is_not_found() => Ok(vec![]),
            Err(error) => Err(error.into()),
        }
    }
}

/// [`Repo`] that may hide its collection and key capabilities.
pub(crate) struct LimitedStore {
    repo: Arc<Repo>,
    collections: bool,
    keys: bool,
}

#[async_trait]
impl ReadStore for LimitedStore {
    async fn load(&self, iri: &Iri) -> crate::error::Result<Item> {
        self.repo.load(iri).await
    }
}

#[async_trait]
impl WriteStore for LimitedStore {
    async fn save(&self, item: Item) -> crate::error::Result<Item> {
        self.repo.save(item).await
    }
    async fn delete(&self, item: &Item) -> crate::error::Result<()> {
        self.repo.delete(item).await
    }
    async fn generate_id(&self, item: &Item, part_of: &Iri) -> crate::error::Result<Iri> {
        self.repo.generate_id(item, part_of).await
    }
    fn collections(&self) -> Option<&dyn CollectionStore> {
        self.repo.collections().filter(|_| self.collections)
    }
    fn keys(&self) -> Option<&dyn KeyLoader> {
        self.repo.keys().filter(|_| self.keys)
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.activity_pub.base_url = BASE_URL.to_string();
    config
}
