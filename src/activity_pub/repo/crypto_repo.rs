use anyhow::Result;
use fjall::{Batch, Keyspace, PartitionCreateOptions, PartitionHandle};
use secrecy::SecretSlice;

use crate::activity_pub::model::Iri;

/// PKCS#8 encoded private keys keyed by actor IRI.
#[derive(Clone)]
pub(super) struct CryptoRepo {
    key_pairs: PartitionHandle,
}

impl CryptoRepo {
    pub(super) fn new(keyspace: &Keyspace) -> Result<CryptoRepo> {
        let key_pairs = keyspace.open_partition("key_pairs", PartitionCreateOptions::default())?;
        Ok(CryptoRepo { key_pairs })
    }
    pub(super) fn insert(&self, b: &mut Batch, actor: &Iri, key_pair: &[u8]) {
        b.insert(&self.key_pairs, actor.as_str(), key_pair);
    }
    pub(super) fn find_one(&self, actor: &Iri) -> Result<Option<SecretSlice<u8>>> {
        if let Some(bytes) = self.key_pairs.get(actor.as_str())? {
            return Ok(Some(SecretSlice::from(bytes.to_vec())));
        }
        Ok(None)
    }
}
