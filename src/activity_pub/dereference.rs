use tracing::{debug, warn};

use crate::error::Result;

use super::machine::Processor;
use super::mailman::Client;
use super::model::{CollectionType, Iri, Item, ItemCollection};
use super::repo::WriteStore;

impl<S, C> Processor<S, C>
where
    S: WriteStore + 'static,
    C: Client + 'static,
{
    /// Resolve links to full items, local store first.
    ///
    /// Embedded nodes pass through unchanged. Entries of a collection that
    /// fail to resolve keep their link; only a single link that can not be
    /// resolved is an error. Nested collections are flattened and a
    /// collection of one collapses to its element.
    pub async fn dereference(&self, item: Item) -> Result<Item> {
        match item {
            Item::Iri(iri) => self.load_iri(&iri).await,
            Item::Items(items) => {
                let mut entries = vec![];
                collect_nested(items, &mut entries);
                let mut resolved = ItemCollection::new();
                for entry in entries {
                    let Item::Iri(iri) = entry else {
                        resolved.append(entry);
                        continue;
                    };
                    match self.load_iri(&iri).await {
                        Ok(item) => resolved.append(item),
                        Err(error) => {
                            warn!(target: "apub::deref", %iri, %error, "keeping unresolved link");
                            resolved.append(Item::Iri(iri))
                        }
                    };
                }
                if resolved.len() == 1 {
                    if let Some(single) = resolved.into_iter().next() {
                        return Ok(single);
                    }
                    return Ok(Item::Items(ItemCollection::new()));
                }
                Ok(Item::Items(resolved))
            }
            other => Ok(other),
        }
    }

    pub(super) async fn dereference_or_keep(&self, item: Item) -> Item {
        let link = item.link();
        match self.dereference(item.clone()).await {
            Ok(resolved) => resolved,
            Err(error) => {
                warn!(target: "apub::deref", iri = %link, %error, "keeping unresolved link");
                item
            }
        }
    }

    pub(super) async fn load_iri(&self, iri: &Iri) -> Result<Item> {
        match self.store.load(iri).await {
            Ok(item) => Ok(item),
            Err(error) if error.is_not_found() && !self.is_local(iri) => {
                debug!(target: "apub::deref", %iri, "fetch remote item");
                self.client.load_iri(iri).await
            }
            Err(error) => Err(error),
        }
    }

    pub(super) async fn collection_of(&self, owner: &Item, kind: CollectionType) -> Iri {
        if let Item::Iri(iri) = owner {
            if self.is_local(iri) {
                if let Ok(loaded) = self.store.load(iri).await {
                    return loaded.collection_iri(kind);
                }
            }
        }
        owner.collection_iri(kind)
    }

    pub(super) async fn is_member(&self, collection: &Iri, iri: &Iri) -> bool {
        match self.store.load(collection).await {
            Ok(Item::Collection(collection)) => collection.contains(iri),
            _ => false,
        }
    }
}

fn collect_nested(items: ItemCollection, entries: &mut Vec<Item>) {
    for item in items {
        match item {
            Item::Items(nested) => collect_nested(nested, entries),
            item => entries.push(item),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use crate::activity_pub::model::{CollectionType, Item, ItemCollection};
    use crate::activity_pub::testing::{JOHN, TestEnv, local, remote};

    #[tokio::test]
    async fn local_first_then_remote() -> Result<()> {
        let env = TestEnv::new().await?;
        let john = env.processor.dereference(Item::from(local(JOHN))).await?;
        assert!(john.is_actor());
        assert!(env.client.fetched().is_empty());

        env.client.serve(Item::from_value(json!({
            "type": "Person",
            "id": remote("bob"),
            "inbox": remote("bob").join("inbox")
        }))?);
        let bob = env.processor.dereference(Item::from(remote("bob"))).await?;
        assert!(bob.is_actor());
        assert_eq!(env.client.fetched(), vec![remote("bob")]);
        Ok(())
    }

    #[tokio::test]
    async fn missing_local_items_are_not_fetched() -> Result<()> {
        let env = TestEnv::new().await?;
        let missing = local("nobody");
        let err = env
            .processor
            .dereference(Item::from(missing))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(env.client.fetched().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn collections_keep_unresolved_links() -> Result<()> {
        let env = TestEnv::new().await?;
        let note = Item::from_value(json!({"type": "Note", "content": "inline"}))?;
        let nested: ItemCollection = [Item::from(remote("ghost"))].into_iter().collect();
        let items: ItemCollection = [
            Item::from(local(JOHN)),
            Item::Items(nested),
            note.clone(),
        ]
        .into_iter()
        .collect();
        let Item::Items(resolved) = env.processor.dereference(Item::Items(items)).await? else {
            panic!("expected a collection");
        };
        assert_eq!(resolved.len(), 3);
        assert!(resolved.iter().next().is_some_and(Item::is_actor));
        assert!(resolved.iter().nth(1).is_some_and(Item::is_link));
        assert_eq!(resolved.iter().nth(2), Some(&note));
        Ok(())
    }

    #[tokio::test]
    async fn singleton_collapses() -> Result<()> {
        let env = TestEnv::new().await?;
        let items: ItemCollection = [Item::from(local(JOHN))].into_iter().collect();
        let resolved = env.processor.dereference(Item::Items(items)).await?;
        assert!(resolved.is_actor());
        assert_eq!(
            resolved.collection_iri(CollectionType::Outbox),
            local(JOHN).join("outbox")
        );
        Ok(())
    }
}
