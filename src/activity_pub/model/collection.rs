use serde::{Deserialize, Serialize};

use super::{CollectionKind, Iri, Item, ItemCollection, Object};

/// Stored collection with its membership.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(flatten)]
    pub base: Object,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
    #[serde(default, skip_serializing_if = "ItemCollection::is_empty")]
    pub items: ItemCollection,
    #[serde(default, skip_serializing_if = "ItemCollection::is_empty")]
    pub ordered_items: ItemCollection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Item>,
}

impl Collection {
    pub fn new(id: impl Into<Iri>) -> Collection {
        Collection {
            base: Object::new(CollectionKind::Collection.as_str()).with_id(id),
            ..Default::default()
        }
    }
    pub fn ordered(mut self) -> Collection {
        self.base.kind = Some(CollectionKind::OrderedCollection.to_string());
        self.ordered_items.merge(&self.items);
        self.items = ItemCollection::new();
        self
    }
    pub fn with_items(mut self, items: impl IntoIterator<Item = Item>) -> Collection {
        for item in items {
            self.members_mut().append(item);
        }
        self.total_items = Some(self.members().len() as u64);
        self
    }
    pub fn id(&self) -> &Iri {
        &self.base.id
    }
    pub fn is_ordered(&self) -> bool {
        matches!(
            self.base.kind.as_deref(),
            Some("OrderedCollection" | "OrderedCollectionPage")
        )
    }
    pub fn members(&self) -> &ItemCollection {
        if self.is_ordered() || (self.items.is_empty() && !self.ordered_items.is_empty()) {
            &self.ordered_items
        } else {
            &self.items
        }
    }
    pub fn members_mut(&mut self) -> &mut ItemCollection {
        if self.is_ordered() {
            &mut self.ordered_items
        } else {
            &mut self.items
        }
    }
    pub fn contains(&self, iri: &Iri) -> bool {
        self.members().contains(iri)
    }
}
