//! Base record shared by every object shaped node.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CollectionType, Iri, Item, ItemCollection};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    #[serde(default, skip_serializing_if = "Iri::is_empty")]
    pub id: Iri,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributed_to: Option<Item>,
    #[serde(default, skip_serializing_if = "ItemCollection::is_empty")]
    pub audience: ItemCollection,
    #[serde(default, skip_serializing_if = "ItemCollection::is_empty")]
    pub to: ItemCollection,
    #[serde(default, skip_serializing_if = "ItemCollection::is_empty")]
    pub bto: ItemCollection,
    #[serde(default, skip_serializing_if = "ItemCollection::is_empty")]
    pub cc: ItemCollection,
    #[serde(default, skip_serializing_if = "ItemCollection::is_empty")]
    pub bcc: ItemCollection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "ItemCollection::is_empty")]
    pub in_reply_to: ItemCollection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Item>,
    #[serde(default, skip_serializing_if = "ItemCollection::is_empty")]
    pub tag: ItemCollection,
    #[serde(default, skip_serializing_if = "ItemCollection::is_empty")]
    pub attachment: ItemCollection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<Item>,
    /// Properties outside of the core vocabulary, kept as is
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Object {
    pub fn new(kind: &str) -> Object {
        Object {
            kind: Some(kind.to_string()),
            ..Default::default()
        }
    }
    pub fn with_id(mut self, id: impl Into<Iri>) -> Object {
        self.id = id.into();
        self
    }
    pub fn type_is(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }
    /// All addressing properties, merged
    pub fn recipients(&self) -> ItemCollection {
        let mut recipients = ItemCollection::new();
        for field in [&self.to, &self.bto, &self.cc, &self.bcc, &self.audience] {
            recipients.merge(field);
        }
        recipients
    }
    /// Set union of every addressing property with `other`'s
    pub fn merge_addressing(&mut self, other: &Object) {
        self.audience.merge(&other.audience);
        self.to.merge(&other.to);
        self.bto.merge(&other.bto);
        self.cc.merge(&other.cc);
        self.bcc.merge(&other.bcc);
    }
    /// Remove an IRI from to, cc, bto and bcc
    pub fn remove_recipient(&mut self, iri: &Iri) -> bool {
        let mut removed = false;
        for field in [&mut self.to, &mut self.cc, &mut self.bto, &mut self.bcc] {
            removed |= field.remove(iri);
        }
        removed
    }
    pub(super) fn declared_collection(&self, kind: CollectionType) -> Option<Iri> {
        let property = match kind {
            CollectionType::Replies => &self.replies,
            CollectionType::Likes => &self.likes,
            CollectionType::Shares => &self.shares,
            _ => return None,
        };
        property.as_ref().and_then(Item::id).cloned()
    }
    pub(super) fn collection_property_mut(
        &mut self,
        kind: CollectionType,
    ) -> Option<&mut Option<Item>> {
        match kind {
            CollectionType::Replies => Some(&mut self.replies),
            CollectionType::Likes => Some(&mut self.likes),
            CollectionType::Shares => Some(&mut self.shares),
            _ => None,
        }
    }
}
