use serde::{Deserialize, Serialize};

use super::{CollectionType, Iri, Item, Object};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(flatten)]
    pub base: Object,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbox: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbox: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub following: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liked: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Endpoints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_inbox: Option<Iri>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    pub id: Iri,
    pub owner: Iri,
    pub public_key_pem: String,
}

impl Actor {
    pub fn new(kind: &str, id: impl Into<Iri>) -> Actor {
        Actor {
            base: Object::new(kind).with_id(id),
            ..Default::default()
        }
    }
    pub fn id(&self) -> &Iri {
        &self.base.id
    }
    pub fn shared_inbox(&self) -> Option<&Iri> {
        self.endpoints.as_ref()?.shared_inbox.as_ref()
    }
    /// Where deliveries for this actor go, shared inbox first
    pub fn delivery_inbox(&self) -> Iri {
        self.shared_inbox()
            .cloned()
            .unwrap_or_else(|| self.collection_iri(CollectionType::Inbox))
    }
    pub fn collection_iri(&self, kind: CollectionType) -> Iri {
        self.declared_collection(kind)
            .unwrap_or_else(|| kind.of(&self.base.id))
    }
    pub(super) fn declared_collection(&self, kind: CollectionType) -> Option<Iri> {
        let property = match kind {
            CollectionType::Inbox => &self.inbox,
            CollectionType::Outbox => &self.outbox,
            CollectionType::Followers => &self.followers,
            CollectionType::Following => &self.following,
            CollectionType::Liked => &self.liked,
            _ => return self.base.declared_collection(kind),
        };
        property.as_ref().and_then(Item::id).cloned()
    }
    /// Fill in missing collection properties with their conventional IRIs.
    ///
    /// Returns the collections that were added.
    pub fn ensure_collections(&mut self) -> Vec<Iri> {
        let mut added = vec![];
        for kind in CollectionType::OF_ACTOR {
            let id = self.base.id.clone();
            let property = match kind {
                CollectionType::Inbox => &mut self.inbox,
                CollectionType::Outbox => &mut self.outbox,
                CollectionType::Followers => &mut self.followers,
                CollectionType::Following => &mut self.following,
                CollectionType::Liked => &mut self.liked,
                _ => continue,
            };
            if property.is_none() {
                let iri = kind.of(&id);
                *property = Some(Item::Iri(iri.clone()));
                added.push(iri);
            }
        }
        added
    }
}

impl Object {
    /// Fill in missing replies, likes and shares with their conventional IRIs.
    ///
    /// Returns the collections that were added.
    pub fn ensure_collections(&mut self) -> Vec<Iri> {
        let mut added = vec![];
        let id = self.id.clone();
        for kind in CollectionType::OF_OBJECT {
            if let Some(property) = self.collection_property_mut(kind) {
                if property.is_none() {
                    let iri = kind.of(&id);
                    *property = Some(Item::Iri(iri.clone()));
                    added.push(iri);
                }
            }
        }
        added
    }
}
