use serde::{Deserialize, Serialize};

use super::{ActivityType, Iri, Item, Object};

/// Activity or intransitive activity, the latter simply has no `object`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(flatten)]
    pub base: Object,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<Item>,
}

impl Activity {
    pub fn new(kind: ActivityType) -> Activity {
        Activity {
            base: Object::new(kind.as_str()),
            ..Default::default()
        }
    }
    pub fn with_id(mut self, id: impl Into<Iri>) -> Activity {
        self.base.id = id.into();
        self
    }
    pub fn with_actor(mut self, actor: impl Into<Item>) -> Activity {
        self.actor = Some(actor.into());
        self
    }
    pub fn with_object(mut self, object: impl Into<Item>) -> Activity {
        self.object = Some(object.into());
        self
    }
    pub fn id(&self) -> &Iri {
        &self.base.id
    }
    pub fn activity_type(&self) -> Option<ActivityType> {
        self.base.kind.as_deref()?.parse().ok()
    }
    pub fn is_intransitive(&self) -> bool {
        self.activity_type().is_some_and(|t| t.is_intransitive())
    }
    pub fn actor_iri(&self) -> Option<&Iri> {
        self.actor.as_ref().and_then(Item::id)
    }
    pub fn object_iri(&self) -> Option<&Iri> {
        self.object.as_ref().and_then(Item::id)
    }
}
