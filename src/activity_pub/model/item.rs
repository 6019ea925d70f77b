use anyhow::{Result, bail};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{Activity, ActivityType, Actor, ActorType, Collection, CollectionKind, CollectionType};
use super::{Iri, Object};

/// Polymorphic root of every ActivityStreams node.
///
/// Actors, activities and collections share the [`Object`] base record and add
/// their own fields on top of it. Use the `as_*` accessors to check whether an
/// item has a given shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Iri(Iri),
    Object(Box<Object>),
    Actor(Box<Actor>),
    Activity(Box<Activity>),
    Collection(Box<Collection>),
    Items(ItemCollection),
}

impl Item {
    /// Non-empty identifier of the item, if any
    pub fn id(&self) -> Option<&Iri> {
        let id = match self {
            Item::Iri(iri) => iri,
            Item::Items(_) => return None,
            _ => &self.as_object()?.id,
        };
        (!id.is_empty()).then_some(id)
    }
    /// The identifier or an empty IRI for transient items
    pub fn link(&self) -> Iri {
        self.id().cloned().unwrap_or_default()
    }
    pub fn kind(&self) -> Option<&str> {
        self.as_object()?.kind.as_deref()
    }
    pub fn is_link(&self) -> bool {
        matches!(self, Item::Iri(_))
    }
    pub fn is_actor(&self) -> bool {
        matches!(self, Item::Actor(_))
    }
    pub fn is_activity(&self) -> bool {
        matches!(self, Item::Activity(_))
    }
    pub fn is_collection(&self) -> bool {
        matches!(self, Item::Collection(_) | Item::Items(_))
    }
    /// An activity without object, e.g. Question or Travel
    pub fn is_intransitive_activity(&self) -> bool {
        self.as_activity().is_some_and(Activity::is_intransitive)
    }
    /// Shared base record of object shaped items
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Item::Object(object) => Some(object),
            Item::Actor(actor) => Some(&actor.base),
            Item::Activity(activity) => Some(&activity.base),
            Item::Collection(collection) => Some(&collection.base),
            Item::Iri(_) | Item::Items(_) => None,
        }
    }
    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match self {
            Item::Object(object) => Some(object),
            Item::Actor(actor) => Some(&mut actor.base),
            Item::Activity(activity) => Some(&mut activity.base),
            Item::Collection(collection) => Some(&mut collection.base),
            Item::Iri(_) | Item::Items(_) => None,
        }
    }
    pub fn as_actor(&self) -> Option<&Actor> {
        match self {
            Item::Actor(actor) => Some(actor),
            _ => None,
        }
    }
    pub fn as_activity(&self) -> Option<&Activity> {
        match self {
            Item::Activity(activity) => Some(activity),
            _ => None,
        }
    }
    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Item::Collection(collection) => Some(collection),
            _ => None,
        }
    }
    pub fn into_activity(self) -> Option<Activity> {
        match self {
            Item::Activity(activity) => Some(*activity),
            _ => None,
        }
    }
    pub fn into_actor(self) -> Option<Actor> {
        match self {
            Item::Actor(actor) => Some(*actor),
            _ => None,
        }
    }
    /// IRI of one of the item's named collections.
    ///
    /// Uses the item's own property when it declares one, otherwise the
    /// `{id}/{name}` convention.
    pub fn collection_iri(&self, kind: CollectionType) -> Iri {
        let declared = match self {
            Item::Actor(actor) => actor.declared_collection(kind),
            _ => self.as_object().and_then(|o| o.declared_collection(kind)),
        };
        declared.unwrap_or_else(|| kind.of(&self.link()))
    }

    pub fn from_value(value: Value) -> Result<Item> {
        let item = match value {
            Value::String(iri) => Item::Iri(Iri::from(iri)),
            Value::Array(values) => Item::Items(
                values
                    .into_iter()
                    .map(Item::from_value)
                    .collect::<Result<ItemCollection>>()?,
            ),
            Value::Object(_) => {
                let kind = node_type(&value);
                match kind.as_deref() {
                    Some(kind) if kind.parse::<ActivityType>().is_ok() => {
                        Item::Activity(Box::new(serde_json::from_value(value)?))
                    }
                    Some(kind) if kind.parse::<ActorType>().is_ok() => {
                        Item::Actor(Box::new(serde_json::from_value(value)?))
                    }
                    Some(kind) if kind.parse::<CollectionKind>().is_ok() => {
                        Item::Collection(Box::new(serde_json::from_value(value)?))
                    }
                    _ => Item::Object(Box::new(serde_json::from_value(value)?)),
                }
            }
            other => bail!("{other} is not an ActivityStreams node"),
        };
        Ok(item)
    }
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// First type of a node, `type` or `@type`, single or array valued
pub(crate) fn node_type(value: &Value) -> Option<String> {
    let kind = match value.get("type").or_else(|| value.get("@type")) {
        Some(Value::String(kind)) => Some(kind.as_str()),
        Some(Value::Array(kinds)) => kinds.iter().find_map(Value::as_str),
        _ => None,
    };
    kind.map(str::to_owned)
}

impl From<Iri> for Item {
    fn from(value: Iri) -> Self {
        Item::Iri(value)
    }
}

impl From<&str> for Item {
    fn from(value: &str) -> Self {
        Item::Iri(Iri::from(value))
    }
}

impl From<Object> for Item {
    fn from(value: Object) -> Self {
        Item::Object(Box::new(value))
    }
}

impl From<Actor> for Item {
    fn from(value: Actor) -> Self {
        Item::Actor(Box::new(value))
    }
}

impl From<Activity> for Item {
    fn from(value: Activity) -> Self {
        Item::Activity(Box::new(value))
    }
}

impl From<Collection> for Item {
    fn from(value: Collection) -> Self {
        Item::Collection(Box::new(value))
    }
}

impl From<ItemCollection> for Item {
    fn from(value: ItemCollection) -> Self {
        Item::Items(value)
    }
}

impl TryFrom<Value> for Item {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> Result<Self> {
        Item::from_value(value)
    }
}

impl Serialize for Item {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Item::Iri(iri) => iri.serialize(serializer),
            Item::Object(object) => object.serialize(serializer),
            Item::Actor(actor) => actor.serialize(serializer),
            Item::Activity(activity) => activity.serialize(serializer),
            Item::Collection(collection) => collection.serialize(serializer),
            Item::Items(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Item::from_value(value).map_err(D::Error::custom)
    }
}

/// Sequence of items, deduplicated by identity.
///
/// Items without an identifier are transient and never considered equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemCollection(Vec<Item>);

impl ItemCollection {
    pub fn new() -> ItemCollection {
        ItemCollection(vec![])
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.0.iter()
    }
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Item> {
        self.0.iter_mut()
    }
    pub fn first(&self) -> Option<&Item> {
        self.0.first()
    }
    pub fn contains(&self, iri: &Iri) -> bool {
        self.0.iter().any(|it| it.id() == Some(iri))
    }
    /// Append unless an item with the same identifier is already present.
    pub fn append(&mut self, item: impl Into<Item>) -> bool {
        let item = item.into();
        if let Some(id) = item.id() {
            if self.contains(id) {
                return false;
            }
        }
        self.0.push(item);
        true
    }
    /// Set union, keeping the order of first appearance.
    pub fn merge(&mut self, other: &ItemCollection) {
        for item in other.iter() {
            self.append(item.clone());
        }
    }
    pub fn remove(&mut self, iri: &Iri) -> bool {
        let before = self.0.len();
        self.0.retain(|it| it.id() != Some(iri));
        before != self.0.len()
    }
    pub fn retain(&mut self, f: impl FnMut(&Item) -> bool) {
        self.0.retain(f);
    }
    pub fn iris(&self) -> Vec<Iri> {
        self.0.iter().filter_map(Item::id).cloned().collect()
    }
    pub fn into_vec(self) -> Vec<Item> {
        self.0
    }
}

impl From<Vec<Item>> for ItemCollection {
    fn from(value: Vec<Item>) -> Self {
        value.into_iter().collect()
    }
}

impl<I: Into<Item>> FromIterator<I> for ItemCollection {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        let mut items = ItemCollection::new();
        for item in iter {
            items.append(item);
        }
        items
    }
}

impl IntoIterator for ItemCollection {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ItemCollection {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for ItemCollection {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ItemCollection {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // A single node is as good as a one element array
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(ItemCollection::new()),
            Value::Array(values) => values
                .into_iter()
                .map(Item::from_value)
                .collect::<Result<ItemCollection>>()
                .map_err(D::Error::custom),
            value => Ok(ItemCollection(vec![
                Item::from_value(value).map_err(D::Error::custom)?,
            ])),
        }
    }
}
