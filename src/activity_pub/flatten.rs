use super::model::{Activity, Actor, Collection, Item, ItemCollection, Object};

/// Replace every embedded node that has an identifier with its IRI.
///
/// The top level item keeps its body. Transient embedded nodes, e.g. a
/// `Mention` tag, stay embedded but are flattened in turn.
pub fn flatten_properties(item: Item) -> Item {
    match item {
        Item::Object(mut object) => {
            flatten_object(&mut object);
            Item::Object(object)
        }
        Item::Actor(mut actor) => {
            flatten_actor(&mut actor);
            Item::Actor(actor)
        }
        Item::Activity(mut activity) => {
            flatten_activity(&mut activity);
            Item::Activity(activity)
        }
        Item::Collection(mut collection) => {
            flatten_collection(&mut collection);
            Item::Collection(collection)
        }
        Item::Items(items) => Item::Items(items.into_iter().map(flatten_properties).collect()),
        Item::Iri(iri) => Item::Iri(iri),
    }
}

fn flatten_item(item: Item) -> Item {
    if let Some(iri) = item.id() {
        return Item::Iri(iri.clone());
    }
    match item {
        Item::Items(items) => Item::Items(flatten_items(items)),
        transient => flatten_properties(transient),
    }
}

fn flatten_items(items: ItemCollection) -> ItemCollection {
    items.into_iter().map(flatten_item).collect()
}

fn flatten_opt(item: &mut Option<Item>) {
    *item = item.take().map(flatten_item);
}

fn flatten_many(items: &mut ItemCollection) {
    *items = flatten_items(std::mem::take(items));
}

fn flatten_object(object: &mut Object) {
    flatten_opt(&mut object.attributed_to);
    flatten_opt(&mut object.context);
    flatten_opt(&mut object.icon);
    flatten_opt(&mut object.image);
    flatten_opt(&mut object.url);
    flatten_opt(&mut object.replies);
    flatten_opt(&mut object.likes);
    flatten_opt(&mut object.shares);
    for field in [
        &mut object.audience,
        &mut object.to,
        &mut object.bto,
        &mut object.cc,
        &mut object.bcc,
        &mut object.in_reply_to,
        &mut object.tag,
        &mut object.attachment,
    ] {
        flatten_many(field);
    }
}

fn flatten_actor(actor: &mut Actor) {
    flatten_object(&mut actor.base);
    for field in [
        &mut actor.inbox,
        &mut actor.outbox,
        &mut actor.followers,
        &mut actor.following,
        &mut actor.liked,
    ] {
        flatten_opt(field);
    }
}

fn flatten_activity(activity: &mut Activity) {
    flatten_object(&mut activity.base);
    for field in [
        &mut activity.actor,
        &mut activity.object,
        &mut activity.target,
        &mut activity.origin,
        &mut activity.result,
        &mut activity.instrument,
    ] {
        flatten_opt(field);
    }
}

fn flatten_collection(collection: &mut Collection) {
    flatten_object(&mut collection.base);
    flatten_many(&mut collection.items);
    flatten_many(&mut collection.ordered_items);
    flatten_opt(&mut collection.first);
    flatten_opt(&mut collection.next);
}
