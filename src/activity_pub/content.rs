//! Content management: Create, Update and Delete.

use jiff::Timestamp;
use tracing::{debug, warn};

use crate::error::{Error, FanOut, Result};

use super::flatten::flatten_properties;
use super::machine::Processor;
use super::mailman::Client;
use super::model::{
    Activity, ActivityType, Actor, Collection, CollectionType, Iri, Item, ItemCollection, Object,
};
use super::repo::WriteStore;

impl<S, C> Processor<S, C>
where
    S: WriteStore + 'static,
    C: Client + 'static,
{
    pub(super) async fn content_management(
        &self,
        kind: ActivityType,
        mut activity: Activity,
        received_in: &Iri,
    ) -> Result<Activity> {
        let Some(object) = activity.object.take() else {
            return Err(Error::not_valid(format!("{kind} needs an object")));
        };
        let objects = match object {
            Item::Items(items) => items.into_vec(),
            single => vec![single],
        };
        let actor = activity.actor_iri().cloned();
        let mut processed = ItemCollection::new();
        for object in objects {
            let object = match kind {
                ActivityType::Create => self.create(&mut activity, object, received_in).await?,
                ActivityType::Update => self.update(object, actor.as_ref()).await?,
                ActivityType::Delete => self.delete(object, actor.as_ref()).await?,
                _ => object,
            };
            processed.append(object);
        }
        let mut processed = processed.into_vec();
        activity.object = Some(if processed.len() == 1 {
            processed.remove(0)
        } else {
            Item::Items(processed.into())
        });
        Ok(activity)
    }

    async fn create(
        &self,
        activity: &mut Activity,
        mut object: Item,
        received_in: &Iri,
    ) -> Result<Item> {
        if object.is_link() || object.as_object().is_none() {
            return Err(Error::not_valid("Create needs the object to create"));
        }
        if object.id().is_none() {
            let id = self.store.generate_id(&object, received_in).await?;
            if let Some(base) = object.as_object_mut() {
                base.id = id;
            }
        }
        let actor = activity.actor_iri().cloned();
        if let Some(base) = object.as_object_mut() {
            if let Some(actor) = actor {
                base.attributed_to = Some(Item::Iri(actor));
            }
            base.merge_addressing(&activity.base);
            activity.base.merge_addressing(base);
            if base.published.is_none() {
                base.published = Some(Timestamp::now());
            }
        }
        let iri = object.link();
        debug!(target: "apub::process", %iri, kind = ?object.kind(), "create");

        self.append_replies(&object).await;
        self.save_tags(&object).await?;
        if self.is_local(&iri) {
            self.create_collections(&mut object).await?;
        }
        match self.store.save(flatten_properties(object.clone())).await {
            Ok(_) => {}
            Err(error) if error.is_duplicate_key() => {
                debug!(target: "apub::process", %iri, "object already stored");
            }
            Err(error) => return Err(error),
        }
        Ok(object)
    }

    async fn append_replies(&self, object: &Item) {
        let Some(base) = object.as_object() else {
            return;
        };
        let mut fan_out = FanOut::new();
        for target in base.in_reply_to.iter() {
            let Some(target_iri) = target.id() else {
                continue;
            };
            if !self.is_local(target_iri) {
                continue;
            }
            let replies = self
                .collection_of(&Item::Iri(target_iri.clone()), CollectionType::Replies)
                .await;
            self.append_local(&mut fan_out, replies, &Item::Iri(object.link()))
                .await;
        }
        if let Err(error) = fan_out.into_result("replies") {
            warn!(target: "apub::process", iri = %object.link(), %error, "unable to append reply");
        }
    }

    async fn save_tags(&self, object: &Item) -> Result<()> {
        let Some(base) = object.as_object() else {
            return Ok(());
        };
        for tag in base.tag.iter() {
            if tag.is_link() || tag.id().is_none() {
                continue;
            }
            match self.store.save(flatten_properties(tag.clone())).await {
                Ok(_) => {}
                Err(error) if error.is_duplicate_key() => {}
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    async fn create_collections(&self, object: &mut Item) -> Result<()> {
        let kinds: &[CollectionType] = match &mut *object {
            Item::Actor(actor) => {
                actor.ensure_collections();
                &CollectionType::OF_ACTOR
            }
            Item::Collection(_) | Item::Iri(_) | Item::Items(_) => return Ok(()),
            other => match other.as_object_mut() {
                Some(base) => {
                    base.ensure_collections();
                    &CollectionType::OF_OBJECT
                }
                None => return Ok(()),
            },
        };
        let Some(collections) = self.store.collections() else {
            debug!(target: "apub::process", "store keeps no collections");
            return Ok(());
        };
        let owner = Item::Iri(object.link());
        for kind in kinds {
            let iri = object.collection_iri(*kind);
            if !self.is_local(&iri) {
                continue;
            }
            let mut collection = match kind {
                CollectionType::Inbox | CollectionType::Outbox => Collection::new(iri).ordered(),
                _ => Collection::new(iri),
            };
            collection.base.attributed_to = Some(owner.clone());
            collections.create(collection).await?;
        }
        Ok(())
    }

    async fn update(&self, incoming: Item, actor: Option<&Iri>) -> Result<Item> {
        let Some(iri) = incoming.id().cloned() else {
            return Err(Error::not_valid("Update needs an identified object"));
        };
        let stored = self.store.load(&iri).await?;
        check_owner(actor, &stored)?;
        if incoming.kind().is_some() && stored.kind() != incoming.kind() {
            return Err(Error::not_found(format!(
                "no {} stored as {iri}",
                incoming.kind().unwrap_or_default()
            )));
        }
        let merged = match (stored, incoming) {
            (Item::Actor(mut stored), Item::Actor(incoming)) => {
                merge_actor(&mut stored, *incoming);
                Item::Actor(stored)
            }
            (mut stored, incoming) => {
                if let (Some(base), Some(update)) = (stored.as_object_mut(), incoming.as_object()) {
                    merge_object(base, update.clone());
                }
                stored
            }
        };
        debug!(target: "apub::process", %iri, "update");
        self.store.update(flatten_properties(merged.clone())).await?;
        Ok(merged)
    }

    async fn delete(&self, object: Item, actor: Option<&Iri>) -> Result<Item> {
        let Some(iri) = object.id().cloned() else {
            return Err(Error::not_valid("Delete needs an identified object"));
        };
        match self.store.load(&iri).await {
            Ok(stored) => check_owner(actor, &stored)?,
            Err(error) if error.is_not_found() => {}
            Err(error) => return Err(error),
        }
        debug!(target: "apub::process", %iri, "delete");
        self.store.delete(&Item::Iri(iri.clone())).await?;
        Ok(Item::Iri(iri))
    }
}

fn check_owner(actor: Option<&Iri>, stored: &Item) -> Result<()> {
    let Some(actor) = actor else {
        return Err(Error::unauthorized("changes need an actor"));
    };
    if stored.id() == Some(actor) {
        return Ok(());
    }
    let author = stored
        .as_object()
        .and_then(|base| base.attributed_to.as_ref())
        .and_then(Item::id);
    match author {
        Some(author) if author != actor => Err(Error::unauthorized(format!(
            "{actor} can not change {}, it belongs to {author}",
            stored.link()
        ))),
        _ => Ok(()),
    }
}

fn replace<T>(stored: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *stored = incoming;
    }
}

fn replace_many(stored: &mut ItemCollection, incoming: ItemCollection) {
    if !incoming.is_empty() {
        *stored = incoming;
    }
}

/// Values present on `incoming` win, absent ones leave the stored value.
fn merge_object(stored: &mut Object, incoming: Object) {
    replace(&mut stored.name, incoming.name);
    replace(&mut stored.summary, incoming.summary);
    replace(&mut stored.content, incoming.content);
    replace(&mut stored.media_type, incoming.media_type);
    replace(&mut stored.attributed_to, incoming.attributed_to);
    replace(&mut stored.published, incoming.published);
    replace(&mut stored.updated, incoming.updated);
    replace(&mut stored.start_time, incoming.start_time);
    replace(&mut stored.end_time, incoming.end_time);
    replace(&mut stored.context, incoming.context);
    replace(&mut stored.icon, incoming.icon);
    replace(&mut stored.image, incoming.image);
    replace(&mut stored.url, incoming.url);
    replace(&mut stored.replies, incoming.replies);
    replace(&mut stored.likes, incoming.likes);
    replace(&mut stored.shares, incoming.shares);
    replace_many(&mut stored.audience, incoming.audience);
    replace_many(&mut stored.to, incoming.to);
    replace_many(&mut stored.bto, incoming.bto);
    replace_many(&mut stored.cc, incoming.cc);
    replace_many(&mut stored.bcc, incoming.bcc);
    replace_many(&mut stored.in_reply_to, incoming.in_reply_to);
    replace_many(&mut stored.tag, incoming.tag);
    replace_many(&mut stored.attachment, incoming.attachment);
    stored.extra.extend(incoming.extra);
}

fn merge_actor(stored: &mut Actor, incoming: Actor) {
    merge_object(&mut stored.base, incoming.base);
    replace(&mut stored.inbox, incoming.inbox);
    replace(&mut stored.outbox, incoming.outbox);
    replace(&mut stored.following, incoming.following);
    replace(&mut stored.followers, incoming.followers);
    replace(&mut stored.liked, incoming.liked);
    replace(&mut stored.preferred_username, incoming.preferred_username);
    replace(&mut stored.endpoints, incoming.endpoints);
    replace(&mut stored.public_key, incoming.public_key);
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use super::{Object, merge_object};
    use crate::activity_pub::model::{CollectionType, Iri, Item};
    use crate::activity_pub::repo::ReadStore;
    use crate::activity_pub::testing::{JANE, JOHN, TestEnv, local, remote};
    use crate::error::Error;

    #[tokio::test]
    async fn create_stores_the_object() -> Result<()> {
        let env = TestEnv::new().await?;
        let john = env.actor(JOHN).await?;
        let outbox = john.collection_iri(CollectionType::Outbox);
        let create = Item::from_value(json!({
            "type": "Create",
            "actor": john.id(),
            "to": [local(JANE)],
            "object": {
                "type": "Note",
                "content": "hello jane",
                "cc": ["https://www.w3.org/ns/activitystreams#Public"]
            }
        }))?;
        let processed = env
            .processor
            .process_client_activity(create, &john, &outbox)
            .await?;
        let activity = processed.as_activity().unwrap();
        let note_iri = activity.object_iri().cloned().unwrap();
        assert_eq!(note_iri.parent(), Some(outbox.clone()));
        assert_eq!(activity.base.cc.iris(), vec![Iri::public()]);

        let note = env.repo.load(&note_iri).await?;
        let note = note.as_object().unwrap();
        assert_eq!(note.attributed_to, Some(Item::Iri(john.id().clone())));
        assert_eq!(note.to.iris(), vec![local(JANE)]);
        assert!(note.published.is_some());
        assert_eq!(note.replies, Some(Item::Iri(note_iri.join("replies"))));
        assert!(env.repo.load(&note_iri.join("likes")).await?.is_collection());

        let jane_inbox = local(JANE).join("inbox");
        assert!(env.members(&jane_inbox).await?.contains(activity.id()));
        Ok(())
    }

    #[tokio::test]
    async fn replies_are_listed_on_local_parents() -> Result<()> {
        let env = TestEnv::new().await?;
        let john = env.actor(JOHN).await?;
        let jane = env.actor(JANE).await?;
        let parent = env
            .processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Create",
                    "actor": john.id(),
                    "object": {"type": "Note", "content": "first"}
                }))?,
                &john,
                &john.collection_iri(CollectionType::Outbox),
            )
            .await?;
        let parent_iri = parent.as_activity().and_then(|a| a.object_iri()).cloned().unwrap();

        let reply = env
            .processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Create",
                    "actor": jane.id(),
                    "object": {
                        "type": "Note",
                        "content": "second",
                        "inReplyTo": [parent_iri, "https://remote.example/notes/404"]
                    }
                }))?,
                &jane,
                &jane.collection_iri(CollectionType::Outbox),
            )
            .await?;
        let reply_iri = reply.as_activity().and_then(|a| a.object_iri()).cloned().unwrap();
        assert_eq!(
            env.members(&parent_iri.join("replies")).await?,
            vec![reply_iri]
        );
        Ok(())
    }

    #[tokio::test]
    async fn update_merges_present_values() -> Result<()> {
        let env = TestEnv::new().await?;
        let john = env.actor(JOHN).await?;
        let outbox = john.collection_iri(CollectionType::Outbox);
        let created = env
            .processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Create",
                    "actor": john.id(),
                    "object": {"type": "Note", "name": "title", "content": "draft"}
                }))?,
                &john,
                &outbox,
            )
            .await?;
        let note_iri = created.as_activity().and_then(|a| a.object_iri()).cloned().unwrap();

        env.processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Update",
                    "actor": john.id(),
                    "object": {"type": "Note", "id": note_iri, "content": "final"}
                }))?,
                &john,
                &outbox,
            )
            .await?;
        let note = env.repo.load(&note_iri).await?;
        let note = note.as_object().unwrap();
        assert_eq!(note.content.as_deref(), Some("final"));
        assert_eq!(note.name.as_deref(), Some("title"));
        Ok(())
    }

    #[tokio::test]
    async fn update_of_unknown_object_is_not_found() -> Result<()> {
        let env = TestEnv::new().await?;
        let john = env.actor(JOHN).await?;
        let err = env
            .processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Update",
                    "actor": john.id(),
                    "object": {"type": "Note", "id": local("notes").join("missing"), "content": "x"}
                }))?,
                &john,
                &john.collection_iri(CollectionType::Outbox),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn delete_keeps_the_iri() -> Result<()> {
        let env = TestEnv::new().await?;
        let john = env.actor(JOHN).await?;
        let outbox = john.collection_iri(CollectionType::Outbox);
        let created = env
            .processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Create",
                    "actor": john.id(),
                    "object": {"type": "Note", "content": "oops"}
                }))?,
                &john,
                &outbox,
            )
            .await?;
        let note_iri = created.as_activity().and_then(|a| a.object_iri()).cloned().unwrap();

        let deleted = env
            .processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Delete",
                    "actor": john.id(),
                    "object": note_iri
                }))?,
                &john,
                &outbox,
            )
            .await?;
        assert_eq!(
            deleted.as_activity().and_then(|a| a.object.clone()),
            Some(Item::Iri(note_iri.clone()))
        );
        assert!(env.repo.load(&note_iri).await.unwrap_err().is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn remote_create_keeps_remote_ids() -> Result<()> {
        let env = TestEnv::new().await?;
        let create = Item::from_value(json!({
            "type": "Create",
            "id": remote("bob").join("statuses/1/activity"),
            "actor": remote("bob"),
            "to": [local(JOHN)],
            "object": {
                "type": "Note",
                "id": remote("bob").join("statuses/1"),
                "content": "hi john"
            }
        }))?;
        env.processor
            .process_server_activity(create, &local(JOHN).join("inbox"))
            .await?;
        let note = env.repo.load(&remote("bob").join("statuses/1")).await?;
        assert_eq!(note.as_object().and_then(|o| o.replies.clone()), None);
        assert!(
            env.members(&local(JOHN).join("inbox"))
                .await?
                .contains(&remote("bob").join("statuses/1/activity"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn redelivered_create_is_accepted() -> Result<()> {
        let env = TestEnv::new().await?;
        let create = json!({
            "type": "Create",
            "id": remote("bob").join("statuses/2/activity"),
            "actor": remote("bob"),
            "to": [local(JOHN)],
            "object": {"type": "Note", "id": remote("bob").join("statuses/2"), "content": "again"}
        });
        let inbox = local(JOHN).join("inbox");
        for _ in 0..2 {
            env.processor
                .process_server_activity(Item::from_value(create.clone())?, &inbox)
                .await?;
        }
        assert_eq!(
            env.members(&inbox).await?,
            vec![remote("bob").join("statuses/2/activity")]
        );
        Ok(())
    }

    #[tokio::test]
    async fn only_the_author_changes_an_object() -> Result<()> {
        let env = TestEnv::new().await?;
        let john = env.actor(JOHN).await?;
        let created = env
            .processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Create",
                    "actor": john.id(),
                    "object": {"type": "Note", "content": "mine"}
                }))?,
                &john,
                &john.collection_iri(CollectionType::Outbox),
            )
            .await?;
        let note_iri = created.as_activity().and_then(|a| a.object_iri()).cloned().unwrap();

        let inbox = local(JOHN).join("inbox");
        let update = Item::from_value(json!({
            "type": "Update",
            "id": remote("bob").join("updates/1"),
            "actor": remote("bob"),
            "object": {"type": "Note", "id": note_iri, "content": "defaced"}
        }))?;
        let err = env
            .processor
            .process_server_activity(update, &inbox)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        let delete = Item::from_value(json!({
            "type": "Delete",
            "id": remote("bob").join("deletes/1"),
            "actor": remote("bob"),
            "object": note_iri
        }))?;
        let err = env
            .processor
            .process_server_activity(delete, &inbox)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        let note = env.repo.load(&note_iri).await?;
        assert_eq!(note.as_object().and_then(|o| o.content.as_deref()), Some("mine"));
        Ok(())
    }

    #[test]
    fn absent_values_leave_stored_ones() -> Result<()> {
        let mut stored: Object = serde_json::from_value(json!({
            "name": "title",
            "content": "draft",
            "to": ["https://a.example/u/1"]
        }))?;
        let incoming: Object = serde_json::from_value(json!({
            "content": "final",
            "sensitive": true
        }))?;
        merge_object(&mut stored, incoming);
        assert_eq!(stored.name.as_deref(), Some("title"));
        assert_eq!(stored.content.as_deref(), Some("final"));
        assert_eq!(stored.to.len(), 1);
        assert_eq!(stored.extra.get("sensitive"), Some(&json!(true)));
        Ok(())
    }
}
