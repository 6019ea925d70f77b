//! Reactions, relationship answers and announces.

use tracing::debug;

use crate::error::{Error, FanOut, Result};

use super::machine::Processor;
use super::mailman::Client;
use super::model::{Activity, ActivityType, CollectionType, Item};
use super::repo::WriteStore;

impl<S, C> Processor<S, C>
where
    S: WriteStore + 'static,
    C: Client + 'static,
{
    pub(super) async fn reactions(
        &self,
        kind: ActivityType,
        activity: Activity,
    ) -> Result<Activity> {
        match kind {
            ActivityType::Like => self.like(activity).await,
            ActivityType::Dislike => Ok(activity),
            ActivityType::Accept | ActivityType::Reject => self.answer_follow(kind, activity).await,
            ActivityType::Block => {
                self.exclude_and_collect(activity, CollectionType::Blocked)
                    .await
            }
            ActivityType::Ignore => {
                self.exclude_and_collect(activity, CollectionType::Ignored)
                    .await
            }
            ActivityType::Flag => self.flag(activity).await,
            _ => Ok(activity),
        }
    }

    async fn like(&self, activity: Activity) -> Result<Activity> {
        let actors = many(activity.actor.as_ref());
        let objects = many(activity.object.as_ref());
        let like = Item::Iri(activity.id().clone());
        let mut fan_out = FanOut::new();
        for actor in &actors {
            let liked = self.collection_of(actor, CollectionType::Liked).await;
            for object in &objects {
                let Some(object_iri) = object.id() else {
                    continue;
                };
                self.append_local(&mut fan_out, liked.clone(), &Item::Iri(object_iri.clone()))
                    .await;
                let likes = self.collection_of(object, CollectionType::Likes).await;
                self.append_local(&mut fan_out, likes, &like).await;
            }
        }
        fan_out.into_result("like")?;
        Ok(activity)
    }

    async fn answer_follow(&self, kind: ActivityType, mut activity: Activity) -> Result<Activity> {
        let Some(object) = activity.object.take() else {
            return Err(Error::not_valid(format!("{kind} needs a Follow")));
        };
        let follow = match self.dereference(object).await? {
            Item::Activity(follow) if follow.activity_type() == Some(ActivityType::Follow) => {
                follow
            }
            _ => return Err(Error::not_valid(format!("{kind} must wrap a Follow activity"))),
        };
        let (Some(follower), Some(followee)) = (follow.actor.clone(), follow.object.clone()) else {
            return Err(Error::not_valid("Follow needs an actor and an object"));
        };
        let mut fan_out = FanOut::new();
        if kind == ActivityType::Accept {
            let followers = self.collection_of(&followee, CollectionType::Followers).await;
            self.append_local(&mut fan_out, followers, &Item::Iri(follower.link()))
                .await;
            let following = self.collection_of(&follower, CollectionType::Following).await;
            self.append_local(&mut fan_out, following, &Item::Iri(followee.link()))
                .await;

            let follower_iri = follower.link();
            if !self.is_local(&follower_iri) && !activity.base.recipients().contains(&follower_iri) {
                debug!(target: "apub::process", follower = %follower_iri, "adding follower to bcc");
                activity.base.bcc.append(Item::Iri(follower_iri));
            }
        } else {
            let rejecting = activity.actor.clone().unwrap_or_else(|| followee.clone());
            let inbox = self.collection_of(&rejecting, CollectionType::Inbox).await;
            self.remove_local(&mut fan_out, inbox, &Item::Iri(follow.id().clone()))
                .await;
        }
        activity.object = Some(Item::Activity(follow));
        fan_out.into_result(kind.as_str())?;
        Ok(activity)
    }

    async fn exclude_and_collect(
        &self,
        mut activity: Activity,
        kind: CollectionType,
    ) -> Result<Activity> {
        let objects = many(activity.object.as_ref());
        for object in &objects {
            if let Some(iri) = object.id() {
                activity.base.remove_recipient(iri);
            }
        }
        let mut fan_out = FanOut::new();
        if let Some(actor) = activity.actor.clone() {
            let collection = self.collection_of(&actor, kind).await;
            for object in &objects {
                if let Some(iri) = object.id() {
                    self.append_local(&mut fan_out, collection.clone(), &Item::Iri(iri.clone()))
                        .await;
                }
            }
        }
        fan_out.into_result(kind.segment())?;
        Ok(activity)
    }

    /// Flagged actors, or the authors of flagged objects, are not told.
    async fn flag(&self, mut activity: Activity) -> Result<Activity> {
        for object in many(activity.object.as_ref()) {
            let object = self.dereference_or_keep(object).await;
            let flagged = match &object {
                Item::Actor(actor) => Some(actor.id().clone()),
                Item::Iri(iri) => Some(iri.clone()),
                other => other
                    .as_object()
                    .and_then(|o| o.attributed_to.as_ref())
                    .and_then(Item::id)
                    .cloned(),
            };
            if let Some(flagged) = flagged {
                activity.base.remove_recipient(&flagged);
            }
        }
        Ok(activity)
    }

    pub(super) async fn announce(&self, activity: Activity) -> Result<Activity> {
        let announce = Item::Iri(activity.id().clone());
        let mut fan_out = FanOut::new();
        for object in many(activity.object.as_ref()) {
            if object.id().is_none_or(|iri| !self.is_local(iri)) {
                continue;
            }
            let shares = self.collection_of(&object, CollectionType::Shares).await;
            self.append_local(&mut fan_out, shares, &announce).await;
        }
        fan_out.into_result("announce")?;
        Ok(activity)
    }
}

pub(super) fn many(item: Option<&Item>) -> Vec<Item> {
    match item {
        Some(Item::Items(items)) => items.iter().cloned().collect(),
        Some(Item::Collection(collection)) if collection.id().is_empty() => {
            collection.members().iter().cloned().collect()
        }
        Some(item) => vec![item.clone()],
        None => vec![],
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use crate::activity_pub::model::{CollectionType, Iri, Item};
    use crate::activity_pub::testing::{JANE, JOHN, TestEnv, local, remote};

    async fn create_note(env: &TestEnv, name: &str) -> Result<Iri> {
        let author = env.actor(name).await?;
        let created = env
            .processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Create",
                    "actor": author.id(),
                    "object": {"type": "Note", "content": "likeable"}
                }))?,
                &author,
                &author.collection_iri(CollectionType::Outbox),
            )
            .await?;
        Ok(created
            .as_activity()
            .and_then(|a| a.object_iri())
            .cloned()
            .unwrap_or_default())
    }

    #[tokio::test]
    async fn like_updates_liked_and_likes() -> Result<()> {
        let env = TestEnv::new().await?;
        let note = create_note(&env, JANE).await?;
        let john = env.actor(JOHN).await?;
        let like = env
            .processor
            .process_client_activity(
                Item::from_value(json!({"type": "Like", "actor": john.id(), "object": note}))?,
                &john,
                &john.collection_iri(CollectionType::Outbox),
            )
            .await?;
        let like_iri = like.id().cloned().unwrap();
        assert_eq!(env.members(&local(JOHN).join("liked")).await?, vec![note.clone()]);
        assert_eq!(env.members(&note.join("likes")).await?, vec![like_iri]);
        Ok(())
    }

    #[tokio::test]
    async fn dislike_has_no_collection_effect() -> Result<()> {
        let env = TestEnv::new().await?;
        let note = create_note(&env, JANE).await?;
        let john = env.actor(JOHN).await?;
        env.processor
            .process_client_activity(
                Item::from_value(json!({"type": "Dislike", "actor": john.id(), "object": note}))?,
                &john,
                &john.collection_iri(CollectionType::Outbox),
            )
            .await?;
        assert!(env.members(&local(JOHN).join("liked")).await?.is_empty());
        assert!(env.members(&note.join("likes")).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn follow_then_accept() -> Result<()> {
        let env = TestEnv::new().await?;
        let john = env.actor(JOHN).await?;
        let jane = env.actor(JANE).await?;
        let follow = env
            .processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Follow",
                    "actor": john.id(),
                    "object": jane.id(),
                    "to": [jane.id()]
                }))?,
                &john,
                &john.collection_iri(CollectionType::Outbox),
            )
            .await?;
        let follow_iri = follow.id().cloned().unwrap();
        assert!(env.members(&local(JANE).join("followers")).await?.is_empty());
        assert!(env.members(&local(JANE).join("inbox")).await?.contains(&follow_iri));

        env.processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Accept",
                    "actor": jane.id(),
                    "object": follow_iri,
                    "to": [john.id()]
                }))?,
                &jane,
                &jane.collection_iri(CollectionType::Outbox),
            )
            .await?;
        assert_eq!(env.members(&local(JANE).join("followers")).await?, vec![local(JOHN)]);
        assert_eq!(env.members(&local(JOHN).join("following")).await?, vec![local(JANE)]);
        Ok(())
    }

    #[tokio::test]
    async fn accepting_a_remote_follower_adds_it_to_bcc() -> Result<()> {
        let env = TestEnv::new().await?;
        let jane = env.actor(JANE).await?;
        let follow = Item::from_value(json!({
            "type": "Follow",
            "id": remote("bob").join("follows/1"),
            "actor": remote("bob"),
            "object": jane.id()
        }))?;
        env.processor
            .process_server_activity(follow, &jane.collection_iri(CollectionType::Inbox))
            .await?;

        let accepted = env
            .processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Accept",
                    "actor": jane.id(),
                    "object": remote("bob").join("follows/1")
                }))?,
                &jane,
                &jane.collection_iri(CollectionType::Outbox),
            )
            .await?;
        let accept = accepted.as_activity().unwrap();
        assert_eq!(accept.base.bcc.iris(), vec![remote("bob")]);
        assert_eq!(env.members(&local(JANE).join("followers")).await?, vec![remote("bob")]);
        assert_eq!(env.client.pushed_to(), vec![remote("bob").join("inbox")]);
        Ok(())
    }

    #[tokio::test]
    async fn reject_removes_the_follow_from_the_inbox() -> Result<()> {
        let env = TestEnv::new().await?;
        let jane = env.actor(JANE).await?;
        let inbox = jane.collection_iri(CollectionType::Inbox);
        let follow_iri = remote("bob").join("follows/2");
        let follow = Item::from_value(json!({
            "type": "Follow",
            "id": follow_iri,
            "actor": remote("bob"),
            "object": jane.id()
        }))?;
        env.processor.process_server_activity(follow, &inbox).await?;
        assert!(env.members(&inbox).await?.contains(&follow_iri));

        env.processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Reject",
                    "actor": jane.id(),
                    "object": follow_iri
                }))?,
                &jane,
                &jane.collection_iri(CollectionType::Outbox),
            )
            .await?;
        assert!(!env.members(&inbox).await?.contains(&follow_iri));
        assert!(env.members(&local(JANE).join("followers")).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn block_is_never_addressed_to_its_object() -> Result<()> {
        let env = TestEnv::new().await?;
        let john = env.actor(JOHN).await?;
        let blocked = env
            .processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Block",
                    "actor": john.id(),
                    "object": local(JANE),
                    "to": [local(JANE)],
                    "cc": [local(JANE), "https://www.w3.org/ns/activitystreams#Public"],
                    "bcc": [local(JANE)]
                }))?,
                &john,
                &john.collection_iri(CollectionType::Outbox),
            )
            .await?;
        let block = blocked.as_activity().unwrap();
        assert!(!block.base.recipients().contains(&local(JANE)));
        assert_eq!(block.base.cc.iris(), vec![Iri::public()]);
        assert_eq!(env.members(&local(JOHN).join("blocked")).await?, vec![local(JANE)]);
        assert!(!env.members(&local(JANE).join("inbox")).await?.contains(block.id()));
        Ok(())
    }

    #[tokio::test]
    async fn ignore_collects_the_object() -> Result<()> {
        let env = TestEnv::new().await?;
        let john = env.actor(JOHN).await?;
        env.processor
            .process_client_activity(
                Item::from_value(json!({"type": "Ignore", "actor": john.id(), "object": local(JANE)}))?,
                &john,
                &john.collection_iri(CollectionType::Outbox),
            )
            .await?;
        assert_eq!(env.members(&local(JOHN).join("ignored")).await?, vec![local(JANE)]);
        Ok(())
    }

    #[tokio::test]
    async fn flag_does_not_tell_the_author() -> Result<()> {
        let env = TestEnv::new().await?;
        let note = create_note(&env, JANE).await?;
        let john = env.actor(JOHN).await?;
        let flagged = env
            .processor
            .process_client_activity(
                Item::from_value(json!({
                    "type": "Flag",
                    "actor": john.id(),
                    "object": note,
                    "to": [local(JANE), local("moderators")]
                }))?,
                &john,
                &john.collection_iri(CollectionType::Outbox),
            )
            .await?;
        let flag = flagged.as_activity().unwrap();
        assert_eq!(flag.base.to.iris(), vec![local("moderators")]);
        Ok(())
    }

    #[tokio::test]
    async fn announce_of_local_object_is_shared() -> Result<()> {
        let env = TestEnv::new().await?;
        let note = create_note(&env, JANE).await?;
        let announce = Item::from_value(json!({
            "type": "Announce",
            "id": remote("bob").join("announces/1"),
            "actor": remote("bob"),
            "object": note
        }))?;
        env.processor
            .process_server_activity(announce, &local(JANE).join("inbox"))
            .await?;
        assert_eq!(
            env.members(&note.join("shares")).await?,
            vec![remote("bob").join("announces/1")]
        );
        Ok(())
    }
}
