//! Reversal of previously processed activities.

use tracing::{debug, info};

use crate::error::{Error, FanOut, Result};

use super::machine::Processor;
use super::mailman::Client;
use super::model::{Activity, ActivityType, CollectionType, Item};
use super::reactions::many;
use super::repo::WriteStore;

impl<S, C> Processor<S, C>
where
    S: WriteStore + 'static,
    C: Client + 'static,
{
    /// The wrapped activity stays stored, only its effects are reverted.
    pub(super) async fn undo(&self, undo: Activity) -> Result<Activity> {
        let inner = match undo.object.clone() {
            Some(Item::Activity(inner)) => *inner,
            Some(object) => match self.dereference(object).await? {
                Item::Activity(inner) => *inner,
                other => {
                    return Err(Error::not_valid(format!(
                        "Undo must wrap an activity, not {}",
                        other.kind().unwrap_or("an untyped item")
                    )));
                }
            },
            None => return Err(Error::not_valid("Undo needs an object")),
        };
        let Some(actor) = inner.actor.clone() else {
            return Err(Error::not_valid("undone activity has no actor"));
        };
        if inner.actor_iri() != undo.actor_iri() {
            return Err(Error::not_valid("only the actor of an activity can undo it"));
        }
        let kind = match inner.activity_type() {
            Some(kind) if kind.is_undoable() => kind,
            Some(kind) => return Err(Error::not_valid(format!("{kind} can not be undone"))),
            None => return Err(Error::not_valid("Undo of an unknown activity type")),
        };
        info!(target: "apub::undo", id = %inner.id(), %kind, "undo");

        let mut fan_out = FanOut::new();
        let mut withdrawn = vec![Item::Iri(inner.id().clone())];
        if kind == ActivityType::Create {
            let created = many(inner.object.as_ref());
            withdrawn.extend(created.iter().filter_map(Item::id).cloned().map(Item::Iri));
        }
        let outbox = self.collection_of(&actor, CollectionType::Outbox).await;
        match self.build_recipients(&inner, &outbox).await {
            Ok(recipients) => {
                for collection in recipients.iris() {
                    for item in &withdrawn {
                        self.remove_local(&mut fan_out, collection.clone(), item).await;
                    }
                }
            }
            Err(error) => fan_out.record(outbox, Err(error)),
        }

        let objects = many(inner.object.as_ref());
        match kind {
            ActivityType::Create => {
                for object in withdrawn.iter().skip(1) {
                    let outcome = self.store.delete(object).await;
                    fan_out.record(object.link(), outcome);
                }
            }
            ActivityType::Like | ActivityType::Dislike => {
                let liked = self.collection_of(&actor, CollectionType::Liked).await;
                let like = Item::Iri(inner.id().clone());
                for object in &objects {
                    let Some(object_iri) = object.id() else {
                        continue;
                    };
                    self.remove_local(&mut fan_out, liked.clone(), &Item::Iri(object_iri.clone()))
                        .await;
                    let likes = self.collection_of(object, CollectionType::Likes).await;
                    self.remove_local(&mut fan_out, likes, &like).await;
                }
            }
            ActivityType::Follow => {
                let following = self.collection_of(&actor, CollectionType::Following).await;
                for followee in &objects {
                    let Some(followee_iri) = followee.id() else {
                        continue;
                    };
                    let followee_link = Item::Iri(followee_iri.clone());
                    self.remove_local(&mut fan_out, following.clone(), &followee_link)
                        .await;
                    let followers = self.collection_of(followee, CollectionType::Followers).await;
                    self.remove_local(&mut fan_out, followers, &Item::Iri(actor.link()))
                        .await;
                }
            }
            ActivityType::Block | ActivityType::Ignore => {
                let kind = if kind == ActivityType::Block {
                    CollectionType::Blocked
                } else {
                    CollectionType::Ignored
                };
                let collection = self.collection_of(&actor, kind).await;
                for object in objects.iter().filter_map(Item::id) {
                    self.remove_local(&mut fan_out, collection.clone(), &Item::Iri(object.clone()))
                        .await;
                }
            }
            ActivityType::Announce => {
                let announce = Item::Iri(inner.id().clone());
                for object in &objects {
                    if object.id().is_none_or(|iri| !self.is_local(iri)) {
                        continue;
                    }
                    let shares = self.collection_of(object, CollectionType::Shares).await;
                    self.remove_local(&mut fan_out, shares, &announce).await;
                }
            }
            _ => {}
        }
        debug!(
            target: "apub::undo",
            id = %inner.id(),
            removed = fan_out.succeeded(),
            failed = fan_out.failed(),
            "reversed"
        );
        fan_out.into_result(format!("undo {kind}"))?;
        Ok(undo)
    }
}
