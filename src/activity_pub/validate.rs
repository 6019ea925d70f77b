//! Protocol rules checked before an activity is processed.

use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::machine::Processor;
use super::mailman::Client;
use super::model::{Activity, ActivityType, Actor, CollectionType, Iri, Item, Motivation};
use super::repo::WriteStore;

/// Which side of the protocol submitted the activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Origin {
    Client,
    Server,
}

impl<S, C> Processor<S, C>
where
    S: WriteStore + 'static,
    C: Client + 'static,
{
    /// Check `item` against the rules of the collection it was received in.
    ///
    /// Outboxes take client activities and need the authenticated `author`,
    /// inboxes take server activities. Returns the activity with its actor and
    /// object dereferenced, and the actor rewritten to `author` when a client
    /// names somebody else.
    pub async fn validate_activity(
        &self,
        item: Item,
        author: Option<&Actor>,
        received_in: &Iri,
    ) -> Result<Activity> {
        match self.receiving_box(received_in, author).await {
            Some(CollectionType::Outbox) => {
                let author = author.ok_or_else(|| {
                    Error::unauthorized("posting to an outbox needs an authenticated actor")
                })?;
                self.validate_client_activity(item, author, received_in).await
            }
            Some(CollectionType::Inbox) => self.validate_server_activity(item, received_in).await,
            _ => Err(Error::MethodNotAllowed(format!(
                "activities can not be posted to {received_in}"
            ))),
        }
    }

    async fn receiving_box(
        &self,
        received_in: &Iri,
        author: Option<&Actor>,
    ) -> Option<CollectionType> {
        if let Some(author) = author {
            if author.collection_iri(CollectionType::Outbox) == *received_in {
                return Some(CollectionType::Outbox);
            }
        }
        if self.shared_inbox.as_ref() == Some(received_in) {
            return Some(CollectionType::Inbox);
        }
        if self.is_local(received_in) {
            return self.box_owner(received_in).await.map(|(_, kind)| kind);
        }
        match CollectionType::split(received_in) {
            Some((_, kind @ (CollectionType::Inbox | CollectionType::Outbox))) => Some(kind),
            _ => None,
        }
    }

    // Owner by IRI convention, else the stored collection's attributedTo.
    async fn box_owner(&self, collection: &Iri) -> Option<(Iri, CollectionType)> {
        let owner = match CollectionType::split(collection) {
            Some((owner, _)) => owner,
            None => match self.store.load(collection).await {
                Ok(Item::Collection(stored)) => stored.base.attributed_to.as_ref()?.id()?.clone(),
                _ => return None,
            },
        };
        let Ok(Item::Actor(actor)) = self.store.load(&owner).await else {
            debug!(target: "apub::validate", %collection, %owner, "no local owner");
            return None;
        };
        [CollectionType::Inbox, CollectionType::Outbox]
            .into_iter()
            .find(|kind| actor.collection_iri(*kind) == *collection)
            .map(|kind| (owner, kind))
    }

    async fn validate_client_activity(
        &self,
        item: Item,
        author: &Actor,
        received_in: &Iri,
    ) -> Result<Activity> {
        if author.id().is_empty() || author.id().is_public() {
            return Err(Error::unauthorized(
                "the public namespace can not post activities",
            ));
        }
        let owns_collection = CollectionType::OF_ACTOR
            .iter()
            .chain(CollectionType::OF_OBJECT.iter())
            .any(|kind| author.collection_iri(*kind) == *received_in);
        if !owns_collection {
            return Err(Error::unauthorized(format!(
                "{} does not own {received_in}",
                author.id()
            )));
        }

        let mut activity = into_known_activity(item)?;
        match self.validate_client_actor(activity.actor.as_ref(), author).await {
            Ok(()) => {}
            Err(error) if error.is_bad_request() => {
                debug!(target: "apub::validate", %error, author = %author.id(), "actor rewritten to the authenticated actor");
                activity.actor = Some(Item::Iri(author.id().clone()));
            }
            Err(error) => return Err(error),
        }
        if activity.base.attributed_to.is_none() {
            activity.base.attributed_to = Some(Item::Iri(author.id().clone()));
        }
        if let Some(object) = activity.object.take() {
            let object = self.dereference_or_keep(object).await;
            validate_object(&object, Origin::Client)?;
            activity.object = Some(object);
        }
        self.validate_motivation(&activity, Origin::Client).await?;
        Ok(activity)
    }

    async fn validate_client_actor(&self, actor: Option<&Item>, author: &Actor) -> Result<()> {
        let Some(actor) = actor else {
            return Err(Error::bad_request("activity has no actor"));
        };
        let resolved = self.dereference(actor.clone()).await?;
        match resolved.id() {
            Some(id) if id == author.id() => Ok(()),
            Some(id) => Err(Error::bad_request(format!(
                "{id} is not the authenticated actor"
            ))),
            None => Err(Error::bad_request("activity actor has no id")),
        }
    }

    async fn validate_server_activity(&self, item: Item, received_in: &Iri) -> Result<Activity> {
        let mut activity = into_known_activity(item)?;
        if activity.id().is_empty() {
            return Err(Error::not_valid("received activity has no id"));
        }
        validate_iri("activity", activity.id())?;
        let Some(actor) = activity.actor_iri().cloned() else {
            return Err(Error::not_valid("received activity has no actor"));
        };
        if actor.is_public() {
            return Err(Error::not_valid("the public namespace can not send activities"));
        }
        validate_iri("actor", &actor)?;
        self.check_not_blocked(&actor, received_in).await?;

        if let Some(target) = &activity.target {
            validate_object(target, Origin::Server)?;
        }
        if let Some(object) = activity.object.take() {
            validate_object(&object, Origin::Server)?;
            activity.object = Some(self.dereference_or_keep(object).await);
        }
        self.validate_motivation(&activity, Origin::Server).await?;
        Ok(activity)
    }

    /// Blocked senders get a not found, so the block is never confirmed.
    async fn check_not_blocked(&self, sender: &Iri, received_in: &Iri) -> Result<()> {
        if !self.is_local(received_in) {
            return Ok(());
        }
        let Some((owner, _)) = self.box_owner(received_in).await else {
            return Ok(());
        };
        let blocked = self
            .collection_of(&Item::Iri(owner), CollectionType::Blocked)
            .await;
        if self.is_member(&blocked, sender).await {
            debug!(target: "apub::validate", %sender, %received_in, "sender is blocked");
            return Err(Error::not_found(format!("{received_in} not found")));
        }
        Ok(())
    }

    async fn validate_motivation(&self, activity: &Activity, origin: Origin) -> Result<()> {
        let Some(kind) = activity.activity_type() else {
            return Ok(());
        };
        match kind.motivation() {
            Motivation::ContentManagement => validate_content(kind, activity),
            Motivation::CollectionManagement => match activity.target {
                Some(_) => Ok(()),
                None => Err(Error::not_valid(format!("{kind} needs a target"))),
            },
            Motivation::Reactions => validate_reaction(kind, activity),
            Motivation::RelationshipManagement => match kind {
                ActivityType::Follow if origin == Origin::Client => {
                    self.validate_follow(activity).await
                }
                ActivityType::Follow => Ok(()),
                _ => validate_reaction(kind, activity),
            },
            Motivation::Negating => validate_undo(activity),
            Motivation::Questions => validate_question(activity),
            Motivation::EventRsvp
            | Motivation::GroupManagement
            | Motivation::ContentExperience
            | Motivation::GeoSocialEvents
            | Motivation::Notification
            | Motivation::Offers => Ok(()),
        }
    }

    async fn validate_follow(&self, follow: &Activity) -> Result<()> {
        let (Some(actor), Some(object)) = (follow.actor.as_ref(), follow.object_iri()) else {
            return Err(Error::not_valid("Follow needs an actor and an object"));
        };
        let outbox = self.collection_of(actor, CollectionType::Outbox).await;
        let members = match self.store.load(&outbox).await {
            Ok(Item::Collection(outbox)) => outbox.members().iris(),
            Ok(_) => vec![],
            Err(error) => {
                warn!(target: "apub::validate", %outbox, %error, "unable to scan outbox for follows");
                vec![]
            }
        };
        for member in members {
            let Ok(Item::Activity(previous)) = self.store.load(&member).await else {
                continue;
            };
            if previous.activity_type() == Some(ActivityType::Follow)
                && previous.actor_iri() == actor.id()
                && previous.object_iri() == Some(object)
                && previous.id() != follow.id()
            {
                return Err(Error::conflict(format!(
                    "{} already follows {object} with {}",
                    previous.actor_iri().map_or("actor", Iri::as_str),
                    previous.id()
                )));
            }
        }
        Ok(())
    }
}

fn into_known_activity(item: Item) -> Result<Activity> {
    let kind = item.kind().unwrap_or("untyped item").to_string();
    let Some(activity) = item.into_activity() else {
        return Err(Error::not_valid(format!("{kind} is not an activity")));
    };
    let Some(activity_type) = activity.activity_type() else {
        return Err(Error::not_valid(format!("{kind} is not a known activity type")));
    };
    if !activity_type.is_intransitive() && activity.object.is_none() {
        return Err(Error::not_valid(format!("{activity_type} needs an object")));
    }
    Ok(activity)
}

fn validate_iri(property: &str, iri: &Iri) -> Result<()> {
    if !iri.is_valid() {
        return Err(Error::not_valid(format!("{property} {iri} is not a valid IRI")));
    }
    Ok(())
}

fn validate_object(object: &Item, origin: Origin) -> Result<()> {
    match object {
        Item::Iri(iri) => validate_iri("object", iri),
        Item::Items(items) => items.iter().try_for_each(|item| validate_object(item, origin)),
        embedded => match (embedded.id(), origin) {
            (Some(iri), _) => validate_iri("object", iri),
            (None, Origin::Client) => Ok(()),
            (None, Origin::Server) => Err(Error::not_valid("received object has no id")),
        },
    }
}

fn validate_content(kind: ActivityType, activity: &Activity) -> Result<()> {
    let Some(object) = &activity.object else {
        return Err(Error::not_valid(format!("{kind} needs an object")));
    };
    match kind {
        ActivityType::Create if object.is_link() => Err(Error::not_valid(
            "Create needs the object to create, not a link",
        )),
        ActivityType::Update | ActivityType::Delete if object.id().is_none() => Err(
            Error::not_valid(format!("{kind} needs an identified object")),
        ),
        _ => Ok(()),
    }
}

fn validate_reaction(kind: ActivityType, activity: &Activity) -> Result<()> {
    if !matches!(kind, ActivityType::Accept | ActivityType::Reject) {
        return Ok(());
    }
    let follow = activity
        .object
        .as_ref()
        .and_then(Item::as_activity)
        .filter(|inner| inner.activity_type() == Some(ActivityType::Follow))
        .ok_or_else(|| Error::not_valid(format!("{kind} must wrap a Follow activity")))?;
    if follow.object_iri().is_none() || follow.object_iri() != activity.actor_iri() {
        return Err(Error::not_valid(format!(
            "{kind} must come from the object of the Follow"
        )));
    }
    Ok(())
}

fn validate_undo(activity: &Activity) -> Result<()> {
    let inner = activity
        .object
        .as_ref()
        .and_then(Item::as_activity)
        .ok_or_else(|| Error::not_valid("Undo must wrap an activity"))?;
    if inner.actor_iri().is_none() || inner.actor_iri() != activity.actor_iri() {
        return Err(Error::not_valid("only the actor of an activity can undo it"));
    }
    match inner.activity_type() {
        Some(kind) if kind.is_undoable() => Ok(()),
        Some(kind) => Err(Error::not_valid(format!("{kind} can not be undone"))),
        None => Err(Error::not_valid("Undo of an unknown activity type")),
    }
}

fn validate_question(question: &Activity) -> Result<()> {
    let extra = &question.base.extra;
    if extra.contains_key("oneOf") && extra.contains_key("anyOf") {
        return Err(Error::not_valid(
            "a Question can not have both oneOf and anyOf",
        ));
    }
    Ok(())
}
