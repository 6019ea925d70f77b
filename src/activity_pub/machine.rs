//! Entry points of the activity processor and the motivation dispatcher.

use std::sync::Arc;

use jiff::Timestamp;
use tracing::{debug, info};

use crate::config::{Config, Locality};
use crate::error::{Error, FanOut, Result};

use super::flatten::flatten_properties;
use super::mailman::Client;
use super::model::{Activity, ActivityType, Actor, Iri, Item, ItemCollection, Motivation};
use super::repo::{CollectionStore, WriteStore};

/// Validates, applies and disseminates activities.
///
/// `S` is the store the side effects are applied to, `C` the client used to
/// fetch remote items and push to remote collections. Both are shared with
/// background delivery tasks.
pub struct Processor<S, C> {
    pub(super) store: Arc<S>,
    pub(super) client: Arc<C>,
    pub(super) locality: Locality,
    pub(super) shared_inbox: Option<Iri>,
    pub(super) async_delivery: bool,
}

impl<S, C> Processor<S, C>
where
    S: WriteStore + 'static,
    C: Client + 'static,
{
    pub fn new(config: &Config, store: Arc<S>, client: Arc<C>) -> Processor<S, C> {
        Processor {
            store,
            client,
            locality: config.activity_pub.locality(),
            shared_inbox: config.activity_pub.shared_inbox(),
            async_delivery: config.delivery.async_delivery,
        }
    }

    pub fn is_local(&self, iri: &Iri) -> bool {
        self.locality.is_local(iri)
    }

    /// Process an activity a local client posted to `received_in`, its outbox.
    ///
    /// Returns the processed activity, flattened.
    pub async fn process_client_activity(
        &self,
        item: Item,
        author: &Actor,
        received_in: &Iri,
    ) -> Result<Item> {
        info!(target: "apub::process", %received_in, author = %author.id(), kind = ?item.kind(), "client activity");
        let mut activity = self.validate_activity(item, Some(author), received_in).await?;
        if activity.base.id.is_empty() {
            let id = self
                .store
                .generate_id(&Item::from(activity.clone()), received_in)
                .await?;
            activity.base.id = id;
        }
        if activity.base.published.is_none() {
            activity.base.published = Some(Timestamp::now());
        }
        let activity = self.process_activity(activity, received_in).await?;
        self.save_activity(&activity).await?;

        let recipients = self.build_recipients(&activity, received_in).await?;
        self.disseminate(&activity, &recipients).await?;
        debug!(target: "apub::process", id = %activity.id(), "client activity processed");
        Ok(flatten_properties(activity.into()))
    }

    /// Process an activity a remote server delivered to `received_in`, an inbox.
    ///
    /// Received activities are only appended to local collections, they are
    /// never pushed on to remote servers.
    pub async fn process_server_activity(&self, item: Item, received_in: &Iri) -> Result<Item> {
        info!(target: "apub::process", %received_in, kind = ?item.kind(), "server activity");
        let activity = self.validate_activity(item, None, received_in).await?;
        let activity = self.process_activity(activity, received_in).await?;
        self.save_activity(&activity).await?;

        let recipients: ItemCollection = self
            .build_recipients(&activity, received_in)
            .await?
            .into_iter()
            .filter(|recipient| recipient.id().is_some_and(|iri| self.is_local(iri)))
            .collect();
        self.disseminate(&activity, &recipients).await?;
        debug!(target: "apub::process", id = %activity.id(), "server activity processed");
        Ok(flatten_properties(activity.into()))
    }

    pub(super) async fn process_activity(
        &self,
        activity: Activity,
        received_in: &Iri,
    ) -> Result<Activity> {
        let Some(kind) = activity.activity_type() else {
            debug!(target: "apub::process", kind = ?activity.base.kind, "unknown activity type, no side effects");
            return Ok(activity);
        };
        let motivation = kind.motivation();
        debug!(target: "apub::process", %kind, ?motivation, "dispatch");
        match motivation {
            Motivation::ContentManagement => {
                self.content_management(kind, activity, received_in).await
            }
            Motivation::Reactions => self.reactions(kind, activity).await,
            Motivation::RelationshipManagement => {
                self.relationship_management(kind, activity).await
            }
            Motivation::Notification => self.announce(activity).await,
            Motivation::Negating => self.undo(activity).await,
            Motivation::CollectionManagement | Motivation::Questions => Err(Error::not_implemented(
                format!("processing of {kind} activities"),
            )),
            Motivation::EventRsvp
            | Motivation::GroupManagement
            | Motivation::ContentExperience
            | Motivation::GeoSocialEvents
            | Motivation::Offers => {
                debug!(target: "apub::process", %kind, "no side effects");
                Ok(activity)
            }
        }
    }

    async fn relationship_management(
        &self,
        kind: ActivityType,
        activity: Activity,
    ) -> Result<Activity> {
        match kind {
            ActivityType::Follow => Ok(activity),
            _ => self.reactions(kind, activity).await,
        }
    }

    async fn save_activity(&self, activity: &Activity) -> Result<()> {
        let flat = flatten_properties(Item::from(activity.clone()));
        match self.store.save(flat).await {
            Err(error) if error.is_duplicate_key() => {
                debug!(target: "apub::process", id = %activity.id(), "activity already stored");
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    pub(super) fn collection_store(&self) -> Result<&dyn CollectionStore> {
        self.store.collections().ok_or_else(|| {
            Error::Other(anyhow::anyhow!("store has no collection capability"))
        })
    }

    pub(super) async fn append_local(&self, fan_out: &mut FanOut, collection: Iri, item: &Item) {
        if !self.is_local(&collection) {
            debug!(target: "apub::process", %collection, "skip append to remote collection");
            return;
        }
        let outcome = match self.collection_store() {
            Ok(store) => store.add_to(&collection, item).await,
            Err(error) => Err(error),
        };
        fan_out.record(collection, outcome);
    }

    pub(super) async fn remove_local(&self, fan_out: &mut FanOut, collection: Iri, item: &Item) {
        if !self.is_local(&collection) {
            debug!(target: "apub::process", %collection, "skip removal from remote collection");
            return;
        }
        let outcome = match self.collection_store() {
            Ok(store) => store.remove_from(&collection, item).await,
            Err(error) => Err(error),
        };
        fan_out.record(collection, outcome);
    }
}
