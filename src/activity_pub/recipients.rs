//! Addressing resolution: which inboxes and outboxes an activity reaches.

use tracing::{debug, warn};

use crate::error::Result;

use super::machine::Processor;
use super::mailman::Client;
use super::model::{Activity, CollectionType, Iri, Item, ItemCollection};
use super::repo::WriteStore;

impl<S, C> Processor<S, C>
where
    S: WriteStore + 'static,
    C: Client + 'static,
{
    /// Resolve the addressing of `activity` into delivery targets.
    ///
    /// The local actor's outbox, the inbox of every addressed actor, the
    /// inboxes of the actors in addressed local collections and
    /// `received_in` itself. Blocked actors are left out, the public
    /// namespace maps to the shared inbox when there is one.
    pub async fn build_recipients(
        &self,
        activity: &Activity,
        received_in: &Iri,
    ) -> Result<ItemCollection> {
        let mut recipients = ItemCollection::new();
        let sender = activity.actor_iri().cloned();
        if let Some(actor) = activity.actor.as_ref().filter(|_| {
            sender
                .as_ref()
                .is_some_and(|iri| self.is_local(iri) && !iri.is_public())
        }) {
            recipients.append(self.collection_of(actor, CollectionType::Outbox).await);
        }

        for recipient in activity.base.recipients().iris() {
            if recipient.is_public() {
                match &self.shared_inbox {
                    Some(shared) => {
                        recipients.append(shared.clone());
                    }
                    None => debug!(target: "apub::recipients", "public namespace without shared inbox"),
                }
                continue;
            }
            if self.is_local(&recipient) {
                if let Ok(Item::Collection(collection)) = self.store.load(&recipient).await {
                    for member in collection.members().iris() {
                        if self.is_blocked(sender.as_ref(), &member).await {
                            continue;
                        }
                        if let Ok(Item::Actor(actor)) = self.load_iri(&member).await {
                            recipients.append(actor.delivery_inbox());
                        }
                    }
                    continue;
                }
                if self.is_blocked(sender.as_ref(), &recipient).await {
                    debug!(target: "apub::recipients", %recipient, "skip blocked recipient");
                    continue;
                }
            } else if CollectionType::split(&recipient).is_some() {
                debug!(target: "apub::recipients", %recipient, "skip remote collection");
                continue;
            }
            if let Some(inbox) = self.recipient_inbox(&recipient).await {
                recipients.append(inbox);
            }
        }
        recipients.append(received_in.clone());
        Ok(recipients)
    }

    async fn recipient_inbox(&self, recipient: &Iri) -> Option<Iri> {
        match self.load_iri(recipient).await {
            Ok(Item::Actor(actor)) => Some(actor.delivery_inbox()),
            Ok(other) => {
                debug!(target: "apub::recipients", %recipient, kind = ?other.kind(), "not an actor");
                None
            }
            Err(error) if self.is_local(recipient) => {
                debug!(target: "apub::recipients", %recipient, %error, "skip unknown local recipient");
                None
            }
            Err(error) => {
                warn!(target: "apub::recipients", %recipient, %error, "inbox by convention");
                Some(CollectionType::Inbox.of(recipient))
            }
        }
    }

    async fn is_blocked(&self, sender: Option<&Iri>, recipient: &Iri) -> bool {
        let Some(sender) = sender else {
            return false;
        };
        if !self.is_local(recipient) || recipient == sender {
            return false;
        }
        let blocked = self
            .collection_of(&Item::Iri(recipient.clone()), CollectionType::Blocked)
            .await;
        self.is_member(&blocked, sender).await
    }
}
