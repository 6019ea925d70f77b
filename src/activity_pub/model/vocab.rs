//! Closed ActivityStreams vocabularies used for dispatch.

use std::fmt::Display;
use std::str::FromStr;

use super::Iri;

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownType;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok($name::$variant),)+
                    _ => Err(UnknownType(s.to_string())),
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownType(pub String);

impl Display for UnknownType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown type {}", self.0)
    }
}

vocabulary!(
    /// Activity and IntransitiveActivity types of the core vocabulary.
    ActivityType {
        Accept,
        Add,
        Announce,
        Arrive,
        Block,
        Create,
        Delete,
        Dislike,
        Flag,
        Follow,
        Ignore,
        Invite,
        Join,
        Leave,
        Like,
        Listen,
        Move,
        Offer,
        Question,
        Reject,
        Read,
        Remove,
        TentativeReject,
        TentativeAccept,
        Travel,
        Undo,
        Update,
        View,
    }
);

vocabulary!(ActorType {
    Application,
    Group,
    Organization,
    Person,
    Service,
});

vocabulary!(CollectionKind {
    Collection,
    OrderedCollection,
    CollectionPage,
    OrderedCollectionPage,
});

vocabulary!(
    /// Activity categories, as grouped by the ActivityStreams vocabulary.
    Motivation {
        ContentManagement,
        CollectionManagement,
        Reactions,
        EventRsvp,
        GroupManagement,
        ContentExperience,
        GeoSocialEvents,
        Notification,
        RelationshipManagement,
        Negating,
        Offers,
        Questions,
    }
);

impl ActivityType {
    /// Every activity type belongs to exactly one motivation.
    pub fn motivation(&self) -> Motivation {
        use ActivityType::*;
        match self {
            Create | Update | Delete => Motivation::ContentManagement,
            Add | Remove | Move => Motivation::CollectionManagement,
            Like | Dislike | Flag | Ignore => Motivation::Reactions,
            Invite | TentativeAccept | TentativeReject => Motivation::EventRsvp,
            Join | Leave => Motivation::GroupManagement,
            Listen | Read | View => Motivation::ContentExperience,
            Arrive | Travel => Motivation::GeoSocialEvents,
            Announce => Motivation::Notification,
            Follow | Accept | Reject | Block => Motivation::RelationshipManagement,
            Undo => Motivation::Negating,
            Offer => Motivation::Offers,
            Question => Motivation::Questions,
        }
    }
    pub fn is_intransitive(&self) -> bool {
        matches!(
            self,
            ActivityType::Arrive | ActivityType::Travel | ActivityType::Question
        )
    }
    /// Activities whose side effects Undo knows how to reverse.
    pub fn is_undoable(&self) -> bool {
        matches!(
            self,
            ActivityType::Create
                | ActivityType::Like
                | ActivityType::Dislike
                | ActivityType::Block
                | ActivityType::Follow
                | ActivityType::Announce
                | ActivityType::Ignore
                | ActivityType::Flag
        )
    }
}

vocabulary!(
    /// Named collections kept by the store for actors and objects.
    CollectionType {
        Inbox,
        Outbox,
        Followers,
        Following,
        Liked,
        Likes,
        Shares,
        Replies,
        Blocked,
        Ignored,
    }
);

impl CollectionType {
    /// Collections an actor owns, in the order they are created.
    pub const OF_ACTOR: [CollectionType; 5] = [
        CollectionType::Inbox,
        CollectionType::Outbox,
        CollectionType::Followers,
        CollectionType::Following,
        CollectionType::Liked,
    ];
    pub const OF_OBJECT: [CollectionType; 3] = [
        CollectionType::Replies,
        CollectionType::Likes,
        CollectionType::Shares,
    ];

    /// Path segment and property name
    pub fn segment(&self) -> &'static str {
        match self {
            CollectionType::Inbox => "inbox",
            CollectionType::Outbox => "outbox",
            CollectionType::Followers => "followers",
            CollectionType::Following => "following",
            CollectionType::Liked => "liked",
            CollectionType::Likes => "likes",
            CollectionType::Shares => "shares",
            CollectionType::Replies => "replies",
            CollectionType::Blocked => "blocked",
            CollectionType::Ignored => "ignored",
        }
    }
    /// Collection IRI by convention, `{owner}/{segment}`
    pub fn of(&self, owner: &Iri) -> Iri {
        owner.join(self.segment())
    }
    /// Recognise a conventional collection IRI and return its owner.
    pub fn split(iri: &Iri) -> Option<(Iri, CollectionType)> {
        let segment = iri.last_segment();
        let kind = CollectionType::ALL
            .iter()
            .find(|kind| kind.segment() == segment)?;
        Some((iri.parent()?, *kind))
    }
}
