use std::sync::LazyLock;

use bimap::BiHashMap;

use crate::activity_pub::model::{ActivityType, ActorType, CollectionKind, PUBLIC_NS};

const TERMS: &[&str] = &[
    "@context",
    "@id",
    "@type",
    "https://www.w3.org/ns/activitystreams",
    PUBLIC_NS,
    "id",
    "type",
    "actor",
    "attachment",
    "attributedTo",
    "audience",
    "bcc",
    "bto",
    "cc",
    "content",
    "context",
    "endTime",
    "endpoints",
    "first",
    "followers",
    "following",
    "icon",
    "image",
    "inReplyTo",
    "inbox",
    "instrument",
    "items",
    "liked",
    "likes",
    "mediaType",
    "name",
    "next",
    "object",
    "orderedItems",
    "origin",
    "outbox",
    "owner",
    "preferredUsername",
    "publicKey",
    "publicKeyPem",
    "published",
    "replies",
    "result",
    "sharedInbox",
    "shares",
    "startTime",
    "summary",
    "tag",
    "target",
    "to",
    "totalItems",
    "updated",
    "url",
    "Article",
    "Document",
    "Event",
    "Image",
    "Mention",
    "Note",
    "Page",
    "Place",
    "Profile",
    "Tombstone",
    "Video",
];

static SYMBOL_TABLE: LazyLock<BiHashMap<&'static str, u32>> = LazyLock::new(|| {
    let vocab = TERMS
        .iter()
        .copied()
        .chain(ActivityType::ALL.iter().map(|t| t.as_str()))
        .chain(ActorType::ALL.iter().map(|t| t.as_str()))
        .chain(CollectionKind::ALL.iter().map(|t| t.as_str()));
    let mut table = BiHashMap::new();
    for (id, term) in vocab.enumerate() {
        table.insert(term, id as u32);
    }
    table
});

/// Symbols for the ActivityStreams terms most stored nodes repeat.
///
/// Ids are positional, reordering terms requires a new storage header version.
pub(super) fn activitystreams_symbol_table() -> &'static BiHashMap<&'static str, u32> {
    &SYMBOL_TABLE
}
