//! Entity normalizer.
//!
//! Turns wire records into the canonical [`Message`] and [`Conversation`]
//! shapes. Every function here is pure and total: a missing or malformed
//! field becomes a default value, never an error, so a bad payload degrades
//! the view instead of aborting a page load or a delta batch.
//!
//! The same rules serve full responses and delta patches. Patches go through
//! [`normalize_message_patch`] and [`normalize_conversation_patch`], which
//! keep only the fields the server actually sent.

use chrono::{DateTime, Utc};
use mailmirror_wire::{WireConversation, WireMessage, WireMimePart, WireParticipant};

use crate::model::{
    Attachment, Conversation, ConversationId, ConversationMessage, ConversationPatch, FolderId,
    Message, MessageFlags, MessageId, MessagePatch, Participant, ParticipantRole, TagCatalog,
    TagId,
};

/// Normalizes a wire message.
///
/// `is_complete` states whether the record came from a full fetch; only then
/// are body and attachments extracted.
#[must_use]
pub fn normalize_message(wire: &WireMessage, is_complete: bool) -> Message {
    let (body, attachments) = if is_complete {
        (find_body(&wire.parts), collect_attachments(&wire.parts))
    } else {
        (None, Vec::new())
    };

    Message {
        id: MessageId::new(wire.id.clone().unwrap_or_default()),
        folder_id: FolderId::new(wire.folder_id.clone().unwrap_or_default()),
        conversation_id: wire
            .conversation_id
            .as_deref()
            .filter(|cid| !cid.is_empty())
            .map(ConversationId::from),
        subject: wire.subject.clone().unwrap_or_default(),
        fragment: wire.fragment.clone().unwrap_or_default(),
        date: wire.date.and_then(parse_date),
        size: wire.size.unwrap_or_default(),
        body,
        attachments,
        participants: normalize_participants(&wire.participants),
        flags: MessageFlags::parse(wire.flags.as_deref().unwrap_or_default()),
        tags: parse_id_list(wire.tag_ids.as_deref().unwrap_or_default())
            .into_iter()
            .map(TagId::from)
            .collect(),
        is_complete,
    }
}

/// Normalizes a wire conversation.
///
/// The tag catalog resolves tag names when the record carries names but no
/// ids.
#[must_use]
pub fn normalize_conversation(wire: &WireConversation, tags: &TagCatalog) -> Conversation {
    let flags = MessageFlags::parse(wire.flags.as_deref().unwrap_or_default());
    let messages: Vec<ConversationMessage> = wire
        .messages
        .iter()
        .filter_map(|m| {
            let id = m.id.as_deref().filter(|id| !id.is_empty())?;
            Some(ConversationMessage {
                id: MessageId::from(id),
                folder_id: FolderId::new(m.folder_id.clone().unwrap_or_default()),
                date: m.date.and_then(parse_date),
            })
        })
        .collect();
    let listed = u32::try_from(messages.len()).unwrap_or(u32::MAX);
    let unread_count = wire.unread_count.unwrap_or(u32::from(!flags.read));

    Conversation {
        id: ConversationId::new(wire.id.clone().unwrap_or_default()),
        subject: wire.subject.clone().unwrap_or_default(),
        fragment: wire.fragment.clone().unwrap_or_default(),
        date: wire.date.and_then(parse_date),
        participants: normalize_participants(&wire.participants),
        messages,
        messages_in_conversation: wire.message_count.unwrap_or(listed).max(listed),
        read: unread_count == 0,
        flagged: flags.flagged,
        unread_count,
        tags: resolve_tags(wire.tag_ids.as_deref(), wire.tag_names.as_deref(), tags)
            .unwrap_or_default(),
    }
}

/// Normalizes a delta patch for a message.
///
/// Returns `None` when the entry has no id.
#[must_use]
pub fn normalize_message_patch(wire: &WireMessage, tags: &TagCatalog) -> Option<MessagePatch> {
    let id = wire.id.as_deref().filter(|id| !id.is_empty())?;
    Some(MessagePatch {
        id: MessageId::from(id),
        folder_id: wire.folder_id.as_deref().map(FolderId::from),
        conversation_id: wire
            .conversation_id
            .as_deref()
            .filter(|cid| !cid.is_empty())
            .map(ConversationId::from),
        subject: wire.subject.clone(),
        fragment: wire.fragment.clone(),
        date: wire.date.and_then(parse_date),
        flags: wire.flags.as_deref().map(MessageFlags::parse),
        tags: resolve_tags(wire.tag_ids.as_deref(), wire.tag_names.as_deref(), tags),
    })
}

/// Normalizes a delta patch for a conversation.
///
/// Returns `None` when the entry has no id.
#[must_use]
pub fn normalize_conversation_patch(
    wire: &WireConversation,
    tags: &TagCatalog,
) -> Option<ConversationPatch> {
    let id = wire.id.as_deref().filter(|id| !id.is_empty())?;
    let flags = wire.flags.as_deref().map(MessageFlags::parse);
    Some(ConversationPatch {
        id: ConversationId::from(id),
        subject: wire.subject.clone(),
        fragment: wire.fragment.clone(),
        date: wire.date.and_then(parse_date),
        read: flags.map(|f| f.read),
        flagged: flags.map(|f| f.flagged),
        unread_count: wire.unread_count,
        messages_in_conversation: wire.message_count,
        tags: resolve_tags(wire.tag_ids.as_deref(), wire.tag_names.as_deref(), tags),
    })
}

/// Splits a comma-joined id list, dropping blanks.
#[must_use]
pub fn parse_id_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Converts wire milliseconds to a timestamp. Out-of-range values are dropped.
fn parse_date(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Resolves tags from an id list, falling back to a name list.
///
/// Returns `None` when neither was sent, so patches leave tags untouched.
fn resolve_tags(ids: Option<&str>, names: Option<&str>, catalog: &TagCatalog) -> Option<Vec<TagId>> {
    if let Some(ids) = ids {
        return Some(parse_id_list(ids).into_iter().map(TagId::from).collect());
    }
    let names = names?;
    Some(
        parse_id_list(names)
            .iter()
            .filter_map(|name| {
                let id = catalog.id_for_name(name);
                if id.is_none() {
                    tracing::debug!(name = %name, "Unknown tag name");
                }
                id.cloned()
            })
            .collect(),
    )
}

fn normalize_participants(wire: &[WireParticipant]) -> Vec<Participant> {
    wire.iter()
        .filter_map(|p| {
            let address = p.address.clone().filter(|a| !a.is_empty())?;
            Some(Participant {
                role: ParticipantRole::from_letter(p.role.as_deref().unwrap_or_default()),
                name: p
                    .name
                    .clone()
                    .or_else(|| p.display.clone())
                    .unwrap_or_default(),
                address,
            })
        })
        .collect()
}

/// Picks the display body.
///
/// The part the server marked as body wins; otherwise the first plain text
/// part, then the first HTML part.
fn find_body(parts: &[WireMimePart]) -> Option<String> {
    find_part(parts, &|p: &WireMimePart| p.body)
        .or_else(|| find_part(parts, &|p: &WireMimePart| is_inline_of(p, "text/plain")))
        .or_else(|| find_part(parts, &|p: &WireMimePart| is_inline_of(p, "text/html")))
        .and_then(|p| p.content.clone())
}

fn is_inline_of(part: &WireMimePart, content_type: &str) -> bool {
    part.content.is_some()
        && !is_attachment(part)
        && part
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.eq_ignore_ascii_case(content_type))
}

fn find_part<'a>(
    parts: &'a [WireMimePart],
    pred: &dyn Fn(&WireMimePart) -> bool,
) -> Option<&'a WireMimePart> {
    for part in parts {
        if pred(part) {
            return Some(part);
        }
        if let Some(found) = find_part(&part.parts, pred) {
            return Some(found);
        }
    }
    None
}

fn is_attachment(part: &WireMimePart) -> bool {
    part.disposition.as_deref() == Some("attachment")
        || part.filename.as_deref().is_some_and(|f| !f.is_empty())
}

fn collect_attachments(parts: &[WireMimePart]) -> Vec<Attachment> {
    let mut out = Vec::new();
    for part in parts {
        if is_attachment(part) {
            out.push(Attachment {
                part: part.part.clone().unwrap_or_default(),
                filename: part.filename.clone().unwrap_or_default(),
                content_type: part
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                size: part.size.unwrap_or_default(),
            });
        }
        out.extend(collect_attachments(&part.parts));
    }
    out
}
