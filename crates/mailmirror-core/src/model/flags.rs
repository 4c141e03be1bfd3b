//! Message flags and their letter encoding.
//!
//! The server packs flags into a single string of letters, e.g. `"ufa"` for
//! an unread, flagged message with an attachment. Decoding is total: letters
//! we do not know are ignored and order never matters.

use serde::{Deserialize, Serialize};

/// Decoded message flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)] // One bool per flag letter
pub struct MessageFlags {
    /// Message has been read (letter `u` absent).
    pub read: bool,
    /// Flagged for follow-up (`f`).
    pub flagged: bool,
    /// Has an attachment (`a`).
    pub attachment: bool,
    /// Replied to (`r`).
    pub replied: bool,
    /// Sent by the mailbox owner (`s`).
    pub sent_by_me: bool,
    /// Forwarded (`w`).
    pub forwarded: bool,
    /// Draft (`d`).
    pub draft: bool,
    /// Marked deleted, IMAP style (`x`).
    pub deleted: bool,
    /// Calendar invite (`v`).
    pub invite: bool,
    /// High priority (`!`).
    pub urgent: bool,
    /// Low priority (`?`).
    pub low_priority: bool,
    /// Scheduled for later delivery (`c`).
    pub scheduled: bool,
}

impl MessageFlags {
    /// Decodes a flag-letter string.
    #[must_use]
    pub fn parse(letters: &str) -> Self {
        let mut flags = Self {
            read: true,
            ..Self::default()
        };
        for letter in letters.chars() {
            match letter {
                'u' => flags.read = false,
                'f' => flags.flagged = true,
                'a' => flags.attachment = true,
                'r' => flags.replied = true,
                's' => flags.sent_by_me = true,
                'w' => flags.forwarded = true,
                'd' => flags.draft = true,
                'x' => flags.deleted = true,
                'v' => flags.invite = true,
                '!' => flags.urgent = true,
                '?' => flags.low_priority = true,
                'c' => flags.scheduled = true,
                _ => {}
            }
        }
        flags
    }

    /// Encodes the flags back into letters, in canonical order.
    #[must_use]
    pub fn to_letters(self) -> String {
        [
            (!self.read, 'u'),
            (self.flagged, 'f'),
            (self.attachment, 'a'),
            (self.replied, 'r'),
            (self.sent_by_me, 's'),
            (self.forwarded, 'w'),
            (self.draft, 'd'),
            (self.deleted, 'x'),
            (self.invite, 'v'),
            (self.urgent, '!'),
            (self.low_priority, '?'),
            (self.scheduled, 'c'),
        ]
        .into_iter()
        .filter_map(|(set, letter)| set.then_some(letter))
        .collect()
    }
}

impl std::fmt::Display for MessageFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_letters())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_is_read() {
        let flags = MessageFlags::parse("");
        assert!(flags.read);
        assert!(!flags.flagged);
        assert_eq!(flags.to_letters(), "");
    }

    #[test]
    fn test_parse_letters() {
        let flags = MessageFlags::parse("ufa!");
        assert!(!flags.read);
        assert!(flags.flagged);
        assert!(flags.attachment);
        assert!(flags.urgent);
        assert!(!flags.draft);
    }

    #[test]
    fn test_unknown_letters_ignored() {
        assert_eq!(MessageFlags::parse("zq9f"), MessageFlags::parse("f"));
    }

    #[test]
    fn test_canonical_encoding() {
        assert_eq!(MessageFlags::parse("dsu").to_letters(), "usd");
    }

    proptest! {
        #[test]
        fn prop_order_independent(letters in "[ufarswdxv!?cz]{0,12}") {
            let mut reversed: Vec<char> = letters.chars().collect();
            reversed.reverse();
            let reversed: String = reversed.into_iter().collect();
            prop_assert_eq!(MessageFlags::parse(&letters), MessageFlags::parse(&reversed));
        }

        #[test]
        fn prop_encoding_round_trips(letters in "[ufarswdxv!?c]{0,12}") {
            let flags = MessageFlags::parse(&letters);
            prop_assert_eq!(MessageFlags::parse(&flags.to_letters()), flags);
        }
    }
}
