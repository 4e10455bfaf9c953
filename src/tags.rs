//! IRCv3 tag decoding for Twitch chat messages.
//!
//! Twitch prefixes most commands with a `@key=value;key2=value2` tag region
//! carrying structured metadata. [`Tags::parse`] keeps every pair verbatim in
//! [`Tags::all_tags`] and additionally extracts the handful of fields most
//! callers want typed (badges, emotes, color, sent timestamp, ids).
//!
//! Decoding never fails: malformed fragments degrade to the field defaults
//! and the remaining fragments are still decoded.

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Decoded tag information for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tags {
    /// The user's name as it should be displayed, with proper capitalization.
    pub display_name: String,

    /// Badges to show in front of the user's name, e.g. `moderator/1`.
    pub badges: BTreeSet<String>,

    /// Emotes used in the message: emote id to the list of `(begin, end)`
    /// character ranges where the emote occurs.
    pub emotes: BTreeMap<u64, Vec<(usize, usize)>>,

    /// Color for the user's display name, as 24-bit RGB.
    pub color: u32,

    /// When the message was sent, in seconds past the UNIX epoch.
    pub timestamp: u64,

    /// Fractional part of the send time, in milliseconds (0..=999).
    pub time_milliseconds: u32,

    /// Id of the channel the message was sent to.
    pub channel_id: u64,

    /// Id of the user who sent the message.
    pub user_id: u64,

    /// Every tag present on the wire, verbatim, including ones the decoder
    /// does not know about. The typed fields above are derived from this.
    pub all_tags: HashMap<String, String>,
}

impl Default for Tags {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            badges: BTreeSet::new(),
            emotes: BTreeMap::new(),
            color: 0xFFFFFF,
            timestamp: 0,
            time_milliseconds: 0,
            channel_id: 0,
            user_id: 0,
            all_tags: HashMap::new(),
        }
    }
}

impl Tags {
    /// Decode the raw tag region of a message (the text between `@` and the
    /// first space, without either delimiter).
    pub fn parse(raw: &str) -> Self {
        let mut tags = Self::default();
        for fragment in raw.split(';') {
            let Some((name, value)) = fragment.split_once('=') else {
                continue;
            };
            tags.all_tags.insert(name.to_string(), value.to_string());
            match name {
                "badges" => {
                    tags.badges.extend(
                        value
                            .split(',')
                            .filter(|badge| !badge.is_empty())
                            .map(str::to_string),
                    );
                }
                "color" => {
                    if let Some(hex) = value.strip_prefix('#') {
                        if let Ok(color) = u32::from_str_radix(hex, 16) {
                            tags.color = color;
                        }
                    }
                }
                "display-name" => {
                    tags.display_name = value.to_string();
                }
                "emotes" => {
                    for emote in value.split('/') {
                        let Some((id, instances)) = emote.split_once(':') else {
                            continue;
                        };
                        let Ok(id) = id.parse::<u64>() else {
                            continue;
                        };
                        let ranges = tags.emotes.entry(id).or_default();
                        for instance in instances.split(',') {
                            let Some((begin, end)) = instance.split_once('-') else {
                                continue;
                            };
                            if let (Ok(begin), Ok(end)) = (begin.parse(), end.parse()) {
                                ranges.push((begin, end));
                            }
                        }
                    }
                }
                "tmi-sent-ts" => {
                    if let Ok(millis) = value.parse::<u64>() {
                        tags.timestamp = millis / 1000;
                        tags.time_milliseconds = (millis % 1000) as u32;
                    }
                }
                "room-id" => {
                    tags.channel_id = value.parse().unwrap_or(0);
                }
                "user-id" => {
                    tags.user_id = value.parse().unwrap_or(0);
                }
                _ => {}
            }
        }
        tags
    }

    /// The raw value of the named tag, or `""` if it is absent.
    pub fn value(&self, name: &str) -> &str {
        self.all_tags.get(name).map(String::as_str).unwrap_or("")
    }

    /// The value of the named tag parsed as an unsigned number, or 0 if the
    /// tag is absent or not numeric.
    pub fn number(&self, name: &str) -> u64 {
        self.value(name).parse().unwrap_or(0)
    }
}

/// Unescape an IRCv3 tag value.
/// `\:` → `;`, `\s` → space, `\\` → `\`, `\r` → CR, `\n` → LF; a backslash
/// before any other character is dropped, as is a trailing backslash.
pub fn unescape_value(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => result.push(';'),
            Some('s') => result.push(' '),
            Some('\\') => result.push('\\'),
            Some('r') => result.push('\r'),
            Some('n') => result.push('\n'),
            Some(other) => result.push(other),
            None => {}
        }
    }
    result
}
