//! Events emitted by the session engine for the host application to consume.
//!
//! Implement [`EventSink`] and hand it to the client; every method has a
//! default no-op body, so override only the events you care about. All
//! methods are invoked from the engine's worker thread, one at a time, and
//! the engine holds no locks while calling them, so a sink may call back
//! into the client API.

use crate::tags::Tags;

/// A user joined or left a channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Membership {
    /// The channel whose membership changed.
    pub channel: String,
    /// The user who joined or left.
    pub user: String,
}

/// A message sent to a channel, or privately to us.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatMessage {
    pub tags: Tags,
    /// The channel the message was sent to, or the recipient nick for a
    /// private message.
    pub channel: String,
    /// The user who sent the message.
    pub user: String,
    /// The message content. For an action (`/me …`), the CTCP framing is
    /// already stripped.
    pub content: String,
    /// The id of the message, from the `id` tag.
    pub message_id: String,
    /// Bits cheered with the message, if any.
    pub bits: u64,
    /// Whether the message was sent as an action (`/me …`).
    pub is_action: bool,
}

/// A whisper sent to us by another user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Whisper {
    pub tags: Tags,
    /// The user who sent the whisper.
    pub user: String,
    /// The whisper content.
    pub message: String,
}

/// A notice from the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notice {
    /// The notice id, from the `msg-id` tag.
    pub id: String,
    /// The channel the notice applies to, or empty for a global notice.
    pub channel: String,
    /// The notice text.
    pub message: String,
}

/// A hosting change announced by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostChange {
    /// Whether hosting was turned on (`false` means hosting stopped).
    pub on: bool,
    /// The channel doing the hosting.
    pub hosting: String,
    /// The channel being hosted, when hosting was turned on.
    pub being_hosted: String,
    /// Viewers from the hosting channel visiting the hosted channel.
    pub viewers: u64,
}

/// A room mode change.
///
/// Modes are `slow`, `followers-only`, `r9k`, `emote-only`, and
/// `subs-only`; the meaning of `parameter` depends on the mode (seconds for
/// `slow`, minutes or -1 for `followers-only`, 0/1 toggles for the rest).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomModeChange {
    /// Which mode changed.
    pub mode: String,
    /// The parameter accompanying the change.
    pub parameter: i64,
    /// The channel whose mode changed.
    pub channel: String,
    /// The id of the channel whose mode changed.
    pub channel_id: u64,
}

/// What kind of chat clear happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClearKind {
    /// All messages cleared from chat.
    #[default]
    ClearAll,
    /// A single message deleted from chat.
    ClearMessage,
    /// A user timed out for a fixed duration.
    Timeout,
    /// A user permanently banned from the channel.
    Ban,
}

/// Chat cleared, a message deleted, or a user timed out or banned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clear {
    pub kind: ClearKind,
    /// The channel the clear occurred in.
    pub channel: String,
    /// The user who was timed out or banned (timeout/ban only).
    pub user: String,
    /// Human-readable reason for the timeout or ban, if given.
    pub reason: String,
    /// Id of the deleted message (message deletion only).
    pub offending_message_id: String,
    /// Content of the deleted message (message deletion only).
    pub offending_message_content: String,
    /// Timeout duration in seconds (timeout only).
    pub duration: u64,
    pub tags: Tags,
}

/// A user gained or lost moderator status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModChange {
    /// The channel the status applies to.
    pub channel: String,
    /// The user whose status changed.
    pub user: String,
    /// Whether the user is now a moderator.
    pub is_mod: bool,
}

/// Our own state, global or within one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserState {
    /// Whether this state applies globally rather than to one channel.
    pub global: bool,
    /// The channel the state applies to, when not global.
    pub channel: String,
    pub tags: Tags,
}

/// What kind of subscription announcement was received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubKind {
    /// Unrecognized announcement; check the `msg-id` tag.
    #[default]
    Unknown,
    /// New subscription, or one after a lapse.
    Sub,
    /// Renewed subscription.
    Resub,
    /// Subscription gifted to a user by another user.
    Gifted,
    /// Subscriptions gifted to the channel community.
    MysteryGift,
}

/// A subscription announcement in a channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sub {
    pub kind: SubKind,
    /// The channel subscribed to.
    pub channel: String,
    /// The subscribing (or gifting) user.
    pub user: String,
    /// Display name of the gift recipient, for gifted subs.
    pub recipient_display_name: String,
    /// User name of the gift recipient, for gifted subs.
    pub recipient_user_name: String,
    /// Id of the gift recipient, for gifted subs.
    pub recipient_id: u64,
    /// Number of community subs being gifted, for mystery gifts.
    pub mass_gift_count: u64,
    /// Total gifted subs the gifter has given in this channel.
    pub sender_count: u64,
    /// Message the user attached to the subscription, if any.
    pub user_message: String,
    /// Message the system attached to the announcement.
    pub system_message: String,
    /// Name of the chosen subscription plan.
    pub plan_name: String,
    /// Numeric id of the chosen subscription plan.
    pub plan_id: u64,
    /// Consecutive months subscribed, for renewals.
    pub months: u64,
    pub tags: Tags,
}

/// An incoming raid announcement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Raid {
    /// The channel being raided.
    pub channel: String,
    /// The raiding user/channel.
    pub raider: String,
    /// Number of raiding viewers.
    pub viewers: u64,
    /// Message the system attached to the announcement.
    pub system_message: String,
    pub tags: Tags,
}

/// A ritual announcement (e.g. a new chatter's first message).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ritual {
    /// The channel the ritual occurred in.
    pub channel: String,
    /// The user performing the ritual.
    pub user: String,
    /// The ritual name, e.g. `new_chatter`.
    pub ritual: String,
    /// Message the system attached to the announcement.
    pub system_message: String,
    pub tags: Tags,
}

/// Receiver for everything the session engine reports back to the host.
///
/// Every method defaults to doing nothing.
pub trait EventSink: Send + Sync {
    /// The server is about to go down; expect a disconnection shortly and
    /// consider logging back in after a short wait.
    fn doom(&self) {}

    /// The session has successfully logged into the server.
    fn logged_in(&self) {}

    /// The session has ended: logged out, disconnected, or the connection
    /// could not be established in the first place.
    fn logged_out(&self) {}

    /// A user joined a channel.
    fn join(&self, _membership: Membership) {}

    /// A user left a channel.
    fn leave(&self, _membership: Membership) {}

    /// A message was sent to a channel.
    fn message(&self, _message: ChatMessage) {}

    /// A message was sent privately to us. Generally only seen from the
    /// special user `jtv`, e.g. to announce that someone is hosting us.
    fn private_message(&self, _message: ChatMessage) {}

    /// A whisper was sent to us.
    fn whisper(&self, _whisper: Whisper) {}

    /// The server sent a notice.
    fn notice(&self, _notice: Notice) {}

    /// A hosting change was announced.
    fn host(&self, _host: HostChange) {}

    /// A room mode changed.
    fn room_mode_change(&self, _change: RoomModeChange) {}

    /// Chat was cleared, a message deleted, or a user timed out or banned.
    fn clear(&self, _clear: Clear) {}

    /// A user's moderator status was announced.
    fn mod_changed(&self, _change: ModChange) {}

    /// The server reported our user state, globally or for one channel.
    fn user_state(&self, _state: UserState) {}

    /// A subscription was announced in a channel.
    fn sub(&self, _sub: Sub) {}

    /// A raid is coming into a channel.
    fn raid(&self, _raid: Raid) {}

    /// A ritual was announced in a channel.
    fn ritual(&self, _ritual: Ritual) {}
}

/// Sink used until the host installs one; ignores everything.
pub(crate) struct NullSink;

impl EventSink for NullSink {}
