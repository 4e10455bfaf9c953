//! The Twitch chat session engine and public API.
//!
//! [`Client`] owns a worker thread that drives one chat session at a time:
//! capability negotiation (`CAP LS` → optional `CAP REQ` → `CAP END`),
//! authentication (`PASS`/`NICK`), waiting for the end-of-MOTD numeric that
//! confirms the log-in, and steady-state traffic. Public methods never
//! block; they post actions into a queue the worker drains. Received text
//! flows through the line codec and tag decoder and comes out of the
//! caller's [`EventSink`] as typed events, always on the worker thread.
//!
//! The engine owns no sockets and no wall clock: hosts inject a connection
//! factory and (optionally) a [`Clock`]. Without a clock, handshake steps
//! simply never time out.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::clock::Clock;
use crate::connection::Connection;
use crate::diagnostics::{DiagnosticHandler, DiagnosticsSender, Subscription};
use crate::event::{
    ChatMessage, Clear, ClearKind, EventSink, HostChange, Membership, ModChange, Notice, NullSink,
    Raid, Ritual, RoomModeChange, Sub, SubKind, UserState, Whisper,
};
use crate::irc::{self, Message, CRLF};
use crate::tags::unescape_value;

/// How long to wait for the server's answer to each handshake step before
/// giving up on the log-in.
const LOG_IN_TIMEOUT_SECONDS: f64 = 5.0;

/// How often to scan for expired handshake steps while any are pending.
const TIMEOUT_SCAN_INTERVAL: Duration = Duration::from_millis(50);

/// The capabilities requested when the server advertises all of them.
const REQUIRED_CAPS: [&str; 3] = [
    "twitch.tv/commands",
    "twitch.tv/membership",
    "twitch.tv/tags",
];

/// Factory invoked once per log-in attempt to produce a fresh connection.
pub type ConnectionFactory = Arc<dyn Fn() -> Arc<dyn Connection> + Send + Sync>;

/// A unit of work for the engine worker.
enum Action {
    LogIn {
        nickname: String,
        token: String,
        anonymous: bool,
    },
    LogOut {
        farewell: String,
    },
    Join {
        channel: String,
    },
    Leave {
        channel: String,
    },
    SendMessage {
        channel: String,
        message: String,
    },
    SendWhisper {
        nickname: String,
        message: String,
    },
    Received {
        text: String,
    },
    ServerDisconnected,
}

/// Which server response a pending handshake step is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AwaitKind {
    /// The final `CAP … LS` advertisement.
    CapList,
    /// The `CAP … ACK`/`NAK` answer to our capability request.
    CapAck,
    /// The end-of-MOTD numeric (376) confirming the log-in.
    Motd,
}

/// A handshake step parked until the server answers or the step expires.
struct Pending {
    kind: AwaitKind,
    /// Credentials carried forward so the next step can be issued when the
    /// awaited response arrives.
    nickname: String,
    token: String,
    /// Clock time at which this step times out, if a clock is installed.
    expiration: Option<f64>,
}

/// Session state owned exclusively by the worker thread.
#[derive(Default)]
struct Session {
    connection: Option<Arc<dyn Connection>>,
    /// Receive buffer; complete lines are consumed off the front, partial
    /// lines wait for more bytes.
    data_received: String,
    /// Whether this session was opened without credentials (receive-only).
    anonymous: bool,
    /// Latched once the end-of-MOTD numeric has been seen this session.
    logged_in: bool,
    /// Capabilities the server has advertised via `CAP LS`.
    caps_advertised: HashSet<String>,
    /// Handshake steps awaiting a server response.
    awaiting: Vec<Pending>,
}

/// State shared between the caller-facing handle and the worker.
struct Queue {
    actions: VecDeque<Action>,
    stop: bool,
    factory: Option<ConnectionFactory>,
    clock: Option<Arc<dyn Clock>>,
    sink: Arc<dyn EventSink>,
}

struct Inner {
    queue: Mutex<Queue>,
    wake: Condvar,
    diag: DiagnosticsSender,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn post(&self, action: Action) {
        let mut queue = self.lock();
        if queue.stop {
            return;
        }
        queue.actions.push_back(action);
        self.wake.notify_one();
    }
}

/// A user agent for Twitch chat.
///
/// Configure it with a connection factory, an optional clock, and an event
/// sink, then drive it with the non-blocking request methods. Dropping the
/// client stops the engine and joins its worker thread.
pub struct Client {
    inner: Arc<Inner>,
    worker: Option<JoinHandle<()>>,
}

impl Client {
    /// Create a client and start its engine worker.
    pub fn new() -> Self {
        let inner = Arc::new(Inner {
            queue: Mutex::new(Queue {
                actions: VecDeque::new(),
                stop: false,
                factory: None,
                clock: None,
                sink: Arc::new(NullSink),
            }),
            wake: Condvar::new(),
            diag: DiagnosticsSender::new("TMI"),
        });
        let worker_inner = Arc::clone(&inner);
        let worker = thread::spawn(move || {
            Worker {
                inner: worker_inner,
                session: Session::default(),
            }
            .run()
        });
        Self {
            inner,
            worker: Some(worker),
        }
    }

    /// Install the factory used to open a connection for each log-in.
    pub fn set_connection_factory(
        &self,
        factory: impl Fn() -> Arc<dyn Connection> + Send + Sync + 'static,
    ) {
        self.inner.lock().factory = Some(Arc::new(factory));
    }

    /// Install the clock used to expire handshake steps. Without one,
    /// handshake steps wait indefinitely.
    pub fn set_clock(&self, clock: Arc<dyn Clock>) {
        self.inner.lock().clock = Some(clock);
    }

    /// Install the sink that receives all session events.
    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        self.inner.lock().sink = sink;
    }

    /// Subscribe to wire-level diagnostics (each line sent and received) at
    /// or above `min_level`.
    pub fn subscribe_to_diagnostics(
        &self,
        handler: DiagnosticHandler,
        min_level: usize,
    ) -> Subscription {
        self.inner.diag.subscribe(handler, min_level)
    }

    /// Log into Twitch chat as a registered user or bot.
    ///
    /// `nickname` must match the Twitch account, all lower-case; `token` is
    /// the account's OAuth token, without the `oauth:` prefix.
    pub fn log_in(&self, nickname: &str, token: &str) {
        self.inner.post(Action::LogIn {
            nickname: nickname.to_string(),
            token: token.to_string(),
            anonymous: false,
        });
    }

    /// Log into Twitch chat anonymously. The session can receive messages
    /// but not send them.
    pub fn log_in_anonymously(&self) {
        self.inner.post(Action::LogIn {
            nickname: format!("justinfan{}", rand::random::<u32>()),
            token: String::new(),
            anonymous: true,
        });
    }

    /// Log out of Twitch chat. A non-empty `farewell` is sent in the QUIT
    /// command before the connection is closed.
    pub fn log_out(&self, farewell: &str) {
        self.inner.post(Action::LogOut {
            farewell: farewell.to_string(),
        });
    }

    /// Join a chat channel.
    pub fn join(&self, channel: &str) {
        self.inner.post(Action::Join {
            channel: channel.to_string(),
        });
    }

    /// Leave a chat channel.
    pub fn leave(&self, channel: &str) {
        self.inner.post(Action::Leave {
            channel: channel.to_string(),
        });
    }

    /// Send a message to a chat channel.
    pub fn send_message(&self, channel: &str, message: &str) {
        self.inner.post(Action::SendMessage {
            channel: channel.to_string(),
            message: message.to_string(),
        });
    }

    /// Send a whisper to another user.
    pub fn send_whisper(&self, nickname: &str, message: &str) {
        self.inner.post(Action::SendWhisper {
            nickname: nickname.to_string(),
            message: message.to_string(),
        });
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        {
            let mut queue = self.inner.lock();
            queue.stop = true;
            self.inner.wake.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// The engine worker: sole owner of the session state.
struct Worker {
    inner: Arc<Inner>,
    session: Session,
}

impl Worker {
    fn run(mut self) {
        let mut queue = self.inner.lock();
        while !queue.stop {
            drop(queue);
            self.process_timeouts();
            queue = self.inner.lock();
            while !queue.stop {
                let Some(action) = queue.actions.pop_front() else {
                    break;
                };
                drop(queue);
                self.perform(action);
                queue = self.inner.lock();
            }
            if queue.stop {
                break;
            }
            if self.session.awaiting.is_empty() {
                queue = self
                    .inner
                    .wake
                    .wait_while(queue, |q| !q.stop && q.actions.is_empty())
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            } else {
                // Bounded wait so expirations are noticed within the scan
                // interval even when the server goes quiet.
                queue = self
                    .inner
                    .wake
                    .wait_timeout_while(queue, TIMEOUT_SCAN_INTERVAL, |q| {
                        !q.stop && q.actions.is_empty()
                    })
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .0;
            }
        }
    }

    fn factory(&self) -> Option<ConnectionFactory> {
        self.inner.lock().factory.clone()
    }

    fn clock(&self) -> Option<Arc<dyn Clock>> {
        self.inner.lock().clock.clone()
    }

    fn sink(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.inner.lock().sink)
    }

    /// Clock time at which a handshake step issued now should expire.
    fn deadline(&self) -> Option<f64> {
        self.clock().map(|clock| clock.now() + LOG_IN_TIMEOUT_SECONDS)
    }

    fn perform(&mut self, action: Action) {
        match action {
            Action::LogIn {
                nickname,
                token,
                anonymous,
            } => self.perform_log_in(nickname, token, anonymous),
            Action::LogOut { farewell } => self.disconnect(&farewell),
            Action::Join { channel } => self.send_connected(&format!("JOIN #{channel}")),
            Action::Leave { channel } => self.send_connected(&format!("PART #{channel}")),
            Action::SendMessage { channel, message } => {
                if !self.session.anonymous {
                    self.send_connected(&format!("PRIVMSG #{channel} :{message}"));
                }
            }
            Action::SendWhisper { nickname, message } => {
                if !self.session.anonymous {
                    self.send_connected(&format!("PRIVMSG #jtv :.w {nickname} {message}"));
                }
            }
            Action::Received { text } => self.perform_received(text),
            Action::ServerDisconnected => self.disconnect(""),
        }
    }

    /// Send one line if connected; silently do nothing otherwise.
    fn send_connected(&mut self, line: &str) {
        let Some(connection) = self.session.connection.clone() else {
            return;
        };
        self.send_line(connection.as_ref(), line);
    }

    /// Send one line on the given connection, publishing it to diagnostics
    /// with credentials redacted.
    fn send_line(&self, connection: &dyn Connection, line: &str) {
        if line.starts_with("PASS oauth:") {
            self.inner.diag.send(0, "< PASS oauth:**********************");
        } else {
            self.inner.diag.send(0, &format!("< {line}"));
        }
        connection.send(&format!("{line}{CRLF}"));
    }

    fn perform_log_in(&mut self, nickname: String, token: String, anonymous: bool) {
        if self.session.connection.is_some() {
            return;
        }
        let Some(factory) = self.factory() else {
            tracing::warn!("log-in requested but no connection factory is installed");
            self.sink().logged_out();
            return;
        };
        let connection = factory();
        let inner = Arc::clone(&self.inner);
        connection.set_receive_handler(Box::new(move |text| {
            inner.post(Action::Received {
                text: text.to_string(),
            });
        }));
        let inner = Arc::clone(&self.inner);
        connection.set_disconnect_handler(Box::new(move || {
            inner.post(Action::ServerDisconnected);
        }));
        if !connection.connect() {
            tracing::warn!("connection to the chat server could not be established");
            self.sink().logged_out();
            return;
        }
        tracing::debug!(nickname = %nickname, anonymous, "connected, negotiating capabilities");
        self.session.caps_advertised.clear();
        self.session.anonymous = anonymous;
        self.send_line(connection.as_ref(), "CAP LS 302");
        self.session.connection = Some(connection);
        let expiration = self.deadline();
        self.session.awaiting.push(Pending {
            kind: AwaitKind::CapList,
            nickname,
            token,
            expiration,
        });
    }

    /// Tear down the current session, if any: send a QUIT when a farewell
    /// was given, drop the transport, reset session state, and report the
    /// log-out.
    fn disconnect(&mut self, farewell: &str) {
        let Some(connection) = self.session.connection.take() else {
            return;
        };
        if !farewell.is_empty() {
            self.send_line(connection.as_ref(), &format!("QUIT :{farewell}"));
        }
        connection.disconnect();
        self.session.awaiting.clear();
        self.session.caps_advertised.clear();
        self.session.data_received.clear();
        self.session.logged_in = false;
        self.sink().logged_out();
    }

    /// Expire pending handshake steps. Each expired step ends the session
    /// with a farewell naming what was being waited for.
    fn process_timeouts(&mut self) {
        if self.session.awaiting.is_empty() {
            return;
        }
        let Some(clock) = self.clock() else {
            return;
        };
        let now = clock.now();
        let mut index = 0;
        while index < self.session.awaiting.len() {
            let expired = self.session.awaiting[index]
                .expiration
                .is_some_and(|at| now >= at);
            if expired {
                let pending = self.session.awaiting.remove(index);
                let farewell = match pending.kind {
                    AwaitKind::CapList => "Timeout waiting for capability list",
                    AwaitKind::CapAck => "Timeout waiting for response to capability request",
                    AwaitKind::Motd => "Timeout waiting for MOTD",
                };
                tracing::debug!(farewell, "handshake step timed out");
                self.disconnect(farewell);
            } else {
                index += 1;
            }
        }
    }

    fn perform_received(&mut self, text: String) {
        self.session.data_received.push_str(&text);
        while let Some(line) = irc::next_line(&mut self.session.data_received) {
            self.inner.diag.send(0, &format!("> {line}"));
            let message = Message::parse(&line);
            self.dispatch(message);
        }
    }

    fn dispatch(&mut self, message: Message) {
        match message.command.as_str() {
            "376" => self.handle_motd(),
            "PING" => self.handle_ping(&message),
            "CAP" => self.handle_cap(&message),
            "JOIN" => self.handle_membership(&message, true),
            "PART" => self.handle_membership(&message, false),
            "PRIVMSG" => self.handle_privmsg(message),
            "WHISPER" => self.handle_whisper(message),
            "NOTICE" => self.handle_notice(message),
            "HOSTTARGET" => self.handle_host_target(&message),
            "ROOMSTATE" => self.handle_room_state(&message),
            "CLEARCHAT" => self.handle_clear_chat(message),
            "CLEARMSG" => self.handle_clear_message(message),
            "MODE" => self.handle_mode(&message),
            "GLOBALUSERSTATE" => self.handle_global_user_state(message),
            "USERSTATE" => self.handle_user_state(message),
            "RECONNECT" => self.sink().doom(),
            "USERNOTICE" => self.handle_user_notice(message),
            _ => {}
        }
    }

    /// End-of-MOTD: the log-in is confirmed. Repeats are ignored.
    fn handle_motd(&mut self) {
        let before = self.session.awaiting.len();
        self.session.awaiting.retain(|p| p.kind != AwaitKind::Motd);
        if self.session.awaiting.len() != before && !self.session.logged_in {
            self.session.logged_in = true;
            self.sink().logged_in();
        }
    }

    fn handle_ping(&mut self, message: &Message) {
        let Some(server) = message.params.first() else {
            return;
        };
        self.send_connected(&format!("PONG :{server}"));
    }

    /// Match a CAP response against the pending handshake steps, oldest
    /// first, removing each step the response completes. Steps issued while
    /// processing land at the back of the list.
    fn handle_cap(&mut self, message: &Message) {
        let pending = std::mem::take(&mut self.session.awaiting);
        let mut retained = Vec::with_capacity(pending.len());
        for entry in pending {
            let completed = match entry.kind {
                AwaitKind::CapList => self.process_cap_list(&entry, message),
                AwaitKind::CapAck => self.process_cap_ack(&entry, message),
                AwaitKind::Motd => false,
            };
            if !completed {
                retained.push(entry);
            }
        }
        retained.append(&mut self.session.awaiting);
        self.session.awaiting = retained;
    }

    /// `CAP … LS`: accumulate advertised capabilities. An intermediate
    /// advertisement (`*`) keeps the step pending; the final one decides
    /// whether to request our capabilities or authenticate directly.
    fn process_cap_list(&mut self, pending: &Pending, message: &Message) -> bool {
        if message.params.get(1).map(String::as_str) != Some("LS") {
            return false;
        }
        match message.params.get(2).map(String::as_str) {
            Some("*") => {
                if let Some(caps) = message.params.get(3) {
                    self.session
                        .caps_advertised
                        .extend(caps.split_whitespace().map(str::to_string));
                }
                false
            }
            Some(caps) => {
                self.session
                    .caps_advertised
                    .extend(caps.split_whitespace().map(str::to_string));
                if REQUIRED_CAPS
                    .iter()
                    .all(|cap| self.session.caps_advertised.contains(*cap))
                {
                    self.request_capabilities(pending);
                } else {
                    self.authenticate(pending);
                }
                true
            }
            None => false,
        }
    }

    /// `CAP … ACK`/`NAK`: either way the negotiation is over; authenticate.
    fn process_cap_ack(&mut self, pending: &Pending, message: &Message) -> bool {
        match message.params.get(1).map(String::as_str) {
            Some("ACK") | Some("NAK") => {
                self.authenticate(pending);
                true
            }
            _ => false,
        }
    }

    fn request_capabilities(&mut self, pending: &Pending) {
        let Some(connection) = self.session.connection.clone() else {
            return;
        };
        self.send_line(
            connection.as_ref(),
            &format!("CAP REQ :{}", REQUIRED_CAPS.join(" ")),
        );
        let expiration = self.deadline();
        self.session.awaiting.push(Pending {
            kind: AwaitKind::CapAck,
            nickname: pending.nickname.clone(),
            token: pending.token.clone(),
            expiration,
        });
    }

    /// Close capability negotiation, present credentials (unless anonymous),
    /// and start waiting for the MOTD.
    fn authenticate(&mut self, pending: &Pending) {
        let Some(connection) = self.session.connection.clone() else {
            return;
        };
        self.send_line(connection.as_ref(), "CAP END");
        if !self.session.anonymous {
            self.send_line(connection.as_ref(), &format!("PASS oauth:{}", pending.token));
        }
        self.send_line(connection.as_ref(), &format!("NICK {}", pending.nickname));
        let expiration = self.deadline();
        self.session.awaiting.push(Pending {
            kind: AwaitKind::Motd,
            nickname: pending.nickname.clone(),
            token: pending.token.clone(),
            expiration,
        });
    }

    fn handle_membership(&mut self, message: &Message, joined: bool) {
        if message.params.is_empty() || message.params[0].len() < 2 {
            return;
        }
        let Some((user, _)) = message.prefix.split_once('!') else {
            return;
        };
        let Some(channel) = message.params[0].get(1..) else {
            return;
        };
        let membership = Membership {
            channel: channel.to_string(),
            user: user.to_string(),
        };
        if joined {
            self.sink().join(membership);
        } else {
            self.sink().leave(membership);
        }
    }

    fn handle_privmsg(&mut self, message: Message) {
        if message.params.len() < 2 || message.params[0].is_empty() {
            return;
        }
        let user = nickname_of(&message.prefix).to_string();
        let target = message.params[0].clone();
        let mut content = message.params[1].clone();
        let mut is_action = false;
        const ACTION_PREFIX: &str = "\u{1}ACTION";
        if content.starts_with(ACTION_PREFIX)
            && content.ends_with('\u{1}')
            && content.len() > ACTION_PREFIX.len()
        {
            is_action = true;
            content = content[ACTION_PREFIX.len()..content.len() - 1].to_string();
        }
        let bits = message.tags.number("bits");
        let message_id = message.tags.value("id").to_string();
        let (channel, private) = match target.strip_prefix('#') {
            Some(channel) => (channel.to_string(), false),
            None => (target, true),
        };
        let chat = ChatMessage {
            tags: message.tags,
            channel,
            user,
            content,
            message_id,
            bits,
            is_action,
        };
        if private {
            self.sink().private_message(chat);
        } else {
            self.sink().message(chat);
        }
    }

    fn handle_whisper(&mut self, message: Message) {
        if message.params.len() < 2 || message.params[0].is_empty() {
            return;
        }
        let whisper = Whisper {
            user: nickname_of(&message.prefix).to_string(),
            message: message.params[1].clone(),
            tags: message.tags,
        };
        self.sink().whisper(whisper);
    }

    fn handle_notice(&mut self, message: Message) {
        if message.params.len() < 2 || message.params[0].is_empty() {
            return;
        }
        let text = message.params[1].clone();
        let notice = Notice {
            id: message.tags.value("msg-id").to_string(),
            channel: message.params[0]
                .strip_prefix('#')
                .unwrap_or("")
                .to_string(),
            message: text.clone(),
        };
        self.sink().notice(notice);
        let rejected = text == "Login authentication failed" || text == "Login unsuccessful";
        if !self.session.logged_in && rejected {
            self.sink().logged_out();
            self.session.awaiting.retain(|p| p.kind != AwaitKind::Motd);
        }
    }

    fn handle_host_target(&mut self, message: &Message) {
        if message.params.len() < 2 || message.params[0].len() < 2 {
            return;
        }
        let Some(hosting) = message.params[0].get(1..).map(str::to_string) else {
            return;
        };
        let mut parts = message.params[1].split_whitespace();
        let target = parts.next().unwrap_or("");
        let viewers = parts.next().and_then(|count| count.parse().ok()).unwrap_or(0);
        let host = if target == "-" {
            HostChange {
                on: false,
                hosting,
                being_hosted: String::new(),
                viewers,
            }
        } else {
            HostChange {
                on: true,
                hosting,
                being_hosted: target.to_string(),
                viewers,
            }
        };
        self.sink().host(host);
    }

    /// One ROOMSTATE frame may carry several mode tags; each becomes its
    /// own event.
    fn handle_room_state(&mut self, message: &Message) {
        if message.params.is_empty() || message.params[0].len() < 2 {
            return;
        }
        let Some(channel) = message.params[0].get(1..) else {
            return;
        };
        let channel_id = message.tags.number("room-id");
        for mode in ["slow", "followers-only", "r9k", "emote-only", "subs-only"] {
            let Some(value) = message.tags.all_tags.get(mode) else {
                continue;
            };
            self.sink().room_mode_change(RoomModeChange {
                mode: mode.to_string(),
                parameter: value.parse().unwrap_or(0),
                channel: channel.to_string(),
                channel_id,
            });
        }
    }

    /// CLEARCHAT is a chat clear, a timeout, or a ban, depending on whether
    /// a target user and a `ban-duration` tag are present.
    fn handle_clear_chat(&mut self, message: Message) {
        if message.params.is_empty() || message.params[0].len() < 2 {
            return;
        }
        let Some(channel) = message.params[0].get(1..).map(str::to_string) else {
            return;
        };
        let user = message.params.get(1).cloned();
        let mut tags = message.tags;
        let mut clear = Clear {
            channel,
            ..Default::default()
        };
        match user {
            None => clear.kind = ClearKind::ClearAll,
            Some(user) => {
                clear.user = user;
                clear.reason = unescape_value(tags.value("ban-reason"));
                tags.user_id = tags.number("target-user-id");
                match tags.all_tags.get("ban-duration") {
                    None => clear.kind = ClearKind::Ban,
                    Some(duration) => {
                        clear.kind = ClearKind::Timeout;
                        clear.duration = duration.parse().unwrap_or(0);
                    }
                }
            }
        }
        clear.tags = tags;
        self.sink().clear(clear);
    }

    fn handle_clear_message(&mut self, message: Message) {
        if message.params.len() < 2 || message.params[0].len() < 2 {
            return;
        }
        let Some(channel) = message.params[0].get(1..).map(str::to_string) else {
            return;
        };
        let content = message.params[1].clone();
        let tags = message.tags;
        let clear = Clear {
            kind: ClearKind::ClearMessage,
            channel,
            user: tags.value("login").to_string(),
            offending_message_id: tags.value("target-msg-id").to_string(),
            offending_message_content: content,
            tags,
            ..Default::default()
        };
        self.sink().clear(clear);
    }

    fn handle_mode(&mut self, message: &Message) {
        if message.params.len() < 3
            || message.params[0].len() < 2
            || message.params[1].len() < 2
        {
            return;
        }
        let is_mod = match message.params[1].as_str() {
            "+o" => true,
            "-o" => false,
            _ => return,
        };
        let Some(channel) = message.params[0].get(1..) else {
            return;
        };
        self.sink().mod_changed(ModChange {
            channel: channel.to_string(),
            user: message.params[2].clone(),
            is_mod,
        });
    }

    fn handle_global_user_state(&mut self, message: Message) {
        self.sink().user_state(UserState {
            global: true,
            channel: String::new(),
            tags: message.tags,
        });
    }

    fn handle_user_state(&mut self, message: Message) {
        if message.params.is_empty() || message.params[0].len() < 2 {
            return;
        }
        let Some(channel) = message.params[0].get(1..).map(str::to_string) else {
            return;
        };
        self.sink().user_state(UserState {
            global: false,
            channel,
            tags: message.tags,
        });
    }

    /// USERNOTICE carries its subtype in the `msg-id` tag: subscriptions in
    /// several flavors, raids, and rituals. Frames without a `msg-id` are
    /// dropped; a recognized shape with an unrecognized id comes through as
    /// an unknown sub so callers can inspect the tags themselves.
    fn handle_user_notice(&mut self, message: Message) {
        if message.params.is_empty() || message.params[0].len() < 2 {
            return;
        }
        let Some(notice_kind) = message.tags.all_tags.get("msg-id").cloned() else {
            return;
        };
        let Some(channel) = message.params[0].get(1..).map(str::to_string) else {
            return;
        };
        let user_message = message.params.get(1).cloned().unwrap_or_default();
        let tags = message.tags;
        let user = tags.value("login").to_string();
        let system_message = unescape_value(tags.value("system-msg"));
        match notice_kind.as_str() {
            "raid" => self.sink().raid(Raid {
                channel,
                raider: user,
                viewers: tags.number("msg-param-viewerCount"),
                system_message,
                tags,
            }),
            "ritual" => self.sink().ritual(Ritual {
                channel,
                user,
                ritual: tags.value("msg-param-ritual-name").to_string(),
                system_message,
                tags,
            }),
            other => {
                let kind = match other {
                    "sub" => SubKind::Sub,
                    "resub" => SubKind::Resub,
                    "subgift" => SubKind::Gifted,
                    "submysterygift" => SubKind::MysteryGift,
                    _ => SubKind::Unknown,
                };
                self.sink().sub(Sub {
                    kind,
                    channel,
                    user,
                    recipient_display_name: tags
                        .value("msg-param-recipient-display-name")
                        .to_string(),
                    recipient_user_name: tags.value("msg-param-recipient-user-name").to_string(),
                    recipient_id: tags.number("msg-param-recipient-id"),
                    mass_gift_count: tags.number("msg-param-mass-gift-count"),
                    sender_count: tags.number("msg-param-sender-count"),
                    user_message,
                    system_message,
                    plan_name: unescape_value(tags.value("msg-param-sub-plan-name")),
                    plan_id: tags.number("msg-param-sub-plan"),
                    months: tags.number("msg-param-months"),
                    tags,
                });
            }
        }
    }
}

/// The nickname portion of a message prefix (`nick!user@host`), or `""`
/// when the prefix has no nickname.
fn nickname_of(prefix: &str) -> &str {
    match prefix.split_once('!') {
        Some((nick, _)) => nick,
        None => "",
    }
}
