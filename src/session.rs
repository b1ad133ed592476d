//! Session state machine.
//!
//! [`Session`] is pure transition logic: it consumes parsed local commands,
//! decoded protocol events and faults, mutates its own state, and returns the
//! [`Action`]s the caller must perform. It never touches a socket, so the same
//! machine drives both transports; the caller supplies delivery through
//! [`crate::transport::Transport`].
//!
//! # Transition contract
//! - `Authenticating` accepts only `/auth` (and `/help`); a positive `REPLY`
//!   moves to `Open`, a negative one keeps waiting for another `/auth`.
//! - `Open` accepts `/join`, `/rename`, chat text and `/help`; a second
//!   `/auth` is a fault.
//! - Any fault moves to `Erroring`, which emits exactly one `ERR` and then
//!   asks for shutdown.
//! - In `Open`, `BYE` or an inbound `ERR` asks for shutdown. Before that,
//!   anything but a `REPLY` is a fault.
//! - A local end of session asks for shutdown; the caller then calls
//!   [`Session::terminate`].

use crate::command::{ClientCommand, HELP_TEXT};
use crate::error::Fault;
use crate::message::{ClientEvent, Outbound, ProtocolEvent};
use crate::state::SessionState;

/// Sender name in an `ERR` raised before any `/auth` was given. The text
/// grammar needs a non-empty token there.
pub const UNNAMED: &str = "anonymous";

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub display_name: String,
    pub secret: String,
}

/// Work the caller must carry out, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Deliver a message (confirmable on the datagram path).
    Send(Outbound),
    /// Hand an event to the presentation layer.
    Emit(ClientEvent),
    /// Enter `Terminated`: send `BYE` and release the transport.
    Shutdown,
}

/// One client session, from `/auth` to `BYE`.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    /// Set once the server accepts an `/auth`.
    identity: Option<Identity>,
    /// Credentials of an `/auth` still waiting for its `REPLY`.
    candidate: Option<Identity>,
    /// A request (AUTH or JOIN) has been sent and its `REPLY` has not arrived.
    awaiting_reply: bool,
    /// The fault that sent the session to `Erroring`, if any.
    fault: Option<Fault>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Display name used in outbound `MSG`/`JOIN`/`ERR`.
    ///
    /// Before authentication succeeds this is the name from the pending
    /// `/auth`, or [`UNNAMED`] if none was given yet.
    pub fn display_name(&self) -> &str {
        self.identity
            .as_ref()
            .or(self.candidate.as_ref())
            .map_or(UNNAMED, |id| id.display_name.as_str())
    }

    /// Apply one local command.
    pub fn on_command(&mut self, cmd: ClientCommand) -> Vec<Action> {
        match (self.state, cmd) {
            (SessionState::Erroring | SessionState::Terminated, cmd) => {
                log::debug!("[session] ignoring {cmd:?} in {}", self.state);
                vec![]
            }
            (_, ClientCommand::Help) => vec![Action::Emit(ClientEvent::Info(HELP_TEXT.into()))],
            (_, ClientCommand::Malformed { reason }) => self.fail(Fault::Validation(reason)),

            (
                SessionState::Authenticating,
                ClientCommand::Auth {
                    username,
                    secret,
                    display_name,
                },
            ) => {
                let identity = Identity {
                    username,
                    display_name,
                    secret,
                };
                let msg = Outbound::Auth {
                    username: identity.username.clone(),
                    display_name: identity.display_name.clone(),
                    secret: identity.secret.clone(),
                };
                self.candidate = Some(identity);
                self.awaiting_reply = true;
                vec![Action::Send(msg)]
            }
            (SessionState::Authenticating, _) => {
                self.fail(Fault::Validation("not authenticated".into()))
            }

            (SessionState::Open, ClientCommand::Auth { .. }) => {
                self.fail(Fault::Validation("double auth".into()))
            }
            (SessionState::Open, ClientCommand::Join { channel_id }) => {
                self.awaiting_reply = true;
                vec![Action::Send(Outbound::Join {
                    channel_id,
                    display_name: self.display_name().to_string(),
                })]
            }
            (SessionState::Open, ClientCommand::Rename { display_name }) => {
                if let Some(identity) = self.identity.as_mut() {
                    log::debug!("[session] rename {} -> {display_name}", identity.display_name);
                    identity.display_name = display_name;
                }
                vec![]
            }
            (SessionState::Open, ClientCommand::Send { text }) => vec![Action::Send(Outbound::Msg {
                display_name: self.display_name().to_string(),
                content: text,
            })],
        }
    }

    /// Apply one decoded inbound message.
    pub fn on_event(&mut self, event: ProtocolEvent) -> Vec<Action> {
        if self.state.is_finished() {
            log::debug!("[session] ignoring {event:?} in {}", self.state);
            return vec![];
        }

        match event {
            ProtocolEvent::Bye if self.state == SessionState::Open => vec![Action::Shutdown],
            ProtocolEvent::ErrMsg { from, text } => {
                let shown =
                    Action::Emit(ClientEvent::ProtocolError(format!("ERR FROM {from}: {text}")));
                if self.state == SessionState::Open {
                    return vec![shown, Action::Shutdown];
                }
                let mut actions = vec![shown];
                actions.extend(self.fail(Fault::Protocol("unexpected message from server".into())));
                actions
            }
            ProtocolEvent::Reply { .. } if !self.awaiting_reply => {
                self.fail(Fault::Protocol("unexpected reply".into()))
            }
            ProtocolEvent::Reply { ok, text, .. } => {
                self.awaiting_reply = false;
                if self.state == SessionState::Authenticating {
                    if ok {
                        self.identity = self.candidate.take();
                        self.advance(SessionState::Open);
                    } else {
                        self.candidate = None;
                    }
                }
                vec![Action::Emit(reply_event(ok, text))]
            }
            ProtocolEvent::ChatMsg { from, text } if self.state == SessionState::Open => {
                vec![Action::Emit(ClientEvent::ChatLine { from, text })]
            }
            other => {
                log::warn!("[session] unexpected {other:?} in {}", self.state);
                self.fail(Fault::Protocol("unexpected message from server".into()))
            }
        }
    }

    /// Enter `Erroring` because of `fault`.
    ///
    /// Emits the fatal event, one `ERR` carrying the current display name,
    /// and a shutdown request. A session that is already finishing ignores
    /// further faults.
    pub fn fail(&mut self, fault: Fault) -> Vec<Action> {
        if self.state.is_finished() {
            log::debug!("[session] ignoring fault in {}: {fault}", self.state);
            return vec![];
        }
        self.advance(SessionState::Erroring);
        self.awaiting_reply = false;
        let reason = fault.reason().to_string();
        self.fault = Some(fault);
        vec![
            Action::Emit(ClientEvent::Fatal(reason.clone())),
            Action::Send(Outbound::Err {
                display_name: self.display_name().to_string(),
                content: reason,
            }),
            Action::Shutdown,
        ]
    }

    /// Local end of session (end of input or termination request).
    pub fn end(&mut self) -> Vec<Action> {
        if self.state == SessionState::Terminated {
            return vec![];
        }
        vec![Action::Shutdown]
    }

    /// Enter `Terminated`.
    pub fn terminate(&mut self) {
        if self.state != SessionState::Terminated {
            self.advance(SessionState::Terminated);
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        log::debug!("[session] {} -> {next}", self.state);
        self.state = next;
    }
}

fn reply_event(ok: bool, text: String) -> ClientEvent {
    if ok {
        ClientEvent::Info(format!("Success: {text}"))
    } else {
        ClientEvent::ProtocolError(format!("Failure: {text}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(u: &str, s: &str, d: &str) -> ClientCommand {
        ClientCommand::Auth {
            username: u.into(),
            secret: s.into(),
            display_name: d.into(),
        }
    }

    fn reply(ok: bool) -> ProtocolEvent {
        ProtocolEvent::Reply {
            ok,
            ref_id: None,
            text: "done".into(),
        }
    }

    fn open_session() -> Session {
        let mut s = Session::new();
        s.on_command(auth("user", "secret", "Alice"));
        s.on_event(reply(true));
        assert_eq!(s.state(), SessionState::Open);
        s
    }

    fn sent(actions: &[Action]) -> Vec<&Outbound> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn auth_sends_exactly_one_auth_with_given_fields() {
        let mut s = Session::new();
        let actions = s.on_command(auth("xlogin00", "s3cr3t", "Alice"));
        assert_eq!(
            actions,
            vec![Action::Send(Outbound::Auth {
                username: "xlogin00".into(),
                display_name: "Alice".into(),
                secret: "s3cr3t".into(),
            })]
        );
        assert!(s.awaiting_reply());
        assert_eq!(s.state(), SessionState::Authenticating);
    }

    #[test]
    fn positive_reply_opens_session_and_commits_identity() {
        let s = open_session();
        let id = s.identity().unwrap();
        assert_eq!(id.username, "user");
        assert_eq!(id.display_name, "Alice");
        assert!(!s.awaiting_reply());
    }

    #[test]
    fn negative_reply_keeps_authenticating_and_accepts_new_auth() {
        let mut s = Session::new();
        s.on_command(auth("user", "wrong", "Alice"));
        let actions = s.on_event(reply(false));
        assert_eq!(
            actions,
            vec![Action::Emit(ClientEvent::ProtocolError("Failure: done".into()))]
        );
        assert_eq!(s.state(), SessionState::Authenticating);
        assert!(s.identity().is_none());

        let actions = s.on_command(auth("user", "right", "Alice"));
        assert_eq!(sent(&actions).len(), 1);
        s.on_event(reply(true));
        assert_eq!(s.state(), SessionState::Open);
    }

    #[test]
    fn command_before_auth_fails_with_not_authenticated() {
        let mut s = Session::new();
        let actions = s.on_command(ClientCommand::Join {
            channel_id: "general".into(),
        });
        assert_eq!(s.state(), SessionState::Erroring);
        assert_eq!(
            sent(&actions),
            vec![&Outbound::Err {
                display_name: UNNAMED.into(),
                content: "not authenticated".into()
            }]
        );
        assert_eq!(actions.last(), Some(&Action::Shutdown));
    }

    #[test]
    fn err_before_any_auth_still_forms_a_valid_line() {
        let mut s = Session::new();
        let actions = s.on_command(ClientCommand::Send { text: "hi".into() });
        let line = crate::text::encode(sent(&actions)[0]);
        assert_eq!(line, "ERR FROM anonymous IS not authenticated\r\n");
        assert_eq!(
            crate::text::decode(&line),
            Ok(ProtocolEvent::ErrMsg {
                from: "anonymous".into(),
                text: "not authenticated".into(),
            })
        );
    }

    #[test]
    fn bye_while_authenticating_goes_through_erroring() {
        let mut s = Session::new();
        s.on_command(auth("user", "secret", "Alice"));
        let actions = s.on_event(ProtocolEvent::Bye);
        assert_eq!(s.state(), SessionState::Erroring);
        assert_eq!(
            sent(&actions),
            vec![&Outbound::Err {
                display_name: "Alice".into(),
                content: "unexpected message from server".into(),
            }]
        );
        assert_eq!(actions.last(), Some(&Action::Shutdown));
    }

    #[test]
    fn err_while_authenticating_is_shown_then_errors() {
        let mut s = Session::new();
        let actions = s.on_event(ProtocolEvent::ErrMsg {
            from: "Server".into(),
            text: "go away".into(),
        });
        assert_eq!(s.state(), SessionState::Erroring);
        assert_eq!(
            actions[0],
            Action::Emit(ClientEvent::ProtocolError("ERR FROM Server: go away".into()))
        );
        assert_eq!(sent(&actions).len(), 1);
        assert!(matches!(s.fault(), Some(Fault::Protocol(_))));
    }

    #[test]
    fn double_auth_errors_with_current_display_name() {
        let mut s = open_session();
        s.on_command(ClientCommand::Rename {
            display_name: "Bob".into(),
        });
        let actions = s.on_command(auth("a", "b", "c"));
        assert_eq!(s.state(), SessionState::Erroring);
        assert_eq!(
            sent(&actions),
            vec![&Outbound::Err {
                display_name: "Bob".into(),
                content: "double auth".into()
            }]
        );
        assert_eq!(s.fault(), Some(&Fault::Validation("double auth".into())));
    }

    #[test]
    fn rename_is_local_only() {
        let mut s = open_session();
        let actions = s.on_command(ClientCommand::Rename {
            display_name: "Bob".into(),
        });
        assert!(actions.is_empty());
        assert_eq!(s.display_name(), "Bob");
        assert_eq!(s.identity().unwrap().username, "user");
    }

    #[test]
    fn join_and_send_use_display_name() {
        let mut s = open_session();
        let actions = s.on_command(ClientCommand::Join {
            channel_id: "general".into(),
        });
        assert_eq!(
            sent(&actions),
            vec![&Outbound::Join {
                channel_id: "general".into(),
                display_name: "Alice".into()
            }]
        );
        assert!(s.awaiting_reply());
        s.on_event(reply(true));
        assert_eq!(s.state(), SessionState::Open);

        let actions = s.on_command(ClientCommand::Send {
            text: "hello".into(),
        });
        assert_eq!(
            sent(&actions),
            vec![&Outbound::Msg {
                display_name: "Alice".into(),
                content: "hello".into()
            }]
        );
    }

    #[test]
    fn malformed_command_enters_erroring() {
        let mut s = open_session();
        s.on_command(ClientCommand::Malformed {
            reason: "bad join".into(),
        });
        assert_eq!(s.state(), SessionState::Erroring);
    }

    #[test]
    fn help_never_changes_state() {
        let mut s = Session::new();
        let actions = s.on_command(ClientCommand::Help);
        assert!(matches!(actions.as_slice(), [Action::Emit(ClientEvent::Info(_))]));
        assert_eq!(s.state(), SessionState::Authenticating);
    }

    #[test]
    fn chat_message_is_surfaced_in_open() {
        let mut s = open_session();
        let actions = s.on_event(ProtocolEvent::ChatMsg {
            from: "bob".into(),
            text: "hi".into(),
        });
        assert_eq!(
            actions,
            vec![Action::Emit(ClientEvent::ChatLine {
                from: "bob".into(),
                text: "hi".into()
            })]
        );
    }

    #[test]
    fn chat_message_before_auth_is_a_protocol_fault() {
        let mut s = Session::new();
        s.on_event(ProtocolEvent::ChatMsg {
            from: "bob".into(),
            text: "hi".into(),
        });
        assert_eq!(s.state(), SessionState::Erroring);
    }

    #[test]
    fn reply_without_request_is_a_protocol_fault() {
        let mut s = open_session();
        s.on_event(reply(true));
        assert_eq!(s.state(), SessionState::Erroring);
        assert!(matches!(s.fault(), Some(Fault::Protocol(_))));
    }

    #[test]
    fn inbound_err_is_surfaced_then_shuts_down() {
        let mut s = open_session();
        let actions = s.on_event(ProtocolEvent::ErrMsg {
            from: "Server".into(),
            text: "bye now".into(),
        });
        assert_eq!(
            actions,
            vec![
                Action::Emit(ClientEvent::ProtocolError("ERR FROM Server: bye now".into())),
                Action::Shutdown
            ]
        );
        assert!(sent(&actions).is_empty());
    }

    #[test]
    fn bye_requests_shutdown_and_terminate_is_absorbing() {
        let mut s = open_session();
        assert_eq!(s.on_event(ProtocolEvent::Bye), vec![Action::Shutdown]);
        s.terminate();
        assert_eq!(s.state(), SessionState::Terminated);
        assert!(s.on_event(ProtocolEvent::Bye).is_empty());
        assert!(s.on_command(ClientCommand::Help).is_empty());
        assert!(s.fail(Fault::Transport("late".into())).is_empty());
        assert!(s.end().is_empty());
        assert_eq!(s.state(), SessionState::Terminated);
    }

    #[test]
    fn erroring_emits_err_once() {
        let mut s = open_session();
        let first = s.fail(Fault::Delivery("message not confirmed".into()));
        assert_eq!(sent(&first).len(), 1);
        let second = s.fail(Fault::Protocol("again".into()));
        assert!(second.is_empty());
        s.terminate();
        assert_eq!(s.state(), SessionState::Terminated);
    }
}
