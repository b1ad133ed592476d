//! Session actor and the engine's public API.
//!
//! The receive loop and the command side only *produce* [`Input`]s; one
//! actor task consumes them in arrival order and owns every mutation of the
//! session. Confirmable sends block the actor, which is what keeps at most
//! one message pending.
//!
//! # Usage
//!
//! ```ignore
//! let (mut handle, mut events) = Client::start(&config).await?;
//! handle.submit("/auth user secret Alice");
//! while let Some(ev) = events.recv().await {
//!     println!("{ev}");
//! }
//! let outcome = handle.wait().await;
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::command::ClientCommand;
use crate::config::{Config, TransportKind};
use crate::datagram::DatagramTransport;
use crate::error::Fault;
use crate::message::{ClientEvent, Outbound, ProtocolEvent};
use crate::session::{Action, Session};
use crate::state::SessionState;
use crate::stream::StreamTransport;
use crate::transport::{Transport, TransportError};

/// Upper bound on the farewell `BYE` and on waiting for the actor after a
/// termination request.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Everything the session actor consumes.
#[derive(Debug)]
pub enum Input {
    /// One raw line of local input.
    Line(String),
    /// Local input is exhausted.
    EndOfInput,
    /// A decoded inbound message.
    Event(ProtocolEvent),
    /// A failure observed outside the actor (receive loop).
    Fault(Fault),
    /// Process-level termination request.
    Terminate,
}

/// Events for the presentation layer.
pub type EventStream = mpsc::UnboundedReceiver<ClientEvent>;

/// How a session ended: `Ok` after a clean `BYE`, `Err` with the fault that
/// drove it through the error state.
pub type Outcome = Result<(), Fault>;

pub struct Client;

impl Client {
    /// Connect the configured transport and start the session.
    pub async fn start(config: &Config) -> Result<(ClientHandle, EventStream), TransportError> {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let transport: Box<dyn Transport> = match config.transport {
            TransportKind::Stream => {
                Box::new(StreamTransport::connect(config.remote_addr(), input_tx.clone()).await?)
            }
            TransportKind::Datagram => {
                Box::new(DatagramTransport::bind(config, input_tx.clone()).await?)
            }
        };
        Ok(Self::spawn(transport, input_tx, input_rx, config.reply_timeout))
    }

    /// Start a session over an already-built transport.
    ///
    /// `input_tx` must be the sender whose receiver is `input_rx`; the
    /// transport's receive loop should hold a clone of it.
    pub fn spawn(
        transport: Box<dyn Transport>,
        input_tx: mpsc::UnboundedSender<Input>,
        input_rx: mpsc::UnboundedReceiver<Input>,
        reply_timeout: Duration,
    ) -> (ClientHandle, EventStream) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(transport, input_rx, event_tx, reply_timeout));
        (
            ClientHandle {
                commands: Commander { inputs: input_tx },
                task,
            },
            event_rx,
        )
    }
}

/// Cloneable producer of local commands.
#[derive(Debug, Clone)]
pub struct Commander {
    inputs: mpsc::UnboundedSender<Input>,
}

impl Commander {
    /// Queue one line of local input. Returns `false` once the session is over.
    pub fn submit(&self, line: impl Into<String>) -> bool {
        self.inputs.send(Input::Line(line.into())).is_ok()
    }

    /// Report that local input is exhausted.
    pub fn end_of_input(&self) -> bool {
        self.inputs.send(Input::EndOfInput).is_ok()
    }
}

/// Owner's handle to a running session.
#[derive(Debug)]
pub struct ClientHandle {
    commands: Commander,
    task: JoinHandle<Outcome>,
}

impl ClientHandle {
    pub fn commander(&self) -> Commander {
        self.commands.clone()
    }

    pub fn submit(&self, line: impl Into<String>) -> bool {
        self.commands.submit(line)
    }

    pub fn end_of_input(&self) -> bool {
        self.commands.end_of_input()
    }

    /// Wait for the session to end on its own.
    pub async fn wait(&mut self) -> Outcome {
        join_outcome((&mut self.task).await)
    }

    /// Ask for a graceful shutdown (`BYE`, close) and wait a bounded time.
    pub async fn terminate(&mut self) -> Outcome {
        let _ = self.commands.inputs.send(Input::Terminate);
        match timeout(SHUTDOWN_GRACE * 2, &mut self.task).await {
            Ok(joined) => join_outcome(joined),
            Err(_) => {
                log::warn!("[client] session did not stop in time; aborting");
                self.task.abort();
                Err(Fault::Transport("shutdown timed out".into()))
            }
        }
    }
}

fn join_outcome(joined: Result<Outcome, tokio::task::JoinError>) -> Outcome {
    joined.unwrap_or_else(|e| Err(Fault::Transport(format!("session task failed: {e}"))))
}

/// Consume inputs until the session reaches `Terminated`, then close the
/// transport.
pub async fn run_session(
    transport: Box<dyn Transport>,
    mut inputs: mpsc::UnboundedReceiver<Input>,
    events: mpsc::UnboundedSender<ClientEvent>,
    reply_timeout: Duration,
) -> Outcome {
    let mut actor = Actor {
        session: Session::new(),
        transport,
        events,
        backlog: VecDeque::new(),
        requests_sent: 0,
    };

    // A disarmed timer sits far in the future; `reply_armed` gates the branch.
    let far_future = Duration::from_secs(365 * 24 * 3600);
    let reply_timer = tokio::time::sleep(far_future);
    tokio::pin!(reply_timer);
    let mut reply_armed = false;
    // Request the timer was last armed for.
    let mut armed_for = 0u64;

    while actor.session.state() != SessionState::Terminated {
        tokio::select! {
            input = inputs.recv() => match input {
                Some(input) => actor.dispatch(input).await,
                None => {
                    let actions = actor.session.end();
                    actor.execute(actions).await;
                }
            },
            _ = &mut reply_timer, if reply_armed => {
                log::warn!("[client] no reply within {reply_timeout:?}");
                reply_armed = false;
                let actions = actor.session.fail(Fault::Protocol("no reply from server".into()));
                actor.execute(actions).await;
            }
        }

        if actor.session.awaiting_reply() {
            // Each request gets its own deadline, even when one is sent
            // straight after the previous reply.
            if !reply_armed || armed_for != actor.requests_sent {
                reply_timer.as_mut().reset(tokio::time::Instant::now() + reply_timeout);
                reply_armed = true;
                armed_for = actor.requests_sent;
            }
        } else {
            reply_armed = false;
        }
    }

    actor.transport.close().await;
    log::info!("[client] session terminated");
    match actor.session.fault() {
        Some(fault) => Err(fault.clone()),
        None => Ok(()),
    }
}

struct Actor {
    session: Session,
    transport: Box<dyn Transport>,
    events: mpsc::UnboundedSender<ClientEvent>,
    /// Local input held back while a request waits for its reply.
    backlog: VecDeque<Input>,
    /// Requests (AUTH, JOIN) handed to the transport so far.
    requests_sent: u64,
}

impl Actor {
    async fn dispatch(&mut self, input: Input) {
        match input {
            Input::Line(_) | Input::EndOfInput if self.session.awaiting_reply() => {
                self.backlog.push_back(input);
            }
            Input::Line(_) | Input::EndOfInput => self.local(input).await,
            Input::Event(event) => {
                let actions = self.session.on_event(event);
                self.execute(actions).await;
                self.drain_backlog().await;
            }
            Input::Fault(fault) => {
                let actions = self.session.fail(fault);
                self.execute(actions).await;
            }
            Input::Terminate => {
                let actions = self.session.end();
                self.execute(actions).await;
            }
        }
    }

    async fn local(&mut self, input: Input) {
        let actions = match input {
            Input::Line(line) => match ClientCommand::parse(&line) {
                Some(cmd) => self.session.on_command(cmd),
                None => return,
            },
            Input::EndOfInput => self.session.end(),
            _ => return,
        };
        self.execute(actions).await;
    }

    async fn drain_backlog(&mut self) {
        while !self.session.awaiting_reply() && !self.session.state().is_finished() {
            let Some(input) = self.backlog.pop_front() else {
                break;
            };
            self.local(input).await;
        }
    }

    async fn execute(&mut self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Emit(event) => {
                    let _ = self.events.send(event);
                }
                Action::Send(msg) => {
                    if msg.expects_reply() {
                        self.requests_sent += 1;
                    }
                    if let Err(e) = self.transport.send(&msg).await {
                        if self.session.state() == SessionState::Erroring {
                            log::warn!("[client] could not deliver {}: {e}", msg.verb());
                            continue;
                        }
                        log::warn!("[client] {} failed: {e}", msg.verb());
                        queue = self.session.fail(e.into()).into();
                    }
                }
                Action::Shutdown => {
                    self.session.terminate();
                    match timeout(SHUTDOWN_GRACE, self.transport.send(&Outbound::Bye)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => log::debug!("[client] BYE not sent: {e}"),
                        Err(_) => log::warn!("[client] BYE timed out"),
                    }
                    self.backlog.clear();
                    queue.clear();
                }
            }
        }
    }
}
