//! Reader session controller
//!
//! One [`CardSession`] per card insertion: debounce, negotiate, read,
//! release. The session runs to a terminal state or is abandoned when the
//! reader reports removal; the handle is released on every exit path before
//! any result is signaled. [`ThaiIdReader`] is the process-facing service
//! that watches hardware events and delivers each session's single terminal
//! result through the registered callbacks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::config::ReaderConfig;
use crate::error::{messages, CardError};
use crate::fields::FieldReader;
use crate::hardware::PcscHub;
use crate::negotiate::ConnectionNegotiator;
use crate::port::{CardChannel, LeavePolicy, ReaderEvent};
use thaiid_common::CardRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    CardPresent,
    Connecting,
    Connected,
    Reading,
    Complete,
    Error,
}

/// Terminal result of one session. `Abandoned` means the card was removed
/// before a result existed; nothing is emitted for it.
#[derive(Debug)]
pub enum SessionOutcome {
    Complete(CardRecord),
    Failed(String),
    Abandoned,
}

pub struct CardSession {
    reader: String,
    channel: Arc<dyn CardChannel>,
    config: ReaderConfig,
    state: SessionState,
}

impl CardSession {
    pub fn new(reader: impl Into<String>, channel: Arc<dyn CardChannel>, config: ReaderConfig) -> Self {
        Self {
            reader: reader.into(),
            channel,
            config,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to a terminal state. `removed` flips to true when
    /// the reader reports the card gone; any in-flight operation is then
    /// abandoned and its eventual outcome ignored.
    pub async fn run(&mut self, mut removed: watch::Receiver<bool>) -> SessionOutcome {
        self.state = SessionState::CardPresent;
        info!(reader = %self.reader, "card inserted");

        // Debounce: let the contacts settle before first command.
        tokio::select! {
            () = tokio::time::sleep(self.config.insert_delay) => {}
            () = removal(&mut removed) => return self.abandon().await,
        }

        self.state = SessionState::Connecting;
        let negotiator = ConnectionNegotiator::new(&self.config);
        let connection = {
            let channel = Arc::clone(&self.channel);
            tokio::select! {
                result = negotiator.connect(channel.as_ref()) => Some(result),
                () = removal(&mut removed) => None,
            }
        };
        let Some(connection) = connection else {
            return self.abandon().await;
        };

        let Some(protocol) = connection.protocol else {
            self.state = SessionState::Error;
            self.release().await;
            return SessionOutcome::Failed(messages::CONNECTION_FAILED.to_string());
        };

        self.state = SessionState::Connected;
        info!(reader = %self.reader, ?protocol, "card connected");

        self.state = SessionState::Reading;
        let outcome = {
            let channel = Arc::clone(&self.channel);
            let config = self.config.clone();
            tokio::select! {
                result = async {
                    FieldReader::new(channel.as_ref(), protocol, &config).read().await
                } => Some(result),
                () = removal(&mut removed) => None,
            }
        };
        let Some(outcome) = outcome else {
            return self.abandon().await;
        };

        // Release before signaling so no exclusive lock outlives the session.
        self.release().await;
        match outcome {
            Ok(record) => {
                self.state = SessionState::Complete;
                info!(reader = %self.reader, "card read complete");
                SessionOutcome::Complete(record)
            }
            Err(err) => {
                self.state = SessionState::Error;
                error!(reader = %self.reader, error = %err, "card read failed");
                SessionOutcome::Failed(render(&err))
            }
        }
    }

    async fn abandon(&mut self) -> SessionOutcome {
        info!(reader = %self.reader, "card removed mid-session, abandoning");
        self.release().await;
        self.state = SessionState::Idle;
        SessionOutcome::Abandoned
    }

    async fn release(&mut self) {
        if let Err(err) = self.channel.disconnect(LeavePolicy::Leave).await {
            warn!(reader = %self.reader, error = %err, "disconnect failed");
        }
    }
}

/// Render a session error to the plain user-facing string that crosses the
/// session boundary.
fn render(err: &CardError) -> String {
    match err {
        // Classified errors already carry their user message.
        CardError::Classified(message) => message.clone(),
        other => format!("Card reading failed: {other}"),
    }
}

async fn removal(rx: &mut watch::Receiver<bool>) {
    // A dropped sender means the monitor is gone, not that the card left.
    if rx.wait_for(|removed| *removed).await.is_err() {
        std::future::pending::<()>().await;
    }
}

type CompleteCallback = dyn Fn(CardRecord) + Send + Sync;
type ErrorCallback = dyn Fn(String) + Send + Sync;

/// Hardware-event-driven reader service.
///
/// Register callbacks, then call [`init`](Self::init) from within a tokio
/// runtime to start listening for reader events. Each insertion produces at
/// most one completion or one error callback invocation.
#[derive(Default)]
pub struct ThaiIdReader {
    config: ReaderConfig,
    on_complete: Option<Arc<CompleteCallback>>,
    on_error: Option<Arc<ErrorCallback>>,
}

impl ThaiIdReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-command read timeout, in seconds.
    pub fn set_read_timeout(&mut self, seconds: u64) {
        self.config.read_timeout = Duration::from_secs(seconds);
    }

    /// Debounce between card insertion and the read cycle, in milliseconds.
    pub fn set_insert_delay(&mut self, millis: u64) {
        self.config.insert_delay = Duration::from_millis(millis);
    }

    pub fn on_read_complete(&mut self, callback: impl Fn(CardRecord) + Send + Sync + 'static) {
        self.on_complete = Some(Arc::new(callback));
    }

    pub fn on_read_error(&mut self, callback: impl Fn(String) + Send + Sync + 'static) {
        self.on_error = Some(Arc::new(callback));
    }

    /// Establish the PC/SC context and start reacting to reader events.
    ///
    /// Fails once, up front, if the smart card service is unavailable.
    pub fn init(&self) -> Result<(), CardError> {
        info!("thai id card reader init");
        let hub = PcscHub::new()?;
        let events = hub.start_monitor();
        let factory = move |reader: &str| hub.channel(reader);
        tokio::spawn(drive(
            events,
            factory,
            self.config.clone(),
            self.on_complete.clone(),
            self.on_error.clone(),
        ));
        Ok(())
    }
}

/// Event loop shared by the real service and tests: spawn a session per
/// insertion, signal removal into the running session, deliver the terminal
/// result to the callbacks.
pub(crate) async fn drive<F>(
    mut events: mpsc::Receiver<ReaderEvent>,
    channel_for: F,
    config: ReaderConfig,
    on_complete: Option<Arc<CompleteCallback>>,
    on_error: Option<Arc<ErrorCallback>>,
) where
    F: Fn(&str) -> Arc<dyn CardChannel> + Send + 'static,
{
    let mut active: HashMap<String, watch::Sender<bool>> = HashMap::new();

    while let Some(event) = events.recv().await {
        if event.present {
            if active.get(&event.reader).is_some_and(|tx| !tx.is_closed()) {
                // A session is already running on this reader.
                continue;
            }
            let (removed_tx, removed_rx) = watch::channel(false);
            active.insert(event.reader.clone(), removed_tx);

            let mut session = CardSession::new(
                event.reader.clone(),
                channel_for(&event.reader),
                config.clone(),
            );
            let on_complete = on_complete.clone();
            let on_error = on_error.clone();
            tokio::spawn(async move {
                match session.run(removed_rx).await {
                    SessionOutcome::Complete(record) => {
                        if let Some(callback) = on_complete {
                            callback(record);
                        }
                    }
                    SessionOutcome::Failed(message) => {
                        if let Some(callback) = on_error {
                            callback(message);
                        }
                    }
                    SessionOutcome::Abandoned => {}
                }
            });
        } else {
            info!(reader = %event.reader, "card removed");
            if let Some(removed_tx) = active.remove(&event.reader) {
                let _ = removed_tx.send(true);
            }
        }
    }
}
