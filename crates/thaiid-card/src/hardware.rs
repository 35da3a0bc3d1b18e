//! PC/SC hardware binding
//!
//! The only module that touches the `pcsc` crate. Reader presence is watched
//! by a dedicated blocking thread around `get_status_change` (including the
//! PnP pseudo-reader so hot-plugged readers are picked up); card operations
//! run under `spawn_blocking` so they never block the async scheduler.
//! Driver errors are rendered with their SCARD hex code so the classifier
//! can recognize them.

use std::ffi::CString;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pcsc::{Card, Context, Disposition, Protocols, ReaderState, Scope, State, PNP_NOTIFICATION};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::classify::codes;
use crate::error::CardError;
use crate::port::{CardChannel, ChannelError, LeavePolicy, ProtocolToken, ReaderEvent, ShareMode};

/// How long one status poll blocks before the reader list is refreshed.
const STATUS_POLL_TIMEOUT: Duration = Duration::from_secs(5);
/// Back-off after a driver-level monitor error.
const MONITOR_RETRY_DELAY: Duration = Duration::from_secs(2);
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Entry point to the PC/SC layer: owns the context, hands out per-reader
/// channels and the presence event stream.
#[derive(Clone)]
pub struct PcscHub {
    context: Context,
}

impl PcscHub {
    pub fn new() -> Result<Self, CardError> {
        let context = Context::establish(Scope::User)
            .map_err(|err| CardError::Hardware(err.to_string()))?;
        Ok(Self { context })
    }

    /// List reader names currently known to the driver.
    pub fn list_readers(&self) -> Result<Vec<String>, CardError> {
        let readers = self
            .context
            .list_readers_owned()
            .map_err(|err| CardError::Hardware(err.to_string()))?;
        Ok(readers
            .into_iter()
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    /// Channel bound to one reader slot.
    pub fn channel(&self, reader: &str) -> Arc<dyn CardChannel> {
        Arc::new(PcscChannel {
            context: self.context.clone(),
            reader: CString::new(reader).unwrap_or_default(),
            card: Arc::new(Mutex::new(None)),
        })
    }

    /// Spawn the presence monitor thread and return its event stream.
    pub fn start_monitor(&self) -> mpsc::Receiver<ReaderEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let context = self.context.clone();
        std::thread::spawn(move || monitor_loop(&context, &tx));
        rx
    }
}

fn monitor_loop(context: &Context, tx: &mpsc::Sender<ReaderEvent>) {
    info!("reader monitor started");
    let mut states: Vec<ReaderState> =
        vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];

    loop {
        // Refresh the reader list; readers may appear or vanish at any time.
        match context.list_readers_owned() {
            Ok(names) => {
                for name in names {
                    if !states.iter().any(|rs| rs.name() == name.as_c_str()) {
                        info!(reader = %name.to_string_lossy(), "new reader detected");
                        states.push(ReaderState::new(name, State::UNAWARE));
                    }
                }
            }
            Err(pcsc::Error::NoReadersAvailable) => {}
            Err(err) => {
                warn!(error = %err, "failed to list readers");
                std::thread::sleep(MONITOR_RETRY_DELAY);
                continue;
            }
        }

        // Drop readers the driver no longer knows about.
        states.retain(|rs| {
            let gone = rs.name() != PNP_NOTIFICATION()
                && rs.event_state().intersects(State::UNKNOWN | State::IGNORE);
            if gone {
                info!(reader = %rs.name().to_string_lossy(), "reader removed");
            }
            !gone
        });

        match context.get_status_change(STATUS_POLL_TIMEOUT, &mut states) {
            Ok(()) => {}
            Err(pcsc::Error::Timeout) => continue,
            Err(pcsc::Error::Cancelled) => break,
            Err(err) => {
                warn!(error = %err, "status change wait failed");
                std::thread::sleep(MONITOR_RETRY_DELAY);
                continue;
            }
        }

        for rs in states.iter_mut().filter(|rs| rs.name() != PNP_NOTIFICATION()) {
            let was_present = rs.current_state().contains(State::PRESENT);
            let is_present = rs.event_state().contains(State::PRESENT);
            if was_present != is_present {
                debug!(
                    reader = %rs.name().to_string_lossy(),
                    present = is_present,
                    "presence transition"
                );
                let event = ReaderEvent {
                    reader: rs.name().to_string_lossy().into_owned(),
                    present: is_present,
                };
                if tx.blocking_send(event).is_err() {
                    info!("event receiver dropped, stopping reader monitor");
                    return;
                }
            }
            rs.sync_current_state();
        }
    }
    info!("reader monitor stopped");
}

struct PcscChannel {
    context: Context,
    reader: CString,
    card: Arc<Mutex<Option<Card>>>,
}

#[async_trait]
impl CardChannel for PcscChannel {
    async fn connect(&self, mode: ShareMode) -> Result<ProtocolToken, ChannelError> {
        let context = self.context.clone();
        let reader = self.reader.clone();
        let slot = Arc::clone(&self.card);
        run_blocking(move || {
            let (share, protocols) = match mode {
                ShareMode::Shared => (pcsc::ShareMode::Shared, Protocols::ANY),
                ShareMode::Exclusive => (pcsc::ShareMode::Exclusive, Protocols::ANY),
                // Direct connections negotiate no protocol.
                ShareMode::Direct => (pcsc::ShareMode::Direct, Protocols::UNDEFINED),
            };
            let card = context.connect(&reader, share, protocols).map_err(describe)?;
            let token = card
                .status2_owned()
                .ok()
                .and_then(|status| status.protocol2())
                .map_or(ProtocolToken::UNDEFINED, protocol_token);
            *lock(&slot)? = Some(card);
            Ok(token)
        })
        .await
    }

    async fn transmit(
        &self,
        command: &[u8],
        expected_len: usize,
        _protocol: ProtocolToken,
    ) -> Result<Vec<u8>, ChannelError> {
        let slot = Arc::clone(&self.card);
        let command = command.to_vec();
        run_blocking(move || {
            let guard = lock(&slot)?;
            let card = guard
                .as_ref()
                .ok_or_else(|| ChannelError::Hardware("card not connected".into()))?;
            let mut buffer = vec![0u8; expected_len.max(2)];
            let response = card.transmit(&command, &mut buffer).map_err(describe)?;
            Ok(response.to_vec())
        })
        .await
    }

    async fn disconnect(&self, policy: LeavePolicy) -> Result<(), ChannelError> {
        let slot = Arc::clone(&self.card);
        run_blocking(move || {
            let card = lock(&slot)?.take();
            if let Some(card) = card {
                let disposition = match policy {
                    LeavePolicy::Leave => Disposition::LeaveCard,
                    LeavePolicy::Reset => Disposition::ResetCard,
                };
                card.disconnect(disposition).map_err(|(_, err)| describe(err))?;
            }
            Ok(())
        })
        .await
    }
}

async fn run_blocking<T, F>(operation: F) -> Result<T, ChannelError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ChannelError> + Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|err| ChannelError::Hardware(format!("blocking task failed: {err}")))?
}

fn lock(slot: &Mutex<Option<Card>>) -> Result<std::sync::MutexGuard<'_, Option<Card>>, ChannelError> {
    slot.lock()
        .map_err(|_| ChannelError::Hardware("card state lock poisoned".into()))
}

fn protocol_token(protocol: pcsc::Protocol) -> ProtocolToken {
    match protocol {
        pcsc::Protocol::T0 => ProtocolToken::T0,
        pcsc::Protocol::T1 => ProtocolToken::T1,
        pcsc::Protocol::RAW => ProtocolToken::RAW,
    }
}

/// Render a driver error with its SCARD code so the classifier sees it.
fn describe(err: pcsc::Error) -> ChannelError {
    let code = match err {
        pcsc::Error::NotTransacted => codes::NOT_TRANSACTED,
        pcsc::Error::ProtoMismatch => codes::PROTO_MISMATCH,
        pcsc::Error::NoSmartcard => codes::NO_SMARTCARD,
        pcsc::Error::Timeout => codes::TIMEOUT,
        pcsc::Error::CardUnsupported => codes::CARD_UNSUPPORTED,
        pcsc::Error::RemovedCard => codes::REMOVED_CARD,
        _ => 0,
    };
    if code == 0 {
        ChannelError::Hardware(err.to_string())
    } else {
        ChannelError::Hardware(format!("0x{code:08x}: {err}"))
    }
}
