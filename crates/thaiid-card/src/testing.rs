//! Deterministic scripted channel used by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::apdu::commands;
use crate::port::{CardChannel, ChannelError, LeavePolicy, ProtocolToken, ShareMode};

type ConnectOutcome = Result<ProtocolToken, ChannelError>;
type TransmitOutcome = Result<Vec<u8>, ChannelError>;

/// One scripted step: either resolve with an outcome or never resolve,
/// leaving the caller's timeout to fire.
enum Script<T> {
    Ready(T),
    Hang,
}

/// Fake [`CardChannel`] that replays scripted outcomes in order and records
/// every call it receives.
#[derive(Default)]
pub(crate) struct ScriptedChannel {
    connects: Mutex<VecDeque<Script<ConnectOutcome>>>,
    transmits: Mutex<VecDeque<Script<TransmitOutcome>>>,
    pub connect_log: Mutex<Vec<ShareMode>>,
    pub transmit_log: Mutex<Vec<Vec<u8>>>,
    pub disconnect_log: Mutex<Vec<LeavePolicy>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_connect(&self, outcome: ConnectOutcome) {
        self.connects.lock().unwrap().push_back(Script::Ready(outcome));
    }

    /// Script a connect attempt that never resolves.
    pub fn push_connect_hang(&self) {
        self.connects.lock().unwrap().push_back(Script::Hang);
    }

    pub fn push_transmit(&self, outcome: TransmitOutcome) {
        self.transmits.lock().unwrap().push_back(Script::Ready(outcome));
    }

    /// Script a transmit that never resolves.
    pub fn push_transmit_hang(&self) {
        self.transmits.lock().unwrap().push_back(Script::Hang);
    }

    /// Script a selector + GET-RESPONSE pair answering with `payload`.
    pub fn push_field(&self, payload: &[u8]) {
        self.push_transmit(Ok(vec![0x61, payload.len() as u8]));
        let mut raw = payload.to_vec();
        raw.extend_from_slice(&[0x90, 0x00]);
        self.push_transmit(Ok(raw));
    }

    /// TIS-620 encoding of `นาย#สมชาย##ใจดี` (title#first##last).
    pub const NAME_TH_TIS620: &'static [u8] = &[
        0xB9, 0xD2, 0xC2, b'#', 0xCA, 0xC1, 0xAA, 0xD2, 0xC2, b'#', b'#', 0xE3, 0xA8, 0xB4, 0xD5,
    ];

    /// Script a complete successful read: SELECT, all scalar fields in card
    /// order, and every photo segment carrying `photo_chunk`.
    pub fn push_full_read(&self, photo_chunk: &[u8]) {
        self.push_transmit(Ok(vec![0x90, 0x00])); // SELECT
        self.push_field(b"1234567890123"); // citizen ID
        self.push_field(Self::NAME_TH_TIS620);
        self.push_field(b"Mr.#Somchai##Jaidee");
        self.push_field(b"1"); // gender
        self.push_field(b"District Office"); // issuer
        self.push_field(b"25300210"); // birth
        self.push_field(b"25640115"); // issue
        self.push_field(b"25720115"); // expiry
        self.push_field(b"123/45 #5 Bang Yai"); // address
        for _ in 0..commands::PHOTO_SEGMENT_COUNT {
            self.push_field(photo_chunk);
        }
    }

    pub fn transmit_count(&self) -> usize {
        self.transmit_log.lock().unwrap().len()
    }
}

#[async_trait]
impl CardChannel for ScriptedChannel {
    async fn connect(&self, mode: ShareMode) -> Result<ProtocolToken, ChannelError> {
        self.connect_log.lock().unwrap().push(mode);
        let next = self.connects.lock().unwrap().pop_front();
        match next {
            Some(Script::Ready(outcome)) => outcome,
            Some(Script::Hang) => std::future::pending().await,
            None => Err(ChannelError::Hardware("unscripted connect".into())),
        }
    }

    async fn transmit(
        &self,
        command: &[u8],
        _expected_len: usize,
        _protocol: ProtocolToken,
    ) -> Result<Vec<u8>, ChannelError> {
        self.transmit_log.lock().unwrap().push(command.to_vec());
        let next = self.transmits.lock().unwrap().pop_front();
        match next {
            Some(Script::Ready(outcome)) => outcome,
            Some(Script::Hang) => std::future::pending().await,
            None => Err(ChannelError::Hardware("unscripted transmit".into())),
        }
    }

    async fn disconnect(&self, policy: LeavePolicy) -> Result<(), ChannelError> {
        self.disconnect_log.lock().unwrap().push(policy);
        Ok(())
    }
}
