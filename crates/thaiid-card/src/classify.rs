//! Error classification and backoff retry
//!
//! Pure mapping from a raw failure description to a typed classification
//! (retryable or not, suggested delay, user message), plus the bounded
//! exponential-backoff helper built on it.

use std::future::Future;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{messages, CardError};

/// SCARD error codes recognized by the classifier.
pub mod codes {
    pub const NOT_TRANSACTED: u32 = 0x8010_0016;
    pub const PROTO_MISMATCH: u32 = 0x8010_000F;
    pub const NO_SMARTCARD: u32 = 0x8010_000C;
    pub const TIMEOUT: u32 = 0x8010_000A;
    pub const CARD_UNSUPPORTED: u32 = 0x8010_001C;
    pub const REMOVED_CARD: u32 = 0x8010_0069;
}

const SHORT_DELAY: Duration = Duration::from_millis(500);
const MEDIUM_DELAY: Duration = Duration::from_secs(1);
/// Hard cap on any single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

static CODE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"0x([0-9a-f]+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransactionLost,
    ProtocolMismatch,
    CardAbsent,
    Timeout,
    UnsupportedCard,
    CardRemoved,
    Unknown,
}

/// Typed view of a raw failure. Derived deterministically, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub code: u32,
    pub retryable: bool,
    pub suggested_delay: Duration,
    pub user_message: &'static str,
}

/// Classify a raw error description.
///
/// A hex code embedded in the text (`0x8010000f` and friends) wins; known
/// keywords cover driver layers that do not echo the code.
pub fn classify(raw: &str) -> Classification {
    let lower = raw.to_lowercase();
    let code = CODE_PATTERN
        .captures(&lower)
        .and_then(|c| u32::from_str_radix(&c[1], 16).ok())
        .unwrap_or(0);

    match code {
        codes::NOT_TRANSACTED => Classification {
            kind: ErrorKind::TransactionLost,
            code,
            retryable: true,
            suggested_delay: MEDIUM_DELAY,
            user_message: messages::TRANSACTION_FAILED,
        },
        codes::PROTO_MISMATCH => Classification {
            kind: ErrorKind::ProtocolMismatch,
            code,
            retryable: true,
            suggested_delay: MEDIUM_DELAY,
            user_message: messages::PROTOCOL_MISMATCH,
        },
        codes::NO_SMARTCARD => Classification {
            kind: ErrorKind::CardAbsent,
            code,
            retryable: false,
            suggested_delay: Duration::ZERO,
            user_message: messages::INSERT_PROPERLY,
        },
        codes::TIMEOUT => Classification {
            kind: ErrorKind::Timeout,
            code,
            retryable: true,
            suggested_delay: SHORT_DELAY,
            user_message: messages::CARD_NOT_READY,
        },
        codes::CARD_UNSUPPORTED => Classification {
            kind: ErrorKind::UnsupportedCard,
            code,
            retryable: false,
            suggested_delay: Duration::ZERO,
            user_message: messages::UNSUPPORTED_CARD,
        },
        codes::REMOVED_CARD => Classification {
            kind: ErrorKind::CardRemoved,
            code,
            retryable: false,
            suggested_delay: Duration::ZERO,
            user_message: messages::CARD_REMOVED,
        },
        _ if lower.contains("protocol mismatch") || lower.contains("proto_mismatch") => {
            Classification {
                kind: ErrorKind::ProtocolMismatch,
                code,
                retryable: true,
                suggested_delay: MEDIUM_DELAY,
                user_message: messages::PROTOCOL_MISMATCH,
            }
        }
        _ if lower.contains("timeout") => Classification {
            kind: ErrorKind::Timeout,
            code,
            retryable: true,
            suggested_delay: SHORT_DELAY,
            user_message: messages::CARD_NOT_READY,
        },
        _ => Classification {
            kind: ErrorKind::Unknown,
            code,
            retryable: true,
            suggested_delay: SHORT_DELAY,
            user_message: messages::CONNECTION_FAILED,
        },
    }
}

/// Shorthand used by the transport and negotiator retry loops.
pub fn is_protocol_mismatch(raw: &str) -> bool {
    classify(raw).kind == ErrorKind::ProtocolMismatch
}

/// Run `operation` up to `max_retries + 1` times with exponential backoff
/// (doubling from `base_delay`, capped at 10 s).
///
/// Aborts without further attempts the first time a non-retryable
/// classification is encountered. On abort or exhaustion the error is the
/// classification's user message.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T, CardError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last: Option<Classification> = None;

    for attempt in 0..=max_retries {
        debug!(
            attempt = attempt + 1,
            total = max_retries + 1,
            "card operation attempt"
        );
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let class = classify(&err.to_string());
                warn!(attempt = attempt + 1, error = %err, "card operation attempt failed");

                if !class.retryable {
                    warn!(code = format_args!("0x{:08x}", class.code), "non-retryable error, aborting");
                    return Err(CardError::Classified(class.user_message.to_string()));
                }

                if attempt < max_retries {
                    let factor = 1u32 << attempt.min(10);
                    let delay = (base_delay * factor).min(MAX_BACKOFF);
                    debug!(delay_ms = delay.as_millis() as u64, "waiting before retry");
                    tokio::time::sleep(delay).await;
                }
                last = Some(class);
            }
        }
    }

    let message = last
        .map(|c| c.user_message)
        .unwrap_or(messages::CONNECTION_FAILED);
    warn!(attempts = max_retries + 1, "all card operation attempts failed");
    Err(CardError::Classified(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn extracts_embedded_code() {
        let class = classify("transmit failed: 0x80100016: transaction error");
        assert_eq!(class.kind, ErrorKind::TransactionLost);
        assert_eq!(class.code, codes::NOT_TRANSACTED);
        assert!(class.retryable);
        assert_eq!(class.user_message, messages::TRANSACTION_FAILED);
    }

    #[test]
    fn uppercase_hex_codes_match() {
        let class = classify("error 0x8010000F from driver");
        assert_eq!(class.kind, ErrorKind::ProtocolMismatch);
    }

    #[test]
    fn non_retryable_classifications() {
        assert!(!classify("0x8010000c: no smart card").retryable);
        assert!(!classify("0x8010001c: unsupported").retryable);
        assert!(!classify("0x80100069: card was removed").retryable);
    }

    #[test]
    fn keyword_fallbacks_without_code() {
        assert_eq!(
            classify("protocol mismatch during transmit").kind,
            ErrorKind::ProtocolMismatch
        );
        assert_eq!(classify("Command timeout").kind, ErrorKind::Timeout);
    }

    #[test]
    fn unknown_errors_are_retryable_with_generic_message() {
        let class = classify("something odd happened");
        assert_eq!(class.kind, ErrorKind::Unknown);
        assert!(class.retryable);
        assert_eq!(class.user_message, messages::CONNECTION_FAILED);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_aborts_after_one_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result: Result<(), CardError> = retry_with_backoff(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("0x80100069: card removed mid-operation".to_string()) }
            },
            5,
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        match result {
            Err(CardError::Classified(msg)) => assert_eq!(msg, messages::CARD_REMOVED),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_error_uses_full_budget() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result: Result<(), CardError> = retry_with_backoff(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("0x80100016: not transacted".to_string()) }
            },
            3,
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        match result {
            Err(CardError::Classified(msg)) => assert_eq!(msg, messages::TRANSACTION_FAILED),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_delays_double_and_cap() {
        let start = Instant::now();
        let _: Result<(), CardError> = retry_with_backoff(
            || async { Err::<(), _>("0x8010000a: timeout".to_string()) },
            4,
            Duration::from_secs(4),
        )
        .await;

        // Delays: 4s, 8s, 10s (capped), 10s (capped) = 32s total.
        assert_eq!(start.elapsed(), Duration::from_secs(32));
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_later_attempt_returns_value() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result = retry_with_backoff(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("0x80100016: not transacted".to_string())
                    } else {
                        Ok(42u32)
                    }
                }
            },
            5,
            Duration::from_millis(10),
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
