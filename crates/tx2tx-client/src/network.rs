//! Client-side connection handling with the reconnect policy.

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{info, warn};

use tx2tx_core::config::ReconnectConfig;

/// Error type for the client role.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("gave up connecting after {attempts} attempt(s)")]
    AttemptsExhausted { attempts: u32 },

    #[error("injector unavailable: {0}")]
    Injector(#[from] crate::injector::InjectorError),
}

/// One connection attempt.
///
/// # Errors
///
/// Returns [`ClientError::Connect`] with the failing address on any socket
/// error.
pub async fn connect_once(addr: &str) -> Result<TcpStream, ClientError> {
    TcpStream::connect(addr)
        .await
        .map_err(|source| ClientError::Connect { addr: addr.to_string(), source })
}

/// Connects with the configured retry policy: up to `max_attempts` tries
/// with `delay_seconds` between them. With reconnection disabled, a single
/// failure is final.
///
/// # Errors
///
/// Returns the last [`ClientError::Connect`] when reconnection is disabled,
/// or [`ClientError::AttemptsExhausted`] once the attempt budget is spent.
pub async fn connect_with_retry(
    addr: &str,
    policy: &ReconnectConfig,
) -> Result<TcpStream, ClientError> {
    let mut attempts: u32 = 0;
    loop {
        match connect_once(addr).await {
            Ok(stream) => {
                info!(addr, "connected to server");
                return Ok(stream);
            }
            Err(e) => {
                if !policy.enabled {
                    return Err(e);
                }
                attempts += 1;
                if attempts >= policy.max_attempts {
                    warn!(addr, attempts, "connection attempts exhausted");
                    return Err(ClientError::AttemptsExhausted { attempts });
                }
                warn!(
                    addr,
                    attempt = attempts,
                    max = policy.max_attempts,
                    error = %e,
                    "connect failed, retrying"
                );
                tokio::time::sleep(Duration::from_secs_f64(policy.delay_seconds)).await;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn no_retry() -> ReconnectConfig {
        ReconnectConfig { enabled: false, max_attempts: 1, delay_seconds: 0.0 }
    }

    #[tokio::test]
    async fn test_connect_once_to_listening_socket_succeeds() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(connect_once(&addr).await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_once_reports_address_in_error() {
        // Port 1 on localhost is essentially never listening.
        let result = connect_once("127.0.0.1:1").await;
        match result {
            Err(ClientError::Connect { addr, .. }) => assert_eq!(addr, "127.0.0.1:1"),
            other => panic!("expected connect error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disabled_reconnect_fails_on_first_error() {
        let result = connect_with_retry("127.0.0.1:1", &no_retry()).await;
        assert!(matches!(result, Err(ClientError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let policy = ReconnectConfig { enabled: true, max_attempts: 3, delay_seconds: 0.01 };
        let result = connect_with_retry("127.0.0.1:1", &policy).await;
        assert!(matches!(result, Err(ClientError::AttemptsExhausted { attempts: 3 })));
    }
}
