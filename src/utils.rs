use crate::types::ProtocolError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

pub const USER_AGENT: &str = "h2trickle/0.1.0";
pub const DEFAULT_PUSH_PATH: &str = "/api/v1/push/influx/write";
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
pub const SAMPLE_LINE_PROTOCOL: &str =
    "h2trickle,bar_label=abc,source=grafana_cloud_docs metric=42.0\n";

pub const METHOD_PSEUDO: &str = ":method";
pub const SCHEME_PSEUDO: &str = ":scheme";
pub const AUTHORITY_PSEUDO: &str = ":authority";
pub const PATH_PSEUDO: &str = ":path";

pub const USER_AGENT_HEADER: &str = "user-agent";
pub const ACCEPT_HEADER: &str = "accept";
pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const CONTENT_TYPE_HEADER: &str = "content-type";
pub const CONTENT_LENGTH_HEADER: &str = "content-length";

/// Runs `future` under an optional deadline; `phase` names what timed out.
pub async fn timeout_result<F, T>(
    duration: Option<Duration>,
    phase: &'static str,
    future: F,
) -> Result<T, ProtocolError>
where
    F: Future<Output = Result<T, ProtocolError>>,
{
    if let Some(dur) = duration {
        match timeout(dur, future).await {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::Timeout(phase)),
        }
    } else {
        future.await
    }
}
