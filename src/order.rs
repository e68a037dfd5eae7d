use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::xml;

/// Order status as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Processing,
    Complete,
    CompleteWithErrors,
    Failed,
    /// Anything else the service reports. Treated as still running.
    Other(String),
}

impl OrderStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => OrderStatus::Pending,
            "processing" => OrderStatus::Processing,
            "complete" => OrderStatus::Complete,
            "complete_with_errors" => OrderStatus::CompleteWithErrors,
            "failed" => OrderStatus::Failed,
            _ => OrderStatus::Other(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Complete => "complete",
            OrderStatus::CompleteWithErrors => "complete_with_errors",
            OrderStatus::Failed => "failed",
            OrderStatus::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Complete | OrderStatus::CompleteWithErrors | OrderStatus::Failed
        )
    }

    /// Terminal with an archive to fetch.
    pub fn has_output(&self) -> bool {
        matches!(self, OrderStatus::Complete | OrderStatus::CompleteWithErrors)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted order. The id is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderHandle {
    pub order_id: String,
    pub status_url: String,
    pub status: OrderStatus,
}

/// Result of one status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub order_id: String,
    pub status: OrderStatus,
    /// Processing messages, usually explaining partial or failed orders.
    pub messages: Vec<String>,
    /// Archive locations, when the service advertises them.
    pub download_urls: Vec<String>,
}

/// A downloaded order archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    /// `None` for streamed requests, which have no order behind them.
    pub order_id: Option<String>,
    pub url: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Longest pause allowed between two status checks.
pub const MAX_POLL_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// How long and how often [`crate::Client::wait`] checks an order.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// `None` removes the attempt limit.
    pub max_attempts: Option<u32>,
    /// Overall budget measured from the first status check. `None` removes it.
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            multiplier: 1.5,
            max_attempts: Some(360),
            deadline: Some(Duration::from_secs(6 * 60 * 60)),
        }
    }
}

impl PollPolicy {
    /// Check once per `delay`, forever. This is how the service's own examples poll.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            max_attempts: None,
            deadline: None,
        }
    }

    /// Sleep before status check number `attempt + 1` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(64) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        let capped = secs.min(self.max_delay.as_secs_f64().max(self.initial_delay.as_secs_f64()));
        Duration::try_from_secs_f64(capped.min(MAX_POLL_DELAY.as_secs_f64())).unwrap_or(MAX_POLL_DELAY)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::InvalidRequest(format!(
                "poll multiplier must be >= 1, got {}",
                self.multiplier
            )));
        }
        if self.max_attempts == Some(0) {
            return Err(Error::InvalidRequest("poll max_attempts must be > 0".into()));
        }
        for (name, d) in [("initial_delay", self.initial_delay), ("max_delay", self.max_delay)] {
            if d > MAX_POLL_DELAY {
                return Err(Error::InvalidRequest(format!(
                    "poll {name} of {}s exceeds {}s",
                    d.as_secs(),
                    MAX_POLL_DELAY.as_secs()
                )));
            }
        }
        Ok(())
    }
}

/// Extract the order id (and initial status, if present) from a submission response.
pub fn parse_order_response(body: &str) -> Result<(String, Option<OrderStatus>)> {
    let root = xml::parse(body).map_err(|e| Error::RequestRejected {
        status: 0,
        body: format!("unreadable order response: {e}"),
    })?;

    let order_id = root
        .descendants("orderId")
        .first()
        .map(|e| e.text_trimmed().to_string())
        .unwrap_or_default();
    if order_id.is_empty() {
        return Err(Error::RequestRejected {
            status: 0,
            body: "response carried no order id".into(),
        });
    }
    if !is_plain_order_id(&order_id) {
        return Err(Error::RequestRejected {
            status: 0,
            body: format!("malformed order id: {order_id}"),
        });
    }

    let status = first_status(&root).map(|s| OrderStatus::parse(&s));
    Ok((order_id, status))
}

/// Parse a status document for `order_id`.
pub fn parse_status_response(order_id: &str, body: &str) -> Result<StatusReport> {
    let root = xml::parse(body)?;
    let status = first_status(&root)
        .ok_or_else(|| Error::Xml(format!("no requestStatus in status of order {order_id}")))?;

    let messages = root
        .descendants("processInfo")
        .into_iter()
        .flat_map(|p| p.children.iter())
        .map(|m| m.text_trimmed().to_string())
        .filter(|m| !m.is_empty())
        .collect();

    let download_urls = root
        .descendants("downloadUrl")
        .into_iter()
        .map(|u| u.text_trimmed().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    Ok(StatusReport {
        order_id: order_id.to_string(),
        status: OrderStatus::parse(&status),
        messages,
        download_urls,
    })
}

/// Order ids double as archive file names, so only `[A-Za-z0-9_-]` is accepted.
pub(crate) fn is_plain_order_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Text of the first child of the first `requestStatus` element.
fn first_status(root: &xml::Element) -> Option<String> {
    let rs = *root.descendants("requestStatus").first()?;
    let first = rs.children.first()?;
    let s = first.text_trimmed();
    if s.is_empty() { None } else { Some(s.to_string()) }
}
