//! HTTP update callback.

use std::time::Duration;

use reqwest::Url;
use reqwest::multipart::{Form, Part};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};
use ystore_core::address::encode_component;
use ystore_shared::config::CallbackConfig;

use super::error::DeliveryError;

/// Multipart field the receiving endpoint reads the state from.
const PART_NAME: &str = "ydoc";

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// No callback URL configured; nothing was sent.
    Skipped,
    /// The endpoint accepted the state.
    Delivered {
        /// HTTP status code.
        status: u16,
    },
}

/// Sends merged document state to `<base>/<room>` with a `PUT`.
#[derive(Debug, Clone)]
pub struct UpdateCallback {
    client: reqwest::Client,
    base: Option<Url>,
    timeout: Duration,
}

impl UpdateCallback {
    /// Create a callback. `None` disables delivery.
    ///
    /// The base is normalized to end with `/` so rooms are appended as a path segment.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidEndpoint`] if the base URL does not parse or cannot
    /// carry a path.
    pub fn new(base: Option<&str>, timeout: Duration) -> Result<Self, DeliveryError> {
        let base = base.map(normalize_base).transpose()?;
        Ok(Self {
            client: reqwest::Client::new(),
            base,
            timeout,
        })
    }

    /// Create a callback from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL is invalid.
    pub fn from_config(config: &CallbackConfig) -> Result<Self, DeliveryError> {
        Self::new(config.url.as_deref(), config.timeout())
    }

    /// A callback that never sends anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            base: None,
            timeout: Duration::ZERO,
        }
    }

    /// Whether a URL is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.base.is_some()
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// URL a room's state is sent to. `None` when delivery is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error for rooms that would resolve outside the base path (`.` or `..`).
    pub fn endpoint(&self, room: &str) -> Result<Option<Url>, DeliveryError> {
        let Some(base) = &self.base else {
            return Ok(None);
        };
        if room == "." || room == ".." {
            return Err(DeliveryError::invalid_endpoint(format!(
                "room {room:?} is not a path segment"
            )));
        }
        base.join(&encode_component(room))
            .map(Some)
            .map_err(|e| DeliveryError::invalid_endpoint(e.to_string()))
    }

    /// Deliver `state` for `room`, giving up after the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, transport failure or a non-success status.
    pub async fn deliver(
        &self,
        room: &str,
        state: Vec<u8>,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        self.deliver_with_cancel(room, state, &CancellationToken::new())
            .await
    }

    /// Like [`Self::deliver`], also aborting when `cancel` fires.
    ///
    /// The token is cancelled when the timeout expires, so anything else watching it
    /// sees the abort too.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Cancelled`] if `cancel` fired first, otherwise as
    /// [`Self::deliver`].
    pub async fn deliver_with_cancel(
        &self,
        room: &str,
        state: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let Some(url) = self.endpoint(room)? else {
            return Ok(DeliveryOutcome::Skipped);
        };

        let bytes = state.len();
        let form = Form::new().part(PART_NAME, Part::bytes(state).file_name("blob"));
        let exchange = async {
            let response = self
                .client
                .put(url)
                .multipart(form)
                .send()
                .await
                .map_err(DeliveryError::from)?;
            let status = response.status();
            if status.is_success() {
                return Ok(DeliveryOutcome::Delivered {
                    status: status.as_u16(),
                });
            }
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError::rejected(status.as_u16(), body))
        };

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(DeliveryError::Cancelled),
            () = tokio::time::sleep(self.timeout) => {
                cancel.cancel();
                Err(DeliveryError::timeout(room, self.timeout))
            }
            result = exchange => result,
        }?;

        debug!(room, bytes, ?outcome, "delivered update");
        Ok(outcome)
    }

    /// Deliver in the background and log the result. Never fails the caller.
    pub fn dispatch(
        &self,
        tracker: &TaskTracker,
        room: String,
        state: Vec<u8>,
        cancel: CancellationToken,
    ) {
        if !self.is_enabled() {
            return;
        }
        let callback = self.clone();
        tracker.spawn(async move {
            let result = callback.deliver_with_cancel(&room, state, &cancel).await;
            report(&room, &result);
        });
    }
}

/// Log the result of a delivery with its room.
pub fn report(room: &str, result: &Result<DeliveryOutcome, DeliveryError>) {
    match result {
        Ok(_) => {}
        Err(DeliveryError::Timeout { after, .. }) => {
            warn!(room, timeout = ?after, "update delivery timed out");
        }
        Err(DeliveryError::Rejected { status, body }) => {
            error!(room, status, %body, "update callback rejected delivery");
        }
        Err(DeliveryError::Cancelled) => debug!(room, "update delivery cancelled"),
        Err(err) => error!(room, error = %err, "update delivery failed"),
    }
}

fn normalize_base(raw: &str) -> Result<Url, DeliveryError> {
    let mut raw = raw.to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    let url = Url::parse(&raw).map_err(|e| DeliveryError::invalid_endpoint(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(DeliveryError::invalid_endpoint(raw));
    }
    Ok(url)
}
