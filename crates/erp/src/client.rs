//! Retry-driving request loop over the transport seam.

use std::sync::Arc;

use chrono::Utc;
use foreman_core::{PersistenceError, RetryPolicy};
use serde_json::Value;
use tracing::warn;

use crate::envelope;
use crate::transport::{ErpRequest, ErpTransport, TransportError};

/// Thin client owning the retry loop; classification of outcomes lives in the
/// envelope decoder, the retry decision in [`RetryPolicy`].
#[derive(Clone)]
pub struct ErpClient {
    transport: Arc<dyn ErpTransport>,
}

impl ErpClient {
    pub fn new(transport: Arc<dyn ErpTransport>) -> Self {
        Self { transport }
    }

    pub async fn request(
        &self,
        request: &ErpRequest,
        policy: RetryPolicy,
    ) -> Result<Value, PersistenceError> {
        let mut attempt: u32 = 1;

        loop {
            let result = match self.transport.execute(request).await {
                Ok(response) => envelope::decode(response, Utc::now()),
                Err(TransportError::Timeout) => Err(PersistenceError::Timeout),
                Err(TransportError::Network(message)) => Err(PersistenceError::Network(message)),
            };

            let error = match result {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            let decision = policy.decide(attempt, &error.as_call_outcome());
            if !decision.retry {
                return Err(error);
            }

            warn!(
                event_name = "erp_retry",
                path = %request.path,
                attempt,
                delay_ms = decision.delay.as_millis() as u64,
                error = %error,
            );
            tokio::time::sleep(decision.delay).await;
            attempt += 1;
        }
    }
}
