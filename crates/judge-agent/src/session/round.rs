use super::RoundOutcome;
use crate::AgentError;
use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Coordinator text for one round, yielded as it is produced.
///
/// The round only advances while the stream is polled. Fragments arrive in
/// order and concatenate to all coordinator text of the round. A round-fatal
/// error is yielded as the last item. Dropping the stream early abandons the
/// round; the session repairs its history before the next one.
pub struct RoundStream<'a> {
    fragments: mpsc::UnboundedReceiver<String>,
    driver: Option<BoxFuture<'a, Result<RoundOutcome, AgentError>>>,
    outcome: Option<RoundOutcome>,
    error: Option<AgentError>,
}

impl<'a> RoundStream<'a> {
    pub(super) fn new(
        fragments: mpsc::UnboundedReceiver<String>,
        driver: BoxFuture<'a, Result<RoundOutcome, AgentError>>,
    ) -> Self {
        Self {
            fragments,
            driver: Some(driver),
            outcome: None,
            error: None,
        }
    }

    /// Available once the stream has been drained without error.
    pub fn outcome(&self) -> Option<&RoundOutcome> {
        self.outcome.as_ref()
    }

    /// Drains remaining fragments and returns the round's outcome.
    pub async fn finish(mut self) -> Result<RoundOutcome, AgentError> {
        while let Some(item) = self.next().await {
            item?;
        }
        self.outcome.take().ok_or_else(|| {
            AgentError::invalid_configuration("round stream was already consumed")
        })
    }

    /// Drains the round, returning the concatenated text next to the result.
    pub async fn collect_text(mut self) -> (String, Result<RoundOutcome, AgentError>) {
        let mut text = String::new();
        while let Some(item) = self.next().await {
            match item {
                Ok(fragment) => text.push_str(&fragment),
                Err(error) => return (text, Err(error)),
            }
        }
        let result = self.outcome.take().ok_or_else(|| {
            AgentError::invalid_configuration("round stream was already consumed")
        });
        (text, result)
    }
}

impl Stream for RoundStream<'_> {
    type Item = Result<String, AgentError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Poll::Ready(Some(fragment)) = this.fragments.poll_recv(cx) {
                return Poll::Ready(Some(Ok(fragment)));
            }

            let Some(driver) = this.driver.as_mut() else {
                // The sender lived inside the driver, so the channel is closed and drained.
                return Poll::Ready(this.error.take().map(Err));
            };
            match driver.as_mut().poll(cx) {
                Poll::Ready(result) => {
                    this.driver = None;
                    match result {
                        Ok(outcome) => this.outcome = Some(outcome),
                        Err(error) => this.error = Some(error),
                    }
                }
                Poll::Pending => {
                    // The driver may have queued text before suspending.
                    return match this.fragments.poll_recv(cx) {
                        Poll::Ready(Some(fragment)) => Poll::Ready(Some(Ok(fragment))),
                        _ => Poll::Pending,
                    };
                }
            }
        }
    }
}
