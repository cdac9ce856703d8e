use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::backend::ConnectionService;
use crate::model::{ConnectionState, Notice, REQUEST_SENT_MESSAGE};
use crate::slot::ViewSlot;

const LOG_PREFIX: &str = "[connection-action]";

/// Sends connection requests for the subject on display.
///
/// `none`/`unknown -> pending` is applied optimistically before the request
/// goes out and rolled back if it fails. `pending` and `accepted` are final
/// here.
pub struct ConnectionCoordinator {
    connections: Arc<dyn ConnectionService>,
    slot: Arc<ViewSlot>,
}

impl ConnectionCoordinator {
    pub fn new(
        connections: Arc<dyn ConnectionService>,
        slot: Arc<ViewSlot>,
    ) -> Self {
        Self { connections, slot }
    }

    /// Move the view to `pending` right away and send the request in the
    /// background. The handle resolves to the state the action settled on.
    ///
    /// Returns `None` and changes nothing when the view does not offer the
    /// action: still loading, failed, own profile, already pending or
    /// accepted, or a request already in flight. Must be called from within
    /// a tokio runtime.
    pub fn request_connection(&self) -> Option<JoinHandle<ConnectionState>> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::error!("{} no async runtime: {}", LOG_PREFIX, e);
                return None;
            }
        };

        let lease = self.slot.current();
        let mut started = None;
        lease.update(|v| {
            if !v.can_request_connection() {
                return false;
            }
            let subject = match &v.subject {
                Some(subject) => subject.canonical_id.clone(),
                None => return false,
            };
            started = Some((subject, v.connection_state));
            v.connection_state = ConnectionState::Pending;
            v.sending_request = true;
            v.confirmed_state = None;
            v.notice = None;
            true
        });
        let (subject, prior) = match started {
            Some(started) => started,
            None => {
                log::debug!("{} action not available", LOG_PREFIX);
                return None;
            }
        };

        log::info!("{} sending request to {}", LOG_PREFIX, subject);
        let connections = self.connections.clone();
        Some(runtime.spawn(async move {
            let result = connections
                .send_connection_request(subject.as_str(), lease.cancel_token())
                .await;
            match result {
                Ok(ack) => {
                    let message = ack
                        .message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| REQUEST_SENT_MESSAGE.to_owned());
                    let mut settled = ConnectionState::Pending;
                    lease.apply(|v| {
                        if v.confirmed_state.take()
                            == Some(ConnectionState::Accepted)
                        {
                            settled = ConnectionState::Accepted;
                        }
                        v.connection_state = settled;
                        v.sending_request = false;
                        v.notice = Some(Notice::info(message));
                    });
                    settled
                }
                Err(e) => {
                    log::warn!(
                        "{} request to {} failed: {}",
                        LOG_PREFIX,
                        subject,
                        e
                    );
                    // A status confirmed while the request was out is
                    // newer than the state the action started from.
                    let mut settled = prior;
                    lease.apply(|v| {
                        if let Some(confirmed) = v.confirmed_state.take() {
                            settled = confirmed;
                        }
                        v.connection_state = settled;
                        v.sending_request = false;
                        v.notice = Some(Notice::error(format!("Error: {}", e)));
                    });
                    settled
                }
            }
        }))
    }

    pub fn dismiss_notice(&self) {
        self.slot.current().update(|v| v.notice.take().is_some());
    }
}
