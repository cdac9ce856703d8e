use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::backend::ConnectionService;
use crate::model::ConnectionState;
use crate::ViewError;

const LOG_PREFIX: &str = "[status-gateway]";

/// Best-effort connection-status lookup. Never fails: anything that goes
/// wrong reads as [`ConnectionState::Unknown`].
#[derive(Clone)]
pub struct StatusGateway {
    connections: Arc<dyn ConnectionService>,
}

impl StatusGateway {
    pub fn new(connections: Arc<dyn ConnectionService>) -> Self {
        Self { connections }
    }

    pub async fn get_status(
        &self,
        subject_id: &str,
        cancel: &CancellationToken,
    ) -> ConnectionState {
        match self
            .connections
            .fetch_connection_status(subject_id, cancel)
            .await
        {
            Ok(record) => {
                match ConnectionState::from_status(record.status.as_deref()) {
                    Some(state) => state,
                    None => {
                        log::warn!(
                            "{} unrecognised status {:?} for {}",
                            LOG_PREFIX,
                            record.status,
                            subject_id
                        );
                        ConnectionState::Unknown
                    }
                }
            }
            Err(ViewError::Superseded) => ConnectionState::Unknown,
            Err(e) => {
                log::warn!(
                    "{} failed to fetch connection status for {}: {}",
                    LOG_PREFIX,
                    subject_id,
                    e
                );
                ConnectionState::Unknown
            }
        }
    }
}
