use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::aggregator::ProfileAggregator;
use crate::backend::{
    ConnectionService, HttpBackend, IdentityService, ProfileService,
};
use crate::config::BackendConfig;
use crate::coordinator::ConnectionCoordinator;
use crate::gateway::StatusGateway;
use crate::model::{ConnectionState, ViewModel};
use crate::session::SessionProvider;
use crate::slot::{ViewSlot, ViewSubscriber};
use crate::Result;

/// Owns the view of one profile page.
///
/// The presentation layer calls [`ViewController::show`] whenever the subject
/// changes, renders the snapshots pushed to its [`ViewSubscriber`], and wires
/// the connect button to [`ViewController::request_connection`].
pub struct ViewController {
    slot: Arc<ViewSlot>,
    aggregator: ProfileAggregator,
    coordinator: ConnectionCoordinator,
}

impl ViewController {
    pub fn new(
        profiles: Arc<dyn ProfileService>,
        identities: Arc<dyn IdentityService>,
        connections: Arc<dyn ConnectionService>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        let slot = ViewSlot::new();
        let gateway = StatusGateway::new(connections.clone());
        Self {
            aggregator: ProfileAggregator::new(
                profiles, identities, gateway, session,
            ),
            coordinator: ConnectionCoordinator::new(connections, slot.clone()),
            slot,
        }
    }

    /// Controller over a single backend that serves all three services.
    pub fn with_backend<B>(backend: Arc<B>, session: Arc<dyn SessionProvider>) -> Self
    where
        B: ProfileService + IdentityService + ConnectionService + 'static,
    {
        Self::new(backend.clone(), backend.clone(), backend, session)
    }

    /// Controller talking HTTP to the backend described by `config`.
    pub fn connect(
        config: BackendConfig,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(config, session.clone())?);
        Ok(Self::with_backend(backend, session))
    }

    /// Show `subject_id`, superseding whatever was loading before.
    ///
    /// Resolves with the view this load produced, or
    /// [`crate::ViewError::Superseded`] if another `show` or
    /// [`ViewController::teardown`] took over first.
    pub async fn show(&self, subject_id: Option<&str>) -> Result<ViewModel> {
        let lease = self.slot.begin(subject_id);
        self.aggregator.load_view(&lease).await
    }

    pub fn request_connection(&self) -> Option<JoinHandle<ConnectionState>> {
        self.coordinator.request_connection()
    }

    pub fn dismiss_notice(&self) {
        self.coordinator.dismiss_notice()
    }

    pub fn snapshot(&self) -> ViewModel {
        self.slot.snapshot()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn ViewSubscriber>) {
        self.slot.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, subscriber: Arc<dyn ViewSubscriber>) {
        self.slot.unsubscribe(subscriber)
    }

    /// Cancel everything in flight. Later results are discarded.
    pub fn teardown(&self) {
        self.slot.teardown()
    }
}

impl Drop for ViewController {
    fn drop(&mut self) {
        self.teardown();
    }
}
