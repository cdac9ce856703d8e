//! Builds the view for one subject out of three remote calls.

use std::sync::Arc;

use crate::backend::{IdentityService, ProfileService};
use crate::gateway::StatusGateway;
use crate::id;
use crate::model::{
    ConnectionState, Identity, ProfileContent, ViewModel,
    EMPTY_PROFILE_MESSAGE,
};
use crate::session::SessionProvider;
use crate::slot::Lease;
use crate::{Result, ViewError};

const LOG_PREFIX: &str = "[aggregator]";

pub struct ProfileAggregator {
    profiles: Arc<dyn ProfileService>,
    identities: Arc<dyn IdentityService>,
    gateway: StatusGateway,
    session: Arc<dyn SessionProvider>,
}

impl ProfileAggregator {
    pub fn new(
        profiles: Arc<dyn ProfileService>,
        identities: Arc<dyn IdentityService>,
        gateway: StatusGateway,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            profiles,
            identities,
            gateway,
            session,
        }
    }

    /// Load the view for the lease's subject, writing each stage into the
    /// slot as it resolves.
    ///
    /// Fatal failures come back as `Ok` with `page_error` set. The only error
    /// is [`ViewError::Superseded`], returned once a newer load (or teardown)
    /// has taken the slot; nothing from this load is applied after that.
    pub async fn load_view(&self, lease: &Lease) -> Result<ViewModel> {
        let subject_id = match lease.subject().and_then(id::from_input) {
            Some(subject_id) => subject_id,
            None => return settle_fatal(lease, ViewError::NoSubject),
        };
        if self.session.token().is_none() {
            return settle_fatal(lease, ViewError::SignInRequired);
        }

        log::debug!("{} loading subject {}", LOG_PREFIX, subject_id);
        let cancel = lease.cancel_token();
        let (subject, viewer) = tokio::join!(
            self.profiles
                .fetch_subject_profile(subject_id.as_str(), cancel),
            self.identities.fetch_viewer_identity(cancel),
        );
        if !lease.is_current() {
            return Err(ViewError::Superseded);
        }

        let viewer = match viewer.and_then(|v| {
            let record = v.user.ok_or(ViewError::Unauthenticated)?;
            Identity::from_record(&record, None)
        }) {
            Ok(viewer) => viewer,
            Err(e) => return settle_fatal(lease, e),
        };

        let subject = match subject {
            Ok(subject) => subject,
            Err(e) => return settle_fatal(lease, e),
        };
        let personal = subject
            .profile
            .as_ref()
            .and_then(|p| p.personal.as_ref());
        let identity = match subject
            .user
            .as_ref()
            .ok_or(ViewError::NotFound)
            .and_then(|record| Identity::from_record(record, personal))
        {
            Ok(identity) => identity,
            Err(e) => return settle_fatal(lease, e),
        };

        let content = subject.profile.as_ref().map(ProfileContent::from);
        let is_own_profile = viewer.canonical_id == identity.canonical_id;
        let status_key = identity.canonical_id.clone();

        let mut view = ViewModel {
            empty_state: content
                .is_none()
                .then(|| EMPTY_PROFILE_MESSAGE.to_owned()),
            subject: Some(identity),
            viewer: Some(viewer),
            content,
            is_own_profile,
            ..Default::default()
        };
        let staged = view.clone();
        if !lease.apply(move |v| *v = staged) {
            return Err(ViewError::Superseded);
        }
        if is_own_profile {
            log::debug!("{} viewer is looking at own profile", LOG_PREFIX);
            return Ok(view);
        }

        let state = self
            .gateway
            .get_status(status_key.as_str(), cancel)
            .await;
        if !lease.is_current() {
            return Err(ViewError::Superseded);
        }
        // A connection action started while the lookup was outstanding owns
        // the state from then on; it settles against the looked-up state.
        lease.update(|v| {
            if v.sending_request {
                v.confirmed_state = Some(state);
                return true;
            }
            if v.connection_state != ConnectionState::Unknown {
                return false;
            }
            v.connection_state = state;
            true
        });
        view = lease.view().unwrap_or(view);
        Ok(view)
    }
}

fn settle_fatal(lease: &Lease, error: ViewError) -> Result<ViewModel> {
    if matches!(error, ViewError::Superseded) {
        return Err(error);
    }
    log::warn!("{} page failed to load: {}", LOG_PREFIX, error);
    let view = ViewModel::fatal(error.page_message());
    let staged = view.clone();
    if lease.apply(move |v| *v = staged) {
        Ok(view)
    } else {
        Err(ViewError::Superseded)
    }
}
