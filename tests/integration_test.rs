#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use profile_view::backend::{
        Failure, MemoryBackend, Operation, PersonalRecord, ProfileRecord,
        TechnicalRecord,
    };
    use profile_view::{
        ConnectAction, ConnectionState, MemorySession, NoticeKind,
        ViewController, ViewError, ViewModel, ViewSubscriber,
    };

    const VIEWER: u64 = 1;
    const SUBJECT: u64 = 2;

    fn initialize() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn authored_profile() -> ProfileRecord {
        let mut language_stats = BTreeMap::new();
        language_stats.insert("Rust".to_owned(), 72.0);
        language_stats.insert("TypeScript".to_owned(), 28.0);
        ProfileRecord {
            personal: Some(PersonalRecord {
                name: Some("Ada Subject".to_owned()),
                ..Default::default()
            }),
            technical: Some(TechnicalRecord {
                headline: Some("Systems engineer".to_owned()),
                co_founder_summary: Some("Builds storage engines".to_owned()),
                key_strengths: vec!["Databases".to_owned()],
                potential_roles: vec!["CTO".to_owned()],
                language_stats,
                ..Default::default()
            }),
        }
    }

    fn backend() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_viewer(VIEWER, "viewer");
        backend.add_subject(VIEWER, "viewer", None);
        backend.add_subject(SUBJECT, "subject", Some(authored_profile()));
        backend.add_subject(3, "newcomer", None);
        backend
    }

    fn controller(backend: &Arc<MemoryBackend>) -> Arc<ViewController> {
        initialize();
        Arc::new(ViewController::with_backend(
            backend.clone(),
            Arc::new(MemorySession::new("token")),
        ))
    }

    /// Let spawned loads run until they block on a held fetch.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn accepted_connection_renders_without_connect_button() {
        let backend = backend();
        backend.set_status("2", Some("accepted"));
        let controller = controller(&backend);

        let view = controller.show(Some("2")).await.unwrap();
        assert!(view.page_error.is_none());
        assert!(!view.loading);
        let content = view.content.as_ref().unwrap();
        assert_eq!(content.summary.as_deref(), Some("Builds storage engines"));
        assert_eq!(content.language_stats.get("Rust"), Some(&72.0));
        assert_eq!(view.subject.as_ref().unwrap().display_name, "Ada Subject");
        assert_eq!(view.connection_state, ConnectionState::Accepted);
        assert_eq!(view.connect_action(), ConnectAction::Connected);
        assert_eq!(controller.snapshot(), view);
    }

    #[tokio::test]
    async fn missing_profile_is_an_empty_state_not_an_error() {
        let backend = backend();
        let controller = controller(&backend);

        let view = controller.show(Some("3")).await.unwrap();
        assert!(view.page_error.is_none());
        assert!(view.content.is_none());
        assert_eq!(
            view.empty_state.as_deref(),
            Some("This user hasn't created a co-founder profile yet.")
        );
        assert_eq!(view.subject.unwrap().display_name, "newcomer");
        assert_eq!(view.connection_state, ConnectionState::None);
    }

    #[tokio::test]
    async fn unauthenticated_viewer_is_fatal_and_skips_status() {
        let backend = backend();
        backend.fail_viewer(Failure::Unauthenticated);
        let controller = controller(&backend);

        let view = controller.show(Some("2")).await.unwrap();
        assert!(view.page_error.is_some());
        assert!(view.content.is_none());
        assert!(view.subject.is_none());
        assert_eq!(view.connection_state, ConnectionState::Unknown);
        assert_eq!(backend.call_count(Operation::ConnectionStatus), 0);
        assert!(controller.request_connection().is_none());
    }

    #[tokio::test]
    async fn subject_failure_is_fatal() {
        let backend = backend();
        backend.fail_profile("2", Failure::Timeout);
        let controller = controller(&backend);

        let view = controller.show(Some("2")).await.unwrap();
        assert_eq!(
            view.page_error.as_deref(),
            Some("Failed to load user profile.")
        );
        let view = controller.show(Some("404")).await.unwrap();
        assert_eq!(view.page_error.as_deref(), Some("user profile not found"));
    }

    #[tokio::test]
    async fn own_profile_never_asks_for_status() {
        let backend = backend();
        let controller = controller(&backend);

        let view = controller.show(Some(" 1 ")).await.unwrap();
        assert!(view.is_own_profile);
        assert_eq!(view.connection_state, ConnectionState::Unknown);
        assert_eq!(view.connect_action(), ConnectAction::Hidden);
        assert_eq!(backend.call_count(Operation::ConnectionStatus), 0);
        assert!(controller.request_connection().is_none());
    }

    #[tokio::test]
    async fn failed_status_lookup_still_renders() {
        let backend = backend();
        backend.fail_status(Failure::Transport);
        let controller = controller(&backend);

        let view = controller.show(Some("2")).await.unwrap();
        assert!(view.page_error.is_none());
        assert!(view.content.is_some());
        assert_eq!(view.connection_state, ConnectionState::Unknown);
        assert_eq!(view.connect_action(), ConnectAction::Available);
    }

    #[tokio::test]
    async fn loading_twice_yields_equal_views() {
        let backend = backend();
        backend.set_status("2", Some("pending"));
        let controller = controller(&backend);

        let first = controller.show(Some("2")).await.unwrap();
        let second = controller.show(Some("2")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_subject_resolves_immediately() {
        let backend = backend();
        let controller = controller(&backend);

        let view = controller.show(None).await.unwrap();
        assert_eq!(view.page_error.as_deref(), Some("no subject specified"));
        assert_eq!(backend.call_count(Operation::ViewerIdentity), 0);
    }

    #[tokio::test]
    async fn late_success_of_superseded_load_is_discarded() {
        let backend = backend();
        backend.ignore_cancellation(true);
        let gate = backend.hold(Operation::SubjectProfile, "2");
        let controller = controller(&backend);

        let stale = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.show(Some("2")).await })
        };
        settle().await;
        assert_eq!(backend.calls_for(Operation::SubjectProfile, "2"), 1);

        let fresh = controller.show(Some("3")).await.unwrap();
        gate.open();
        let stale = stale.await.unwrap();

        assert!(matches!(stale, Err(ViewError::Superseded)));
        let view = controller.snapshot();
        assert_eq!(view, fresh);
        assert_eq!(view.subject.unwrap().display_name, "newcomer");
        assert_eq!(backend.calls_for(Operation::ConnectionStatus, "2"), 0);
    }

    #[tokio::test]
    async fn fast_failure_of_superseded_load_is_discarded() {
        let backend = backend();
        backend.ignore_cancellation(true);
        backend.fail_profile("2", Failure::Transport);
        let old_gate = backend.hold(Operation::SubjectProfile, "2");
        let new_gate = backend.hold(Operation::SubjectProfile, "3");
        let controller = controller(&backend);

        let stale = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.show(Some("2")).await })
        };
        settle().await;
        let fresh = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.show(Some("3")).await })
        };
        settle().await;

        old_gate.open();
        assert!(matches!(stale.await.unwrap(), Err(ViewError::Superseded)));
        let view = controller.snapshot();
        assert!(view.loading);
        assert!(view.page_error.is_none());

        new_gate.open();
        let fresh = fresh.await.unwrap().unwrap();
        assert!(fresh.page_error.is_none());
        assert_eq!(controller.snapshot(), fresh);
    }

    #[tokio::test]
    async fn switching_subject_cancels_outstanding_fetches() {
        let backend = backend();
        backend.hold(Operation::SubjectProfile, "2");
        let controller = controller(&backend);

        let stale = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.show(Some("2")).await })
        };
        settle().await;
        controller.show(Some("3")).await.unwrap();

        // Resolves without the gate ever opening.
        assert!(matches!(stale.await.unwrap(), Err(ViewError::Superseded)));
    }

    #[tokio::test]
    async fn teardown_discards_in_flight_load() {
        let backend = backend();
        backend.ignore_cancellation(true);
        let gate = backend.hold(Operation::ViewerIdentity, "");
        let controller = controller(&backend);

        let load = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.show(Some("2")).await })
        };
        settle().await;
        controller.teardown();
        gate.open();

        assert!(matches!(load.await.unwrap(), Err(ViewError::Superseded)));
        assert!(controller.snapshot().loading);
    }

    #[tokio::test]
    async fn request_is_optimistic_and_rolls_back_on_failure() {
        let backend = backend();
        backend.set_status("2", None);
        backend.fail_request(Failure::Transport);
        let controller = controller(&backend);
        controller.show(Some("2")).await.unwrap();

        let handle = controller.request_connection().unwrap();
        let optimistic = controller.snapshot();
        assert_eq!(optimistic.connection_state, ConnectionState::Pending);
        assert!(optimistic.sending_request);
        assert!(controller.request_connection().is_none());

        assert_eq!(handle.await.unwrap(), ConnectionState::None);
        let view = controller.snapshot();
        assert_eq!(view.connection_state, ConnectionState::None);
        assert!(!view.sending_request);
        let notice = view.notice.unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(view.content.is_some());

        controller.dismiss_notice();
        assert!(controller.snapshot().notice.is_none());
    }

    #[tokio::test]
    async fn request_is_confirmed_on_success() {
        let backend = backend();
        let controller = controller(&backend);
        controller.show(Some("2")).await.unwrap();

        let handle = controller.request_connection().unwrap();
        assert_eq!(handle.await.unwrap(), ConnectionState::Pending);
        let view = controller.snapshot();
        assert_eq!(view.connect_action(), ConnectAction::RequestSent);
        assert_eq!(view.notice.unwrap().message, "Connection request sent!");

        let reloaded = controller.show(Some("2")).await.unwrap();
        assert_eq!(reloaded.connection_state, ConnectionState::Pending);
    }

    #[tokio::test]
    async fn failed_request_settles_on_status_reported_meanwhile() {
        let backend = backend();
        backend.set_status("2", Some("accepted"));
        backend.fail_request(Failure::Transport);
        let status_gate = backend.hold(Operation::ConnectionStatus, "2");
        let request_gate = backend.hold(Operation::ConnectionRequest, "2");
        let controller = controller(&backend);

        let load = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.show(Some("2")).await })
        };
        settle().await;
        assert!(controller.snapshot().is_ready());
        let handle = controller.request_connection().unwrap();

        status_gate.open();
        let loaded = load.await.unwrap().unwrap();
        assert_eq!(loaded.connection_state, ConnectionState::Pending);
        assert!(loaded.sending_request);

        request_gate.open();
        assert_eq!(handle.await.unwrap(), ConnectionState::Accepted);
        let view = controller.snapshot();
        assert_eq!(view.connection_state, ConnectionState::Accepted);
        assert_eq!(view.connect_action(), ConnectAction::Connected);
        assert_eq!(view.notice.unwrap().kind, NoticeKind::Error);
    }

    #[tokio::test]
    async fn dot_segment_subject_is_not_loaded() {
        let backend = backend();
        let controller = controller(&backend);

        let view = controller.show(Some("..")).await.unwrap();
        assert_eq!(view.page_error.as_deref(), Some("no subject specified"));
        assert_eq!(backend.call_count(Operation::SubjectProfile), 0);
    }

    struct Recorder {
        views: Mutex<Vec<ViewModel>>,
    }

    impl ViewSubscriber for Recorder {
        fn get_id(&self) -> String {
            "recorder".to_owned()
        }

        fn notify_view(&self, view: &ViewModel) {
            self.views.lock().unwrap().push(view.clone());
        }
    }

    #[tokio::test]
    async fn subscribers_follow_each_stage() {
        let backend = backend();
        backend.set_status("2", Some("accepted"));
        let controller = controller(&backend);
        let recorder = Arc::new(Recorder {
            views: Mutex::new(vec![]),
        });
        controller.subscribe(recorder.clone());

        controller.show(Some("2")).await.unwrap();

        let views = recorder.views.lock().unwrap();
        assert_eq!(views.len(), 3);
        assert!(views[0].loading);
        assert!(views[1].content.is_some());
        assert_eq!(views[1].connection_state, ConnectionState::Unknown);
        assert_eq!(views[2].connection_state, ConnectionState::Accepted);
    }
}
