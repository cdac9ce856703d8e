//! The one active view model and the rule that keeps stale work out of it.
//!
//! Every load takes a [`Lease`] on the slot. Starting a new load (or tearing
//! the slot down) bumps the generation and cancels the previous lease's token,
//! so any result still in flight for the old subject fails the generation
//! check in [`Lease::update`] and is dropped, whether or not its transport
//! honoured the cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};

use tokio_util::sync::CancellationToken;

use crate::model::ViewModel;

const LOG_PREFIX: &str = "[view-slot]";

/// Receives a fresh snapshot on every change of the view model.
///
/// Snapshots arrive in the order the changes were made; one that was
/// overtaken by a newer change before it could be delivered is skipped.
/// Delivery holds the slot's emit lock, so `notify_view` must not call back
/// into anything that changes the view.
pub trait ViewSubscriber: Send + Sync {
    fn get_id(&self) -> String;
    fn notify_view(&self, view: &ViewModel);
}

struct SlotState {
    generation: u64,
    /// Bumped on every change of `view`.
    revision: u64,
    subject: Option<String>,
    view: ViewModel,
    cancel: CancellationToken,
}

pub struct ViewSlot {
    state: RwLock<SlotState>,
    subscribers: RwLock<HashMap<String, Arc<dyn ViewSubscriber>>>,
    /// Last revision handed to subscribers.
    delivered: Mutex<u64>,
}

impl ViewSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(SlotState {
                generation: 0,
                revision: 0,
                subject: None,
                view: ViewModel::default(),
                cancel: CancellationToken::new(),
            }),
            subscribers: RwLock::new(HashMap::new()),
            delivered: Mutex::new(0),
        })
    }

    /// Supersede whatever is loading and start a fresh, loading view for
    /// `subject`.
    pub fn begin(self: &Arc<Self>, subject: Option<&str>) -> Lease {
        let (lease, (revision, snapshot)) = {
            let mut state = self.write_state();
            state.cancel.cancel();
            state.generation += 1;
            state.revision += 1;
            state.subject = subject.map(str::to_owned);
            state.view = ViewModel::loading();
            state.cancel = CancellationToken::new();
            log::debug!(
                "{} generation {} for subject {:?}",
                LOG_PREFIX,
                state.generation,
                state.subject
            );
            (
                Lease {
                    generation: state.generation,
                    subject: state.subject.clone(),
                    cancel: state.cancel.clone(),
                    slot: self.clone(),
                },
                (state.revision, state.view.clone()),
            )
        };
        self.notify(revision, &snapshot);
        lease
    }

    /// Lease on the generation currently displayed.
    pub fn current(self: &Arc<Self>) -> Lease {
        let state = self.read_state();
        Lease {
            generation: state.generation,
            subject: state.subject.clone(),
            cancel: state.cancel.clone(),
            slot: self.clone(),
        }
    }

    /// Cancel outstanding work and invalidate every lease handed out so far.
    /// The last view stays readable.
    pub fn teardown(&self) {
        let mut state = self.write_state();
        state.cancel.cancel();
        state.generation += 1;
        log::debug!("{} torn down", LOG_PREFIX);
    }

    pub fn snapshot(&self) -> ViewModel {
        self.read_state().view.clone()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn ViewSubscriber>) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subscriber.get_id(), subscriber);
    }

    pub fn unsubscribe(&self, subscriber: Arc<dyn ViewSubscriber>) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&subscriber.get_id());
    }

    fn notify(&self, revision: u64, view: &ViewModel) {
        let mut delivered =
            self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        if revision <= *delivered {
            log::debug!("{} skipping overtaken revision {}", LOG_PREFIX, revision);
            return;
        }
        *delivered = revision;
        let subscribers: Vec<_> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for s in subscribers {
            s.notify_view(view);
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, SlotState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SlotState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Right to update the slot on behalf of one load.
#[derive(Clone)]
pub struct Lease {
    generation: u64,
    subject: Option<String>,
    cancel: CancellationToken,
    slot: Arc<ViewSlot>,
}

impl Lease {
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_current(&self) -> bool {
        !self.cancel.is_cancelled()
            && self.slot.read_state().generation == self.generation
    }

    /// Run `change` against the view if this lease is still current. `change`
    /// returns whether it modified anything; subscribers hear about it only
    /// then. Returns whether the change was applied.
    pub fn update(&self, change: impl FnOnce(&mut ViewModel) -> bool) -> bool {
        let (revision, snapshot) = {
            let mut state = self.slot.write_state();
            if state.generation != self.generation || self.cancel.is_cancelled()
            {
                log::debug!(
                    "{} dropping update from stale generation {}",
                    LOG_PREFIX,
                    self.generation
                );
                return false;
            }
            if !change(&mut state.view) {
                return false;
            }
            state.revision += 1;
            (state.revision, state.view.clone())
        };
        self.slot.notify(revision, &snapshot);
        true
    }

    /// Unconditional variant of [`Lease::update`].
    pub fn apply(&self, change: impl FnOnce(&mut ViewModel)) -> bool {
        self.update(|view| {
            change(view);
            true
        })
    }

    pub fn view(&self) -> Option<ViewModel> {
        let state = self.slot.read_state();
        (state.generation == self.generation).then(|| state.view.clone())
    }
}
