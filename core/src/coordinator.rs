//! Observable load/error/success state for the employee list.
//!
//! # Design
//! `DirectoryCoordinator` runs one fetch attempt per `request_fetch` call on
//! a tokio runtime and applies the outcome to a single `FetchState`. Every
//! request takes a fresh, monotonically increasing token; a completion is
//! applied only if its token is still the latest, so a superseded request
//! can never overwrite the result of a newer one. The in-flight transport
//! call of a superseded request is not aborted.
//!
//! Notifications are queued under the same lock as the state write that
//! produced them, then delivered by whichever caller finds no delivery in
//! progress. Observers therefore see events in state-write order, run
//! outside the state lock, and may call back into the coordinator.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::DirectoryClient;
use crate::error::FetchError;
use crate::response::EmployeeListResponse;
use crate::types::Employee;

/// Where the coordinator is in its fetch lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Latest known outcome of fetching the employee list.
///
/// While `is_loading` is true, `employees` still holds the previous result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchState {
    pub phase: FetchPhase,
    pub employees: Vec<Employee>,
    pub is_loading: bool,
    pub error_message: Option<String>,
}

/// Receives state change notifications from a `DirectoryCoordinator`.
///
/// Callbacks may run on a runtime worker thread and, when another delivery
/// is already in progress, after the triggering call has returned.
pub trait DirectoryObserver: Send + Sync {
    /// Fires after every applied fetch outcome, success or failure.
    fn data_updated(&self, state: &FetchState);

    /// Fires when a fetch starts and when its outcome is applied.
    fn loading_changed(&self, _is_loading: bool) {}

    /// Fires only when a fetch fails.
    fn error_occurred(&self, _message: Option<&str>) {}
}

enum Notice {
    Loading(bool),
    Error(String),
    Data(FetchState),
}

struct Tracked {
    latest: u64,
    state: FetchState,
    pending: VecDeque<Notice>,
    delivering: bool,
}

struct Shared {
    client: DirectoryClient,
    runtime: Option<Handle>,
    tracked: Mutex<Tracked>,
    observers: RwLock<Vec<Weak<dyn DirectoryObserver>>>,
}

/// Owns the fetch state for one employee list view.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct DirectoryCoordinator {
    shared: Arc<Shared>,
}

impl DirectoryCoordinator {
    /// Fetches run on the runtime current at each `request_fetch` call.
    pub fn new(client: DirectoryClient) -> Self {
        Self::build(client, None)
    }

    /// Fetches run on `runtime`, so `request_fetch` may be called from any
    /// thread, including ones outside a tokio runtime.
    pub fn with_runtime(client: DirectoryClient, runtime: Handle) -> Self {
        Self::build(client, Some(runtime))
    }

    fn build(client: DirectoryClient, runtime: Option<Handle>) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                runtime,
                tracked: Mutex::new(Tracked {
                    latest: 0,
                    state: FetchState::default(),
                    pending: VecDeque::new(),
                    delivering: false,
                }),
                observers: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Register an observer. Only a weak reference is kept; an observer is
    /// forgotten once the caller drops its last `Arc`.
    pub fn subscribe(&self, observer: Arc<dyn DirectoryObserver>) {
        let mut observers = self
            .shared
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        observers.retain(|o| o.strong_count() > 0);
        observers.push(Arc::downgrade(&observer));
    }

    pub fn state(&self) -> FetchState {
        self.shared.lock().state.clone()
    }

    pub fn employees(&self) -> Vec<Employee> {
        self.shared.lock().state.employees.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock().state.is_loading
    }

    pub fn error_message(&self) -> Option<String> {
        self.shared.lock().state.error_message.clone()
    }

    /// Start a fetch and return immediately.
    ///
    /// Marks the state as loading and clears the previous error; the previous
    /// employee list stays in place until the outcome lands. The returned
    /// handle resolves once the outcome has been applied or discarded as
    /// stale.
    ///
    /// # Panics
    /// Panics if the coordinator was built with `new` and this is called
    /// outside a tokio runtime; the state is left untouched in that case. Use
    /// `with_runtime` for such callers.
    pub fn request_fetch(&self) -> JoinHandle<()> {
        let runtime = match &self.shared.runtime {
            Some(runtime) => runtime.clone(),
            None => Handle::current(),
        };
        let token = {
            let mut tracked = self.shared.lock();
            tracked.latest += 1;
            tracked.state.phase = FetchPhase::Loading;
            tracked.state.is_loading = true;
            tracked.state.error_message = None;
            tracked.pending.push_back(Notice::Loading(true));
            tracked.latest
        };
        debug!(token, "employee fetch requested");
        self.shared.deliver();

        let shared = Arc::clone(&self.shared);
        runtime.spawn(async move {
            let outcome = shared.client.fetch_employees().await;
            shared.complete(token, outcome);
        })
    }
}

/// Clears `delivering` if an observer panics mid-delivery.
struct DeliveryGuard<'a> {
    shared: &'a Shared,
    finished: bool,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.lock().delivering = false;
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, token: u64, outcome: Result<EmployeeListResponse, FetchError>) {
        {
            let mut tracked = self.lock();
            if tracked.latest != token {
                debug!(token, latest = tracked.latest, "discarding stale fetch outcome");
                return;
            }

            let (state, error) = match outcome {
                Ok(list) => {
                    let received = list.len();
                    let employees = list.into_valid();
                    if employees.len() < received {
                        warn!(
                            dropped = received - employees.len(),
                            "dropping invalid employee records"
                        );
                    }
                    let state = FetchState {
                        phase: FetchPhase::Loaded,
                        employees,
                        is_loading: false,
                        error_message: None,
                    };
                    (state, None)
                }
                Err(err) => {
                    warn!(error = %err, "employee fetch failed");
                    let message = err.user_message().to_string();
                    let state = FetchState {
                        phase: FetchPhase::Failed,
                        employees: Vec::new(),
                        is_loading: false,
                        error_message: Some(message.clone()),
                    };
                    (state, Some(message))
                }
            };
            tracked.state = state;

            let snapshot = tracked.state.clone();
            tracked.pending.push_back(Notice::Loading(false));
            if let Some(message) = error {
                tracked.pending.push_back(Notice::Error(message));
            }
            tracked.pending.push_back(Notice::Data(snapshot));
        }
        self.deliver();
    }

    /// Drain queued notices in order. Returns at once if another caller is
    /// already draining; that caller picks up anything queued meanwhile.
    fn deliver(&self) {
        {
            let mut tracked = self.lock();
            if tracked.delivering {
                return;
            }
            tracked.delivering = true;
        }

        let mut guard = DeliveryGuard {
            shared: self,
            finished: false,
        };
        loop {
            let notice = {
                let mut tracked = self.lock();
                match tracked.pending.pop_front() {
                    Some(notice) => notice,
                    None => {
                        tracked.delivering = false;
                        guard.finished = true;
                        return;
                    }
                }
            };
            self.dispatch(&notice);
        }
    }

    fn dispatch(&self, notice: &Notice) {
        let observers: Vec<Arc<dyn DirectoryObserver>> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for observer in &observers {
            match notice {
                Notice::Loading(is_loading) => observer.loading_changed(*is_loading),
                Notice::Error(message) => observer.error_occurred(Some(message.as_str())),
                Notice::Data(state) => observer.data_updated(state),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc as std_mpsc;

    use async_trait::async_trait;
    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::error::TransportError;
    use crate::http::{HttpRequest, HttpResponse, Transport};
    use crate::types::EmployeeType;

    type Reply = oneshot::Sender<Result<HttpResponse, TransportError>>;

    /// Parks every request until the test answers it.
    struct GatedTransport {
        calls: mpsc::UnboundedSender<Reply>,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let (tx, rx) = oneshot::channel();
            self.calls
                .send(tx)
                .map_err(|_| TransportError::new("test harness gone"))?;
            rx.await
                .unwrap_or_else(|_| Err(TransportError::new("reply dropped")))
        }
    }

    fn gated() -> (DirectoryCoordinator, mpsc::UnboundedReceiver<Reply>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = DirectoryClient::new(
            "https://example.com/",
            Arc::new(GatedTransport { calls: tx }),
        );
        (DirectoryCoordinator::new(client), rx)
    }

    fn body(json: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: json.as_bytes().to_vec(),
        })
    }

    #[derive(Debug, PartialEq)]
    enum Event {
        Loading(bool),
        Error(Option<String>),
        Data(usize),
    }

    #[derive(Default)]
    struct Recorder {
        events: std::sync::Mutex<VecDeque<Event>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Event> {
            self.events.lock().unwrap().drain(..).collect()
        }
    }

    impl DirectoryObserver for Recorder {
        fn data_updated(&self, state: &FetchState) {
            self.events
                .lock()
                .unwrap()
                .push_back(Event::Data(state.employees.len()));
        }

        fn loading_changed(&self, is_loading: bool) {
            self.events
                .lock()
                .unwrap()
                .push_back(Event::Loading(is_loading));
        }

        fn error_occurred(&self, message: Option<&str>) {
            self.events
                .lock()
                .unwrap()
                .push_back(Event::Error(message.map(str::to_string)));
        }
    }

    const ONE_VALID_ONE_INVALID: &str = r#"{"employees":[
        {"uuid":"1","full_name":"Ada Lovelace","email_address":"ada@x.com","team":"Eng","employee_type":"FULL_TIME"},
        {"uuid":"2","full_name":"No Email"}
    ]}"#;

    #[test]
    fn initial_state_is_idle() {
        let (coordinator, _calls) = gated();
        let state = coordinator.state();
        assert_eq!(state.phase, FetchPhase::Idle);
        assert!(state.employees.is_empty());
        assert!(!state.is_loading);
        assert!(state.error_message.is_none());
    }

    #[tokio::test]
    async fn success_keeps_only_valid_employees() {
        let (coordinator, mut calls) = gated();
        let recorder = Arc::new(Recorder::default());
        coordinator.subscribe(recorder.clone());

        let handle = coordinator.request_fetch();
        assert!(coordinator.is_loading());
        assert_eq!(coordinator.state().phase, FetchPhase::Loading);

        calls.recv().await.unwrap().send(body(ONE_VALID_ONE_INVALID)).unwrap();
        handle.await.unwrap();

        let state = coordinator.state();
        assert_eq!(state.phase, FetchPhase::Loaded);
        assert!(!state.is_loading);
        assert!(state.error_message.is_none());
        assert_eq!(state.employees.len(), 1);
        assert_eq!(state.employees[0].employee_type, EmployeeType::FullTime);
        assert_eq!(
            recorder.take(),
            vec![Event::Loading(true), Event::Loading(false), Event::Data(1)]
        );
    }

    #[tokio::test]
    async fn failure_clears_employees_and_sets_message() {
        let (coordinator, mut calls) = gated();
        let recorder = Arc::new(Recorder::default());
        coordinator.subscribe(recorder.clone());

        let handle = coordinator.request_fetch();
        calls.recv().await.unwrap().send(body(ONE_VALID_ONE_INVALID)).unwrap();
        handle.await.unwrap();
        assert_eq!(coordinator.employees().len(), 1);
        recorder.take();

        let handle = coordinator.request_fetch();
        assert_eq!(coordinator.employees().len(), 1, "kept while loading");
        calls
            .recv()
            .await
            .unwrap()
            .send(Err(TransportError::new("offline")))
            .unwrap();
        handle.await.unwrap();

        let state = coordinator.state();
        let expected = FetchError::Network(TransportError::new("offline")).user_message();
        assert_eq!(state.phase, FetchPhase::Failed);
        assert!(state.employees.is_empty());
        assert!(!state.is_loading);
        assert_eq!(state.error_message.as_deref(), Some(expected));
        assert_eq!(
            recorder.take(),
            vec![
                Event::Loading(true),
                Event::Loading(false),
                Event::Error(Some(expected.to_string())),
                Event::Data(0),
            ]
        );
    }

    #[tokio::test]
    async fn new_request_clears_previous_error() {
        let (coordinator, mut calls) = gated();

        let handle = coordinator.request_fetch();
        calls.recv().await.unwrap().send(body("[]")).unwrap();
        handle.await.unwrap();
        assert!(coordinator.error_message().is_some());

        let handle = coordinator.request_fetch();
        assert!(coordinator.error_message().is_none());
        assert!(coordinator.is_loading());
        calls.recv().await.unwrap().send(body(r#"{"employees":[]}"#)).unwrap();
        handle.await.unwrap();

        let state = coordinator.state();
        assert_eq!(state.phase, FetchPhase::Loaded);
        assert!(state.employees.is_empty());
        assert!(state.error_message.is_none());
    }

    #[tokio::test]
    async fn stale_outcome_is_discarded() {
        let (coordinator, mut calls) = gated();
        let recorder = Arc::new(Recorder::default());
        coordinator.subscribe(recorder.clone());

        let first_handle = coordinator.request_fetch();
        let first = calls.recv().await.unwrap();
        let second_handle = coordinator.request_fetch();
        let second = calls.recv().await.unwrap();

        second
            .send(body(r#"{"employees":[{"uuid":"b","full_name":"Second","email_address":"b@x.com"}]}"#))
            .unwrap();
        second_handle.await.unwrap();

        first
            .send(body(r#"{"employees":[{"uuid":"a","full_name":"First","email_address":"a@x.com"}]}"#))
            .unwrap();
        first_handle.await.unwrap();

        let state = coordinator.state();
        assert_eq!(state.phase, FetchPhase::Loaded);
        assert_eq!(state.employees.len(), 1);
        assert_eq!(state.employees[0].uuid, "b");
        assert_eq!(
            recorder.take(),
            vec![
                Event::Loading(true),
                Event::Loading(true),
                Event::Loading(false),
                Event::Data(1),
            ]
        );
    }

    #[tokio::test]
    async fn stale_failure_does_not_override_pending_request() {
        let (coordinator, mut calls) = gated();

        let first_handle = coordinator.request_fetch();
        let first = calls.recv().await.unwrap();
        let second_handle = coordinator.request_fetch();
        let second = calls.recv().await.unwrap();

        first.send(Err(TransportError::new("timed out"))).unwrap();
        first_handle.await.unwrap();
        let state = coordinator.state();
        assert!(state.is_loading);
        assert!(state.error_message.is_none());

        second.send(body(r#"{"employees":[]}"#)).unwrap();
        second_handle.await.unwrap();
        let state = coordinator.state();
        assert!(!state.is_loading);
        assert_eq!(state.phase, FetchPhase::Loaded);
    }

    #[tokio::test]
    async fn dropped_observers_are_not_notified() {
        let (coordinator, mut calls) = gated();
        let kept = Arc::new(Recorder::default());
        coordinator.subscribe(kept.clone());
        coordinator.subscribe(Arc::new(Recorder::default()));

        let handle = coordinator.request_fetch();
        calls.recv().await.unwrap().send(body(r#"{"employees":[]}"#)).unwrap();
        handle.await.unwrap();

        assert_eq!(kept.take().len(), 3);
        assert_eq!(
            coordinator
                .shared
                .observers
                .read()
                .unwrap()
                .iter()
                .filter(|o| o.strong_count() > 0)
                .count(),
            1
        );
    }

    /// Answers call `n` with a single employee whose uuid is `req{n}`.
    #[derive(Default)]
    struct NumberedTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for NumberedTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            body(&format!(
                r#"{{"employees":[{{"uuid":"req{n}","full_name":"Request {n}","email_address":"r{n}@x.com"}}]}}"#
            ))
        }
    }

    fn numbered() -> DirectoryClient {
        DirectoryClient::new(
            "https://example.com/",
            Arc::new(NumberedTransport::default()),
        )
    }

    /// Records events by name and parks inside the first `loading_changed(false)`
    /// until the test lets it go.
    struct StallingObserver {
        events: std::sync::Mutex<Vec<String>>,
        stall: std::sync::Mutex<Option<(oneshot::Sender<()>, std_mpsc::Receiver<()>)>>,
    }

    impl StallingObserver {
        fn new() -> (Arc<Self>, oneshot::Receiver<()>, std_mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = oneshot::channel();
            let (release_tx, release_rx) = std_mpsc::channel();
            let observer = Arc::new(Self {
                events: std::sync::Mutex::new(Vec::new()),
                stall: std::sync::Mutex::new(Some((entered_tx, release_rx))),
            });
            (observer, entered_rx, release_tx)
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl DirectoryObserver for StallingObserver {
        fn data_updated(&self, state: &FetchState) {
            let ids: Vec<&str> = state.employees.iter().map(|e| e.uuid.as_str()).collect();
            self.events
                .lock()
                .unwrap()
                .push(format!("data({})", ids.join(",")));
        }

        fn loading_changed(&self, is_loading: bool) {
            self.events
                .lock()
                .unwrap()
                .push(format!("loading({is_loading})"));
            if is_loading {
                return;
            }
            let stall = self.stall.lock().unwrap().take();
            if let Some((entered, release)) = stall {
                entered.send(()).unwrap();
                release.recv().unwrap();
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_observer_sees_outcomes_in_state_order() {
        let coordinator = DirectoryCoordinator::new(numbered());
        let (observer, entered, release) = StallingObserver::new();
        coordinator.subscribe(observer.clone());

        let first = coordinator.request_fetch();
        entered.await.unwrap();

        // The first outcome is applied and its observer call is parked; the
        // second request runs to completion meanwhile.
        coordinator.request_fetch().await.unwrap();
        assert_eq!(coordinator.employees()[0].uuid, "req2");

        release.send(()).unwrap();
        first.await.unwrap();

        assert_eq!(
            observer.events(),
            [
                "loading(true)",
                "loading(false)",
                "data(req1)",
                "loading(true)",
                "loading(false)",
                "data(req2)",
            ]
        );
        assert_eq!(coordinator.employees()[0].uuid, "req2");
    }

    /// Reads the coordinator from inside every callback.
    struct Reentrant {
        coordinator: DirectoryCoordinator,
        seen_loading: std::sync::Mutex<Vec<bool>>,
    }

    impl DirectoryObserver for Reentrant {
        fn data_updated(&self, state: &FetchState) {
            assert_eq!(self.coordinator.state(), *state);
        }

        fn loading_changed(&self, _is_loading: bool) {
            let loading = self.coordinator.is_loading();
            self.seen_loading.lock().unwrap().push(loading);
        }
    }

    #[tokio::test]
    async fn observers_may_read_the_coordinator() {
        let coordinator = DirectoryCoordinator::new(numbered());
        let observer = Arc::new(Reentrant {
            coordinator: coordinator.clone(),
            seen_loading: std::sync::Mutex::new(Vec::new()),
        });
        coordinator.subscribe(observer.clone());

        coordinator.request_fetch().await.unwrap();
        assert_eq!(*observer.seen_loading.lock().unwrap(), [true, false]);
    }

    /// Panics on the first `loading_changed` it receives.
    #[derive(Default)]
    struct PanicsOnce {
        fired: AtomicBool,
    }

    impl DirectoryObserver for PanicsOnce {
        fn data_updated(&self, _state: &FetchState) {}

        fn loading_changed(&self, _is_loading: bool) {
            if !self.fired.swap(true, Ordering::SeqCst) {
                panic!("observer failure");
            }
        }
    }

    #[tokio::test]
    async fn panicking_observer_does_not_stall_later_notifications() {
        let (coordinator, mut calls) = gated();
        coordinator.subscribe(Arc::new(PanicsOnce::default()));
        let recorder = Arc::new(Recorder::default());
        coordinator.subscribe(recorder.clone());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| coordinator.request_fetch()));
        assert!(outcome.is_err());
        assert!(recorder.take().is_empty());

        let handle = coordinator.request_fetch();
        calls.recv().await.unwrap().send(body(r#"{"employees":[]}"#)).unwrap();
        handle.await.unwrap();

        assert_eq!(
            recorder.take(),
            vec![Event::Loading(true), Event::Loading(false), Event::Data(0)]
        );
    }

    #[test]
    fn with_runtime_accepts_requests_from_plain_threads() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        let coordinator = DirectoryCoordinator::with_runtime(numbered(), runtime.handle().clone());

        let handle = std::thread::spawn({
            let coordinator = coordinator.clone();
            move || coordinator.request_fetch()
        })
        .join()
        .unwrap();
        runtime.block_on(handle).unwrap();

        let state = coordinator.state();
        assert_eq!(state.phase, FetchPhase::Loaded);
        assert_eq!(state.employees[0].uuid, "req1");
    }

    #[test]
    fn request_outside_a_runtime_leaves_state_idle() {
        let coordinator = DirectoryCoordinator::new(numbered());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| coordinator.request_fetch()));
        assert!(outcome.is_err());
        assert_eq!(coordinator.state(), FetchState::default());
    }
}
