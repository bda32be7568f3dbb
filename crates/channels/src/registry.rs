//! Lifecycle of the polling sessions.
//!
//! Every configured bot gets at most one live session. Mutations for a name
//! are serialised by a per-name async lock; the session map itself is a
//! concurrent map so status reads never wait on a restart in progress.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    dashmap::DashMap,
    tokio::{sync::Mutex as AsyncMutex, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    handle::{SessionHandle, SessionState},
    interceptor::{Handler, Pipeline},
    plugin::{PollingSubstrate, UpdateStream},
};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

tokio::task_local! {
    /// Generation of the session whose dispatch is running on this task.
    static CURRENT_SESSION: u64;
}

/// A configured bot: its handle plus the handler its events go to.
#[derive(Clone)]
pub struct SessionSpec {
    pub handle: SessionHandle,
    pub handler: Arc<dyn Handler>,
}

struct ActiveSession {
    generation: u64,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    cursor: Arc<Mutex<Option<i64>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ActiveSession {
    fn cursor(&self) -> Option<i64> {
        *self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Clears the running flag however the polling task ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SessionRegistry {
    substrate: Arc<dyn PollingSubstrate>,
    pipeline: Arc<Pipeline>,
    specs: Vec<SessionSpec>,
    locks: HashMap<String, Arc<AsyncMutex<()>>>,
    active: DashMap<String, Arc<ActiveSession>>,
    next_generation: AtomicU64,
    retry_delay: Duration,
    stop_grace: Duration,
}

impl SessionRegistry {
    pub fn new(
        substrate: Arc<dyn PollingSubstrate>,
        pipeline: Pipeline,
        specs: Vec<SessionSpec>,
    ) -> Self {
        let locks = specs
            .iter()
            .map(|s| (s.handle.name().to_string(), Arc::new(AsyncMutex::new(()))))
            .collect();
        Self {
            substrate,
            pipeline: Arc::new(pipeline),
            specs,
            locks,
            active: DashMap::new(),
            next_generation: AtomicU64::new(0),
            retry_delay: DEFAULT_RETRY_DELAY,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// Pause after a transient polling error.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// How long `stop` waits for a polling task to release its connection.
    #[must_use]
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Configured names, in configuration order.
    pub fn names(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|s| s.handle.name().to_string())
            .collect()
    }

    /// The configured spelling of `name`, matched case-insensitively.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.spec(name).map(|s| s.handle.name())
    }

    pub fn handle(&self, name: &str) -> Option<&SessionHandle> {
        self.spec(name).map(|s| &s.handle)
    }

    fn spec(&self, name: &str) -> Option<&SessionSpec> {
        self.specs
            .iter()
            .find(|s| s.handle.name().eq_ignore_ascii_case(name))
    }

    fn lock_for(&self, canonical: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .get(canonical)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::new(AsyncMutex::new(())))
    }

    /// Register every configured session. Failures are logged and skipped.
    /// Returns how many sessions are running afterwards.
    pub async fn start_all(&self) -> usize {
        for spec in &self.specs {
            let name = spec.handle.name();
            let lock = self.lock_for(name);
            let _guard = lock.lock().await;

            if self.status_of(name).is_up() {
                debug!(account_id = name, "session already running");
                continue;
            }
            self.register(spec, None).await;
        }

        let running = self
            .specs
            .iter()
            .filter(|s| self.status_of(s.handle.name()).is_up())
            .count();
        info!(
            running,
            configured = self.specs.len(),
            "session pool initialised"
        );
        running
    }

    /// Stop and drop the current session for `name`, then register a fresh
    /// one. Returns `false` when `name` is not configured or the new
    /// registration fails.
    pub async fn restart(&self, name: &str) -> bool {
        let Some(spec) = self.spec(name) else {
            warn!(account_id = name, "restart requested for unknown session");
            return false;
        };
        let canonical = spec.handle.name();
        let lock = self.lock_for(canonical);
        let _guard = lock.lock().await;

        let mut resume_from = None;
        let current = self.active.get(canonical).map(|e| Arc::clone(e.value()));
        if let Some(old) = current {
            warn!(account_id = canonical, "forcing session stop for restart");
            self.stop(canonical, &old).await;
            resume_from = old.cursor();
            self.active
                .remove_if(canonical, |_, s| s.generation == old.generation);
        }

        self.register(spec, resume_from).await
    }

    /// Pure query; unknown names report [`SessionState::Unregistered`].
    pub fn status_of(&self, name: &str) -> SessionState {
        let Some(canonical) = self.canonical_name(name) else {
            return SessionState::Unregistered;
        };
        match self.active.get(canonical) {
            None => SessionState::Unregistered,
            Some(s) if s.running.load(Ordering::SeqCst) => SessionState::Running,
            Some(_) => SessionState::Stopped,
        }
    }

    /// Snapshot of every configured session, in configuration order.
    pub fn statuses(&self) -> Vec<(String, SessionState)> {
        self.specs
            .iter()
            .map(|s| {
                let name = s.handle.name();
                (name.to_string(), self.status_of(name))
            })
            .collect()
    }

    /// Stop every session. Best-effort; sessions stay listed as stopped.
    pub async fn shutdown(&self) {
        let sessions: Vec<(String, Arc<ActiveSession>)> = self
            .active
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        futures::future::join_all(sessions.iter().map(|(name, session)| async move {
            let lock = self.lock_for(name);
            let _guard = lock.lock().await;
            self.stop(name, session).await;
        }))
        .await;

        info!(count = sessions.len(), "all sessions stopped");
    }

    async fn register(&self, spec: &SessionSpec, resume_from: Option<i64>) -> bool {
        let handle = &spec.handle;
        let name = handle.name();

        let stream = match self.substrate.connect(handle, resume_from).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(account_id = name, error = %e, "session registration failed");
                return false;
            },
        };

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let running = Arc::new(AtomicBool::new(true));
        let cursor = Arc::new(Mutex::new(resume_from));

        let poll = PollLoop {
            handle: handle.clone(),
            handler: Arc::clone(&spec.handler),
            pipeline: Arc::clone(&self.pipeline),
            stream,
            cancel: cancel.clone(),
            cursor: Arc::clone(&cursor),
            generation,
            retry_delay: self.retry_delay,
        };
        let task = tokio::spawn(poll.run(RunningGuard(Arc::clone(&running))));

        self.active.insert(
            name.to_string(),
            Arc::new(ActiveSession {
                generation,
                cancel,
                running,
                cursor,
                task: Mutex::new(Some(task)),
            }),
        );
        info!(account_id = name, generation, "session registered");
        true
    }

    async fn stop(&self, name: &str, session: &ActiveSession) {
        session.cancel.cancel();
        session.running.store(false, Ordering::SeqCst);

        let task = session
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(task) = task else {
            return;
        };

        // A session restarting itself is still inside its own dispatch; its
        // loop exits once that dispatch returns.
        let is_self = CURRENT_SESSION
            .try_with(|g| *g == session.generation)
            .unwrap_or(false);
        if is_self {
            debug!(account_id = name, "session stop requested from its own dispatch");
            return;
        }

        match tokio::time::timeout(self.stop_grace, task).await {
            Ok(Ok(())) => debug!(account_id = name, "session stopped"),
            Ok(Err(e)) => warn!(account_id = name, error = %e, "session task failed"),
            Err(_) => warn!(
                account_id = name,
                grace_secs = self.stop_grace.as_secs(),
                "session did not stop within grace period"
            ),
        }
    }
}

struct PollLoop {
    handle: SessionHandle,
    handler: Arc<dyn Handler>,
    pipeline: Arc<Pipeline>,
    stream: Box<dyn UpdateStream>,
    cancel: CancellationToken,
    cursor: Arc<Mutex<Option<i64>>>,
    generation: u64,
    retry_delay: Duration,
}

impl PollLoop {
    fn save_cursor(&self, cursor: Option<i64>) {
        *self.cursor.lock().unwrap_or_else(|e| e.into_inner()) = cursor;
    }

    async fn run(mut self, _running: RunningGuard) {
        let name = self.handle.name().to_string();
        info!(account_id = %name, "polling loop started");

        loop {
            let batch = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                batch = self.stream.next_batch() => batch,
            };

            match batch {
                Ok(events) => {
                    if !events.is_empty() {
                        debug!(account_id = %name, count = events.len(), "got updates");
                    }
                    // Dispatch is never raced against cancellation, but a
                    // cancelled session leaves the rest of its batch to its
                    // successor. While an event is in flight the saved cursor
                    // points just past it.
                    let mut handed_over = false;
                    for event in &events {
                        if self.cancel.is_cancelled() {
                            self.save_cursor(Some(event.update_id));
                            debug!(
                                account_id = %name,
                                update_id = event.update_id,
                                "session cancelled mid-batch, leaving the rest to its successor"
                            );
                            handed_over = true;
                            break;
                        }
                        self.save_cursor(Some(event.update_id + 1));
                        let dispatch =
                            self.pipeline
                                .dispatch(&self.handle, event, self.handler.as_ref());
                        if let Err(e) = CURRENT_SESSION.scope(self.generation, dispatch).await {
                            warn!(
                                account_id = %name,
                                update_id = event.update_id,
                                error = %e,
                                "unhandled dispatch error"
                            );
                        }
                    }
                    if !handed_over {
                        self.save_cursor(self.stream.cursor());
                    }
                },
                Err(e) if e.is_conflict() => {
                    error!(
                        account_id = %name,
                        error = %e,
                        "another instance is polling with this token, stopping session"
                    );
                    break;
                },
                Err(e) => {
                    warn!(account_id = %name, error = %e, "polling failed, retrying");
                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(self.retry_delay) => {},
                    }
                },
            }
        }

        info!(account_id = %name, "polling loop stopped");
    }
}
