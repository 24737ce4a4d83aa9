//! The orchestration state machine.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use coldstart_cloud::{CloudProvider, CreateOptions, Instance, InstanceStatus, RetryPolicy};
use coldstart_rcon::ServerInfo;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::probe::LivenessProbe;
use crate::progress::StartupProgress;
use crate::status::{self, StatusSnapshot};

/// What the target server looks like: lookup name plus everything a
/// creation needs.
#[derive(Debug, Clone)]
pub struct ServerSpec {
    /// Vendor-scoped instance name, the key for all lookups.
    pub name: String,
    /// Vendor machine type / size slug.
    pub machine: String,
    pub region: String,
    /// Snapshot name to create from.
    pub snapshot: String,
    /// SSH key fingerprint, resolved to an id at creation time.
    pub ssh_key_fingerprint: String,
}

/// Timing knobs, shrunk to milliseconds in tests.
#[derive(Debug, Clone)]
pub struct ManagerTuning {
    /// Interval of the periodic idle check.
    pub check_interval: Duration,
    /// Zero observed players for this long triggers teardown.
    pub shutdown_delay: Duration,
    /// Boot readiness budget.
    pub boot_poll: RetryPolicy,
    /// Game readiness budget.
    pub game_poll: RetryPolicy,
    /// Wait between a graceful stop and the destroy call.
    pub stop_grace: Duration,
}

impl Default for ManagerTuning {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5 * 60),
            shutdown_delay: Duration::from_secs(60 * 60),
            boot_poll: RetryPolicy::boot_poll(),
            game_poll: RetryPolicy::game_poll(),
            stop_grace: Duration::from_secs(30),
        }
    }
}

/// Result of a start request, returned to the HTTP layer verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// The server is already active; nothing was done.
    AlreadyRunning,
    /// A sequence is already in flight; the request was deduplicated.
    InStartup,
    /// A power-on sequence was launched.
    Starting,
    /// A creation sequence was launched.
    Creating,
}

/// The single shared orchestrator state.
///
/// An absent `instance` together with an in-flight `startup` means
/// "creation in flight, no confirmed instance yet". `last_info` is
/// overwritten on every successful probe and survives failed ones.
#[derive(Debug)]
pub struct ManagerState {
    pub instance: Option<Instance>,
    pub startup: Option<StartupProgress>,
    pub last_info: Option<ServerInfo>,
    /// When a player was last observed online. Moves forward only on
    /// confirmed player presence (and when a startup completes).
    pub last_player_seen: SystemTime,
}

/// Owns the server lifecycle: creation and start sequences, boot and
/// game readiness polling, the periodic idle check, and teardown.
pub struct Manager {
    provider: Arc<dyn CloudProvider>,
    probe: Arc<dyn LivenessProbe>,
    spec: ServerSpec,
    tuning: ManagerTuning,
    state: Mutex<ManagerState>,
}

impl Manager {
    pub fn new(
        provider: Arc<dyn CloudProvider>,
        probe: Arc<dyn LivenessProbe>,
        spec: ServerSpec,
        tuning: ManagerTuning,
    ) -> Self {
        // Start the idle clock half-expired: a freshly booted control
        // plane facing an empty server reclaims it after half the
        // delay instead of the full one.
        let last_player_seen = SystemTime::now() - tuning.shutdown_delay / 2;
        Self {
            provider,
            probe,
            spec,
            tuning,
            state: Mutex::new(ManagerState {
                instance: None,
                startup: None,
                last_info: None,
                last_player_seen,
            }),
        }
    }

    /// Project the current state for the status endpoint.
    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let state = self.state.lock().await;
        status::project(&state)
    }

    /// Discover pre-existing state at process start.
    ///
    /// When the instance is found already booting, the orchestrator
    /// re-enters readiness polling directly instead of replaying
    /// creation.
    pub async fn bootstrap(self: &Arc<Self>) {
        match self.refresh_instance().await {
            None => info!("no existing instance found at startup"),
            Some(instance) => {
                info!(
                    server = %instance.name,
                    ip = %instance.ip,
                    status = %instance.status,
                    "found an existing instance at startup"
                );

                if instance.status == InstanceStatus::Startup {
                    {
                        let mut state = self.state.lock().await;
                        state.startup = Some(StartupProgress::recovered());
                    }
                    let manager = Arc::clone(self);
                    tokio::spawn(async move {
                        manager.run_startup_poll().await;
                    });
                }
            }
        }
    }

    /// Handle an external start request.
    ///
    /// At most one sequence runs at a time: the progress record is
    /// installed under the state lock before the sequence task is
    /// spawned, so a concurrent request observes it and deduplicates.
    pub async fn request_start(self: &Arc<Self>) -> StartOutcome {
        // Cheap dedupe before touching the network.
        if self.startup_in_flight().await {
            return StartOutcome::InStartup;
        }

        let instance = self.refresh_instance().await;

        let mut state = self.state.lock().await;
        if state.startup.as_ref().is_some_and(|s| s.in_flight()) {
            return StartOutcome::InStartup;
        }

        match instance {
            Some(existing) if existing.status == InstanceStatus::Active => {
                StartOutcome::AlreadyRunning
            }
            Some(existing) if existing.status != InstanceStatus::Destroyed => {
                info!(server = %existing.name, status = %existing.status, "start requested");
                state.startup = Some(StartupProgress::start());
                drop(state);

                let manager = Arc::clone(self);
                tokio::spawn(async move {
                    manager.start_sequence().await;
                });
                StartOutcome::Starting
            }
            _ => {
                info!(server = %self.spec.name, "creation requested");
                state.startup = Some(StartupProgress::create());
                drop(state);

                let manager = Arc::clone(self);
                tokio::spawn(async move {
                    manager.create_sequence().await;
                });
                StartOutcome::Creating
            }
        }
    }

    /// Run the periodic idle check until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.tuning.check_interval, "idle check started");

        loop {
            tokio::select! {
                _ = sleep(self.tuning.check_interval) => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    info!("idle check shutting down");
                    break;
                }
            }
        }
    }

    /// One idle-check cycle.
    ///
    /// Skipped entirely while a startup sequence is in flight or when
    /// no instance exists. A probe failure ends the cycle without
    /// touching the activity clock: it is no evidence of players, but
    /// no evidence of emptiness either.
    pub async fn tick(&self) {
        let (instance, in_flight, last_seen) = {
            let state = self.state.lock().await;
            (
                state.instance.clone(),
                state.startup.as_ref().is_some_and(|s| s.in_flight()),
                state.last_player_seen,
            )
        };

        if in_flight {
            return;
        }
        let Some(instance) = instance else {
            return;
        };

        if instance.status == InstanceStatus::Active {
            match self.probe.status(&instance.ip).await {
                Ok(info) => {
                    let online = info.online;
                    let max = info.max;
                    {
                        let mut state = self.state.lock().await;
                        state.last_info = Some(info);
                        if online > 0 {
                            state.last_player_seen = SystemTime::now();
                        }
                    }
                    if online > 0 {
                        info!(online, max, "players online");
                        return;
                    }
                }
                Err(e) => {
                    warn!(server = %instance.name, error = %e, "liveness probe failed");
                    return;
                }
            }
        }

        let idle = SystemTime::now()
            .duration_since(last_seen)
            .unwrap_or_default();
        if idle >= self.tuning.shutdown_delay {
            self.teardown(idle).await;
        }
    }

    // ── Startup sequences ──────────────────────────────────────────

    /// Full creation: ssh key, snapshot, create, then readiness polls.
    async fn create_sequence(self: Arc<Self>) {
        {
            let state = self.state.lock().await;
            if let Some(existing) = &state.instance
                && existing.status != InstanceStatus::Destroyed
            {
                let message = format!(
                    "won't create a new server: an instance with status {} exists",
                    existing.status
                );
                drop(state);
                self.fail_startup(&message).await;
                return;
            }
        }

        info!(server = %self.spec.name, "starting to create a new server");

        let ssh_key = match self
            .provider
            .lookup_ssh_key(&self.spec.ssh_key_fingerprint)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.fail_startup(&e.to_string()).await;
                return;
            }
        };
        self.advance_startup().await;

        let snapshot = match self.provider.lookup_snapshot(&self.spec.snapshot).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.fail_startup(&e.to_string()).await;
                return;
            }
        };
        self.advance_startup().await;

        info!(
            machine = %self.spec.machine,
            region = %self.spec.region,
            snapshot = %snapshot.name,
            "creating the server"
        );

        let options = CreateOptions {
            name: self.spec.name.clone(),
            snapshot,
            ssh_key,
            machine: self.spec.machine.clone(),
            region: self.spec.region.clone(),
        };
        let instance = match self.provider.create(&options).await {
            Ok(instance) => instance,
            Err(e) => {
                self.fail_startup(&e.to_string()).await;
                return;
            }
        };

        info!(server = %instance.name, ip = %instance.ip, "server created");
        {
            let mut state = self.state.lock().await;
            state.instance = Some(instance);
        }
        self.advance_startup().await;

        self.run_startup_poll().await;
    }

    /// Power-on of an existing, currently off instance.
    async fn start_sequence(self: Arc<Self>) {
        let instance = {
            let state = self.state.lock().await;
            state.instance.clone()
        };

        let instance = match instance {
            None => {
                self.fail_startup("can't start a non-existing server").await;
                return;
            }
            Some(instance) if instance.status != InstanceStatus::Off => {
                let message =
                    format!("can't start a server with status {}", instance.status);
                self.fail_startup(&message).await;
                return;
            }
            Some(instance) => instance,
        };

        if let Err(e) = self.provider.start(&instance).await {
            self.fail_startup(&e.to_string()).await;
            return;
        }
        self.advance_startup().await;

        self.run_startup_poll().await;
    }

    /// Boot readiness then game readiness, both on bounded budgets.
    ///
    /// Covers the tail of both sequences and the restart-recovery
    /// path. Each phase completion advances the progress by one.
    async fn run_startup_poll(self: Arc<Self>) {
        // Phase 1: wait for the vendor to report the instance active.
        let mut booted = None;
        for attempt in 1..=self.tuning.boot_poll.attempts {
            match self.provider.lookup_instance(&self.spec.name).await {
                Ok(instance) if instance.status == InstanceStatus::Active => {
                    booted = Some(instance);
                    break;
                }
                Ok(instance) => {
                    debug!(attempt, status = %instance.status, "server not booted yet");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "boot check failed");
                }
            }
            sleep(self.tuning.boot_poll.delay).await;
        }

        let Some(instance) = booted else {
            let message = format!(
                "server not active after {:?}",
                self.tuning.boot_poll.ceiling()
            );
            self.fail_startup(&message).await;
            return;
        };

        info!(server = %instance.name, ip = %instance.ip, "server is booted, waiting for the game process");
        {
            let mut state = self.state.lock().await;
            state.instance = Some(instance.clone());
        }
        self.advance_startup().await;

        // Phase 2: wait for the game process to answer a probe. The
        // first success ends the loop immediately.
        let mut ready = None;
        for attempt in 1..=self.tuning.game_poll.attempts {
            match self.probe.status(&instance.ip).await {
                Ok(info) => {
                    ready = Some(info);
                    break;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "game process not answering yet");
                }
            }
            sleep(self.tuning.game_poll.delay).await;
        }

        let Some(info) = ready else {
            let message = format!(
                "game process not responding after {:?}",
                self.tuning.game_poll.ceiling()
            );
            self.fail_startup(&message).await;
            return;
        };
        self.advance_startup().await;

        {
            let mut state = self.state.lock().await;
            state.last_info = Some(info);
            state.last_player_seen = SystemTime::now();
            state.startup = None;
        }
        info!(server = %instance.name, "server startup complete");
    }

    // ── Teardown ───────────────────────────────────────────────────

    /// Reclaim the instance after the idle delay expired.
    ///
    /// The actual vendor status is re-fetched first: a boot-poll
    /// timeout can leave a real billable instance behind whose cached
    /// state is stale. A failed destroy is surfaced and retried on the
    /// next tick, never fatal.
    async fn teardown(&self, idle: Duration) {
        info!(idle = ?idle, "idle delay exceeded, reclaiming the server");

        let instance = match self.provider.lookup_instance(&self.spec.name).await {
            Ok(instance) => instance,
            Err(e) if e.is_not_found() => {
                info!("instance already gone");
                self.state.lock().await.instance = None;
                return;
            }
            Err(e) => {
                warn!(error = %e, "couldn't reconcile instance state before teardown");
                return;
            }
        };

        if instance.status == InstanceStatus::Destroyed {
            info!(server = %instance.name, "won't destroy an already destroyed server");
            self.state.lock().await.instance = None;
            return;
        }

        if instance.status == InstanceStatus::Active {
            match self.provider.stop(&instance).await {
                Ok(()) => info!(server = %instance.name, "stopping the server"),
                Err(e) => warn!(server = %instance.name, error = %e, "graceful stop failed"),
            }
            sleep(self.tuning.stop_grace).await;
        }

        match self.provider.destroy(&instance).await {
            Ok(()) => {
                info!(server = %instance.name, "server destroyed");
                self.state.lock().await.instance = None;
            }
            Err(e) => {
                error!(server = %instance.name, error = %e, "couldn't destroy the server, will retry");
                // Cache the status as off so the next tick skips the
                // probe and goes straight back to teardown.
                let mut stale = instance;
                stale.status = InstanceStatus::Off;
                self.state.lock().await.instance = Some(stale);
            }
        }
    }

    // ── Shared state helpers ───────────────────────────────────────

    async fn startup_in_flight(&self) -> bool {
        let state = self.state.lock().await;
        state.startup.as_ref().is_some_and(|s| s.in_flight())
    }

    /// Re-fetch the instance and cache the result.
    ///
    /// A lookup miss or failure clears the cached instance; only the
    /// vendor's answer counts.
    async fn refresh_instance(&self) -> Option<Instance> {
        let fetched = match self.provider.lookup_instance(&self.spec.name).await {
            Ok(instance) => Some(instance),
            Err(e) => {
                if !e.is_not_found() {
                    warn!(error = %e, "instance refresh failed");
                }
                None
            }
        };

        let mut state = self.state.lock().await;
        state.instance = fetched.clone();
        fetched
    }

    async fn advance_startup(&self) {
        let mut state = self.state.lock().await;
        if let Some(startup) = &mut state.startup {
            startup.advance();
        }
    }

    async fn fail_startup(&self, message: &str) {
        error!(error = %message, "server startup failed");
        let mut state = self.state.lock().await;
        if let Some(startup) = &mut state.startup {
            startup.fail();
        }
    }
}
