//! End-to-end orchestrator tests against fake cloud and probe
//! implementations. Timing knobs are shrunk to milliseconds so the
//! polling loops run to completion quickly.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use coldstart_cloud::{
    CloudError, CloudProvider, CloudResult, CreateOptions, Instance, InstanceStatus, RetryPolicy,
    Snapshot,
};
use coldstart_manager::{
    LivenessProbe, Manager, ManagerTuning, PublicStatus, ServerSpec, StartOutcome,
};
use coldstart_rcon::{ProbeError, ProbeResult, ServerInfo};
use tokio::time::sleep;

// ── Fakes ──────────────────────────────────────────────────────────

#[derive(Default)]
struct CloudState {
    instance: Option<Instance>,
    /// Lookups a booting instance stays in startup before going active.
    boot_countdown: u32,
    /// Destroy calls that fail before one succeeds.
    destroy_failures: u32,
}

#[derive(Default)]
struct FakeCloud {
    state: Mutex<CloudState>,
    lookups: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    creates: AtomicUsize,
    destroys: AtomicUsize,
}

impl FakeCloud {
    fn with_instance(status: InstanceStatus) -> Self {
        let cloud = Self::default();
        cloud.state.lock().unwrap().instance = Some(Instance {
            name: "game-01".to_string(),
            id: "7".to_string(),
            ip: "203.0.113.9".to_string(),
            status,
            provider: "fake".to_string(),
        });
        cloud
    }

    fn set_boot_countdown(&self, lookups: u32) {
        self.state.lock().unwrap().boot_countdown = lookups;
    }

    fn set_destroy_failures(&self, failures: u32) {
        self.state.lock().unwrap().destroy_failures = failures;
    }
}

#[async_trait]
impl CloudProvider for FakeCloud {
    fn name(&self) -> &str {
        "fake"
    }

    async fn lookup_ssh_key(&self, _fingerprint: &str) -> CloudResult<String> {
        Ok("key-1".to_string())
    }

    async fn lookup_snapshot(&self, name: &str) -> CloudResult<Snapshot> {
        Ok(Snapshot {
            name: name.to_string(),
            id: "snap-9".to_string(),
        })
    }

    async fn lookup_instance(&self, name: &str) -> CloudResult<Instance> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        match &mut state.instance {
            None => Err(CloudError::not_found("server", name)),
            Some(instance) => {
                if instance.status == InstanceStatus::Startup {
                    if state.boot_countdown == 0 {
                        instance.status = InstanceStatus::Active;
                    } else {
                        state.boot_countdown -= 1;
                    }
                }
                Ok(instance.clone())
            }
        }
    }

    async fn start(&self, _instance: &Instance) -> CloudResult<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(instance) = &mut state.instance {
            instance.status = InstanceStatus::Startup;
        }
        Ok(())
    }

    async fn stop(&self, _instance: &Instance) -> CloudResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(instance) = &mut state.instance {
            instance.status = InstanceStatus::Off;
        }
        Ok(())
    }

    async fn create(&self, options: &CreateOptions) -> CloudResult<Instance> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let instance = Instance {
            name: options.name.clone(),
            id: "99".to_string(),
            ip: "203.0.113.10".to_string(),
            status: InstanceStatus::Startup,
            provider: "fake".to_string(),
        };
        self.state.lock().unwrap().instance = Some(instance.clone());
        Ok(instance)
    }

    async fn destroy(&self, instance: &Instance) -> CloudResult<()> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.destroy_failures > 0 {
            state.destroy_failures -= 1;
            return Err(CloudError::DestroyFailed(format!(
                "vendor rejected deletion of {}",
                instance.id
            )));
        }
        state.instance = None;
        Ok(())
    }
}

/// Scripted probe replies; `Copy` so the fallback can repeat forever.
#[derive(Clone, Copy)]
enum Reply {
    Up(u32),
    Down,
}

struct FakeProbe {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: AtomicUsize,
}

impl FakeProbe {
    fn always_up(online: u32) -> Self {
        Self::scripted([], Reply::Up(online))
    }

    fn always_down() -> Self {
        Self::scripted([], Reply::Down)
    }

    fn scripted(replies: impl IntoIterator<Item = Reply>, fallback: Reply) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LivenessProbe for FakeProbe {
    async fn status(&self, _ip: &str) -> ProbeResult<ServerInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        match reply {
            Reply::Up(online) => Ok(ServerInfo {
                name: "Test Server".to_string(),
                online,
                max: 16,
            }),
            Reply::Down => Err(ProbeError::Unreachable("connection refused".to_string())),
        }
    }
}

// ── Harness ────────────────────────────────────────────────────────

fn spec() -> ServerSpec {
    ServerSpec {
        name: "game-01".to_string(),
        machine: "small-2".to_string(),
        region: "fsn1".to_string(),
        snapshot: "game-image".to_string(),
        ssh_key_fingerprint: "aa:bb:cc".to_string(),
    }
}

fn tuning() -> ManagerTuning {
    ManagerTuning {
        check_interval: Duration::from_millis(10),
        shutdown_delay: Duration::from_millis(40),
        boot_poll: RetryPolicy {
            attempts: 5,
            delay: Duration::from_millis(2),
        },
        game_poll: RetryPolicy {
            attempts: 5,
            delay: Duration::from_millis(2),
        },
        stop_grace: Duration::from_millis(1),
    }
}

fn manager(cloud: Arc<FakeCloud>, probe: Arc<FakeProbe>) -> Arc<Manager> {
    Arc::new(Manager::new(cloud, probe, spec(), tuning()))
}

/// Wait for the background sequence to finish, success or error.
async fn await_sequence(manager: &Arc<Manager>) -> PublicStatus {
    for _ in 0..200 {
        let snapshot = manager.status_snapshot().await;
        match snapshot.status {
            PublicStatus::Startup => sleep(Duration::from_millis(2)).await,
            done => return done,
        }
    }
    panic!("startup sequence never settled");
}

// ── Start requests ─────────────────────────────────────────────────

#[tokio::test]
async fn creates_when_no_instance_exists() {
    let cloud = Arc::new(FakeCloud::default());
    let probe = Arc::new(FakeProbe::always_up(0));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));

    assert_eq!(manager.request_start().await, StartOutcome::Creating);
    assert_eq!(await_sequence(&manager).await, PublicStatus::Active);

    assert_eq!(cloud.creates.load(Ordering::SeqCst), 1);
    assert_eq!(cloud.starts.load(Ordering::SeqCst), 0);

    let snapshot = manager.status_snapshot().await;
    assert_eq!(snapshot.ip, "203.0.113.10");
    assert_eq!(snapshot.name, "Test Server");
    assert_eq!(snapshot.progress, 0);
}

#[tokio::test]
async fn powers_on_an_off_instance() {
    let cloud = Arc::new(FakeCloud::with_instance(InstanceStatus::Off));
    let probe = Arc::new(FakeProbe::always_up(0));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));

    assert_eq!(manager.request_start().await, StartOutcome::Starting);
    assert_eq!(await_sequence(&manager).await, PublicStatus::Active);

    assert_eq!(cloud.starts.load(Ordering::SeqCst), 1);
    assert_eq!(cloud.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn active_instance_needs_no_action() {
    let cloud = Arc::new(FakeCloud::with_instance(InstanceStatus::Active));
    let probe = Arc::new(FakeProbe::always_up(0));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));

    assert_eq!(manager.request_start().await, StartOutcome::AlreadyRunning);

    assert_eq!(cloud.starts.load(Ordering::SeqCst), 0);
    assert_eq!(cloud.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn destroyed_instance_triggers_recreation() {
    let cloud = Arc::new(FakeCloud::with_instance(InstanceStatus::Destroyed));
    let probe = Arc::new(FakeProbe::always_up(0));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));

    assert_eq!(manager.request_start().await, StartOutcome::Creating);
}

#[tokio::test]
async fn concurrent_requests_deduplicate() {
    let cloud = Arc::new(FakeCloud::default());
    // Boot takes a while, keeping the first sequence in flight.
    cloud.set_boot_countdown(3);
    let probe = Arc::new(FakeProbe::always_up(0));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));

    assert_eq!(manager.request_start().await, StartOutcome::Creating);
    assert_eq!(manager.request_start().await, StartOutcome::InStartup);
    assert_eq!(manager.request_start().await, StartOutcome::InStartup);

    assert_eq!(await_sequence(&manager).await, PublicStatus::Active);
    assert_eq!(cloud.creates.load(Ordering::SeqCst), 1);
}

// ── Readiness polling ──────────────────────────────────────────────

#[tokio::test]
async fn boot_poll_exhaustion_reports_startup_error() {
    let cloud = Arc::new(FakeCloud::default());
    cloud.set_boot_countdown(u32::MAX);
    let probe = Arc::new(FakeProbe::always_up(0));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));

    assert_eq!(manager.request_start().await, StartOutcome::Creating);
    assert_eq!(await_sequence(&manager).await, PublicStatus::StartupError);

    // The game phase never ran.
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

    let snapshot = manager.status_snapshot().await;
    assert_eq!(snapshot.progress, 3);
    assert_eq!(snapshot.progress_max, 5);
}

#[tokio::test]
async fn game_poll_exhaustion_reports_startup_error() {
    let cloud = Arc::new(FakeCloud::default());
    let probe = Arc::new(FakeProbe::always_down());
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));

    assert_eq!(manager.request_start().await, StartOutcome::Creating);
    assert_eq!(await_sequence(&manager).await, PublicStatus::StartupError);

    assert_eq!(probe.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn game_poll_stops_at_first_success() {
    let cloud = Arc::new(FakeCloud::default());
    let probe = Arc::new(FakeProbe::scripted(
        [Reply::Down, Reply::Down, Reply::Up(0)],
        Reply::Up(0),
    ));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));

    assert_eq!(manager.request_start().await, StartOutcome::Creating);
    assert_eq!(await_sequence(&manager).await, PublicStatus::Active);

    // Two failures, one success, then the loop ends.
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn errored_sequence_allows_a_fresh_request() {
    let cloud = Arc::new(FakeCloud::default());
    let probe = Arc::new(FakeProbe::scripted(
        [Reply::Down, Reply::Down, Reply::Down, Reply::Down, Reply::Down],
        Reply::Up(0),
    ));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));

    assert_eq!(manager.request_start().await, StartOutcome::Creating);
    assert_eq!(await_sequence(&manager).await, PublicStatus::StartupError);

    // The failed creation left an active instance behind, so the retry
    // reports it instead of launching another sequence.
    assert_eq!(manager.request_start().await, StartOutcome::AlreadyRunning);
}

// ── Idle check ─────────────────────────────────────────────────────

#[tokio::test]
async fn idle_server_is_stopped_then_destroyed() {
    let cloud = Arc::new(FakeCloud::with_instance(InstanceStatus::Active));
    let probe = Arc::new(FakeProbe::always_up(0));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));
    manager.bootstrap().await;

    sleep(tuning().shutdown_delay * 2).await;
    manager.tick().await;

    assert_eq!(cloud.stops.load(Ordering::SeqCst), 1);
    assert_eq!(cloud.destroys.load(Ordering::SeqCst), 1);
    assert_eq!(manager.status_snapshot().await.status, PublicStatus::Off);

    // Nothing left to act on.
    manager.tick().await;
    assert_eq!(cloud.destroys.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn player_presence_resets_the_idle_clock() {
    let cloud = Arc::new(FakeCloud::with_instance(InstanceStatus::Active));
    let probe = Arc::new(FakeProbe::scripted([Reply::Up(3)], Reply::Up(0)));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));
    manager.bootstrap().await;

    sleep(tuning().shutdown_delay * 2).await;

    // Players online: clock resets, no teardown.
    manager.tick().await;
    assert_eq!(cloud.destroys.load(Ordering::SeqCst), 0);

    // Immediately after the reset an empty server is not yet idle.
    manager.tick().await;
    assert_eq!(cloud.destroys.load(Ordering::SeqCst), 0);
    assert_eq!(manager.status_snapshot().await.online_player, 0);
}

#[tokio::test]
async fn probe_failure_defers_teardown() {
    let cloud = Arc::new(FakeCloud::with_instance(InstanceStatus::Active));
    let probe = Arc::new(FakeProbe::scripted([Reply::Down], Reply::Up(0)));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));
    manager.bootstrap().await;

    sleep(tuning().shutdown_delay * 2).await;

    // An unreachable probe is not evidence of emptiness.
    manager.tick().await;
    assert_eq!(cloud.destroys.load(Ordering::SeqCst), 0);

    // The next reachable empty tick tears down; the clock was never
    // reset by the failure.
    manager.tick().await;
    assert_eq!(cloud.destroys.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_destroy_is_retried_on_the_next_tick() {
    let cloud = Arc::new(FakeCloud::with_instance(InstanceStatus::Active));
    cloud.set_destroy_failures(1);
    let probe = Arc::new(FakeProbe::always_up(0));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));
    manager.bootstrap().await;

    sleep(tuning().shutdown_delay * 2).await;

    manager.tick().await;
    assert_eq!(cloud.destroys.load(Ordering::SeqCst), 1);
    // The instance reference survives the failure.
    assert_ne!(manager.status_snapshot().await.ip, "");

    manager.tick().await;
    assert_eq!(cloud.destroys.load(Ordering::SeqCst), 2);
    assert_eq!(manager.status_snapshot().await.status, PublicStatus::Off);
}

#[tokio::test]
async fn tick_is_a_noop_during_startup() {
    let cloud = Arc::new(FakeCloud::default());
    cloud.set_boot_countdown(u32::MAX);
    let probe = Arc::new(FakeProbe::always_up(0));

    // A boot poll slow enough to still be in flight when the idle
    // delay has long expired.
    let mut tuning = tuning();
    tuning.boot_poll = RetryPolicy {
        attempts: 4,
        delay: Duration::from_millis(50),
    };
    let manager = Arc::new(Manager::new(
        Arc::clone(&cloud) as Arc<dyn CloudProvider>,
        Arc::clone(&probe) as Arc<dyn LivenessProbe>,
        spec(),
        tuning,
    ));

    assert_eq!(manager.request_start().await, StartOutcome::Creating);

    sleep(Duration::from_millis(80)).await;
    assert_eq!(manager.status_snapshot().await.status, PublicStatus::Startup);

    // The idle delay expired long ago, but an in-flight sequence
    // shields the freshly created instance from teardown.
    manager.tick().await;
    assert_eq!(cloud.destroys.load(Ordering::SeqCst), 0);

    assert_eq!(await_sequence(&manager).await, PublicStatus::StartupError);
}

// ── Bootstrap ──────────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_resumes_a_booting_instance() {
    let cloud = Arc::new(FakeCloud::with_instance(InstanceStatus::Startup));
    cloud.set_boot_countdown(2);
    let probe = Arc::new(FakeProbe::always_up(1));
    let manager = manager(Arc::clone(&cloud), Arc::clone(&probe));

    manager.bootstrap().await;
    assert_eq!(await_sequence(&manager).await, PublicStatus::Active);

    // Recovery polls readiness only; no creation or power-on happened.
    assert_eq!(cloud.creates.load(Ordering::SeqCst), 0);
    assert_eq!(cloud.starts.load(Ordering::SeqCst), 0);
    assert!(probe.calls.load(Ordering::SeqCst) >= 1);
}
