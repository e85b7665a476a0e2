/// Refresh scheduler: owns the published flood-risk state for one zone.
///
/// ## Phases
///
/// ```text
///   cold ──(cache restored)──> cached ──(live refresh)──> live
///     │                           │                         │
///     └───────────────(went offline)────────────────────────┴──> stale_offline
///                                                                   │
///                         (came online: silent refresh, live on success)
/// ```
///
/// ## Threads
///
/// One event-loop thread owns every state transition. Aggregation and
/// warnings jobs run on a small worker pool and report back through the
/// loop's command channel. Each job carries the epoch it was dispatched
/// with; a completion older than the newest applied full refresh is
/// dropped, so overlapping refreshes resolve in dispatch order, and the
/// published epoch never goes backwards. After `shutdown` the liveness
/// flag is cleared; late completions are discarded by the worker, or by
/// the loop if one was already queued.
///
/// ## Timers
///
/// The first aggregation runs after `startup_delay` regardless of phase.
/// After that, a full refresh runs every `full_refresh` and a warnings-only
/// refresh every `warnings_refresh`. While offline the timers keep ticking
/// but issue no network calls; a manual refresh is always issued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use threadpool::ThreadPool;
use tracing::{debug, info, warn};

use crate::aggregator::fallback::fallback_snapshot;
use crate::aggregator::Aggregator;
use crate::cache::CacheStore;
use crate::config::{ScheduleConfig, ServiceConfig};
use crate::model::{
    CacheEntry, RiskLevel, UnifiedWeatherResult, Warning, WaterLevelEstimate, ZoneRisk,
    SOURCE_DEFAULT,
};

/// Worker threads for refresh jobs. Two overlapping full refreshes plus a
/// warnings refresh is the realistic peak.
const WORKER_THREADS: usize = 4;

const DEGRADED_MESSAGE: &str = "all current-conditions providers failed";

// ---------------------------------------------------------------------------
// Published state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// No data yet; the published state is synthesized defaults.
    Cold,
    /// Serving the last persisted state.
    Cached,
    /// Serving data from a successful refresh.
    Live,
    /// Host reported no connectivity; serving whatever was last known.
    StaleOffline,
}

impl ConnectionPhase {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionPhase::Cold => "cold",
            ConnectionPhase::Cached => "cached",
            ConnectionPhase::Live => "live",
            ConnectionPhase::StaleOffline => "stale_offline",
        }
    }
}

/// Everything a presentation layer needs for one zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedState {
    pub zone_id: String,
    pub phase: ConnectionPhase,
    pub weather: UnifiedWeatherResult,
    pub water_level: WaterLevelEstimate,
    pub zone_risks: Vec<ZoneRisk>,
    /// True while a user-visible refresh is in flight.
    pub loading: bool,
    pub last_error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub offline: bool,
    /// Epoch of the last applied refresh; 0 before any.
    pub epoch: u64,
}

impl PublishedState {
    /// Placeholder published before any data exists: default conditions
    /// scored for every configured zone, so consumers always have a risk.
    fn initial(zone_id: &str, aggregator: &Aggregator) -> Self {
        let now = Utc::now();
        let mut current = fallback_snapshot(now);
        current.source = SOURCE_DEFAULT.to_string();
        let weather = UnifiedWeatherResult {
            current,
            forecast: Vec::new(),
            warnings: Vec::new(),
            zone_id: zone_id.to_string(),
            risk_level: RiskLevel::Low,
            updated_at: now,
            is_fallback: true,
        };
        let zone_risks = aggregator.calculate_zone_risks(&weather).unwrap_or_else(|e| {
            warn!(zone = zone_id, error = %e, "could not score default conditions");
            Vec::new()
        });
        Self {
            zone_id: zone_id.to_string(),
            phase: ConnectionPhase::Cold,
            water_level: aggregator.estimate_water_level(&weather),
            weather,
            zone_risks,
            loading: false,
            last_error: None,
            last_updated: None,
            offline: false,
            epoch: 0,
        }
    }

    fn from_cache(entry: CacheEntry) -> Self {
        Self {
            zone_id: entry.zone_id,
            phase: ConnectionPhase::Cached,
            weather: entry.weather,
            water_level: entry.water_level,
            zone_risks: entry.zone_risks,
            loading: false,
            last_error: None,
            last_updated: Some(entry.captured_at),
            offline: false,
            epoch: 0,
        }
    }

    fn to_cache_entry(&self) -> CacheEntry {
        CacheEntry {
            zone_id: self.zone_id.clone(),
            weather: self.weather.clone(),
            water_level: self.water_level.clone(),
            zone_risks: self.zone_risks.clone(),
            captured_at: self.last_updated.unwrap_or_else(Utc::now),
        }
    }
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timers {
    pub startup_delay: Duration,
    pub full_refresh: Duration,
    pub warnings_refresh: Duration,
}

impl From<&ScheduleConfig> for Timers {
    fn from(schedule: &ScheduleConfig) -> Self {
        Self {
            startup_delay: schedule.startup_delay(),
            full_refresh: schedule.full_refresh_interval(),
            warnings_refresh: schedule.warnings_refresh_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

enum Command {
    Refresh,
    SetOnline(bool),
    Subscribe(Sender<PublishedState>),
    Completed(Completion),
    Shutdown,
}

struct Completion {
    epoch: u64,
    silent: bool,
    outcome: Outcome,
}

enum Outcome {
    Full(Result<FullRefresh, String>),
    Warnings(Result<Vec<Warning>, String>),
}

struct FullRefresh {
    weather: UnifiedWeatherResult,
    water_level: WaterLevelEstimate,
    zone_risks: Vec<ZoneRisk>,
}

fn read_state(state: &RwLock<PublishedState>) -> RwLockReadGuard<'_, PublishedState> {
    state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable access to a running scheduler. Calls after shutdown are
/// ignored.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: Sender<Command>,
    state: Arc<RwLock<PublishedState>>,
    alive: Arc<AtomicBool>,
}

impl SchedulerHandle {
    pub fn snapshot(&self) -> PublishedState {
        read_state(&self.state).clone()
    }

    /// Requests a user-visible full refresh. Issued even while offline.
    pub fn refresh(&self) {
        self.send(Command::Refresh);
    }

    /// Reports host connectivity. Coming back online triggers a silent
    /// refresh.
    pub fn set_online(&self, online: bool) {
        self.send(Command::SetOnline(online));
    }

    /// Channel receiving the current state immediately and every published
    /// state after it. Closed when the scheduler shuts down.
    pub fn subscribe(&self) -> Receiver<PublishedState> {
        let (tx, rx) = mpsc::channel();
        self.send(Command::Subscribe(tx));
        rx
    }

    pub fn is_running(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn send(&self, command: Command) {
        if self.is_running() {
            let _ = self.commands.send(command);
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct RefreshScheduler {
    handle: SchedulerHandle,
    event_loop: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Restores the cached state for `zone_id` and starts the event loop.
    pub fn start(
        config: &ServiceConfig,
        zone_id: &str,
        aggregator: Arc<Aggregator>,
        cache: Box<dyn CacheStore>,
    ) -> Self {
        Self::start_with_timers(Timers::from(&config.schedule), zone_id, aggregator, cache)
    }

    pub fn start_with_timers(
        timers: Timers,
        zone_id: &str,
        aggregator: Arc<Aggregator>,
        mut cache: Box<dyn CacheStore>,
    ) -> Self {
        let initial = match cache.load(zone_id) {
            Ok(Some(entry)) => {
                info!(zone = zone_id, backend = cache.name(), captured_at = %entry.captured_at, "restored cached state");
                PublishedState::from_cache(entry)
            }
            Ok(None) => {
                info!(zone = zone_id, backend = cache.name(), "no cached state; starting cold");
                PublishedState::initial(zone_id, &aggregator)
            }
            Err(e) => {
                warn!(zone = zone_id, error = %e, "cache unreadable; starting cold");
                PublishedState::initial(zone_id, &aggregator)
            }
        };

        let state = Arc::new(RwLock::new(initial));
        let alive = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel();

        let event_loop = EventLoop::new(
            zone_id,
            timers,
            aggregator,
            cache,
            Arc::clone(&state),
            Arc::clone(&alive),
            tx.clone(),
        );
        let thread = thread::spawn(move || event_loop.run(rx));

        Self {
            handle: SchedulerHandle {
                commands: tx,
                state,
                alive,
            },
            event_loop: Some(thread),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn snapshot(&self) -> PublishedState {
        self.handle.snapshot()
    }

    pub fn refresh(&self) {
        self.handle.refresh();
    }

    pub fn set_online(&self, online: bool) {
        self.handle.set_online(online);
    }

    pub fn subscribe(&self) -> Receiver<PublishedState> {
        self.handle.subscribe()
    }

    /// Stops the timers, closes subscriptions and joins the event loop.
    /// Jobs still in flight finish on their worker and are discarded.
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.event_loop.take() {
            self.handle.alive.store(false, Ordering::SeqCst);
            let _ = self.handle.commands.send(Command::Shutdown);
            if thread.join().is_err() {
                warn!("scheduler event loop panicked");
            }
            info!(zone = %self.handle.snapshot().zone_id, "scheduler stopped");
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Runs `job`, turning a panic into an error outcome.
fn guarded<T>(label: &str, job: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|_| Err(format!("{} panicked", label)))
}

fn run_full_refresh(aggregator: &Aggregator, zone_id: &str) -> Result<FullRefresh, String> {
    let weather = aggregator.aggregate(zone_id);
    let zone_risks = aggregator
        .calculate_zone_risks(&weather)
        .map_err(|e| e.to_string())?;
    let water_level = aggregator.estimate_water_level(&weather);
    Ok(FullRefresh {
        weather,
        water_level,
        zone_risks,
    })
}

fn deliver(alive: &AtomicBool, completions: &Sender<Command>, completion: Completion) {
    if alive.load(Ordering::SeqCst) {
        let _ = completions.send(Command::Completed(completion));
    } else {
        debug!(epoch = completion.epoch, "discarding completion after shutdown");
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

struct EventLoop {
    zone_id: String,
    timers: Timers,
    aggregator: Arc<Aggregator>,
    cache: Box<dyn CacheStore>,
    pool: ThreadPool,
    state: Arc<RwLock<PublishedState>>,
    alive: Arc<AtomicBool>,
    completions: Sender<Command>,
    subscribers: Vec<Sender<PublishedState>>,
    next_epoch: u64,
    /// Epoch of the newest applied full refresh.
    applied_epoch: u64,
    /// Epoch of the newest applied warnings refresh.
    warnings_epoch: u64,
    /// User-visible jobs in flight; drives `loading`.
    loud_in_flight: usize,
    /// Pending until the first aggregation has been issued.
    startup_at: Option<Instant>,
    next_full: Instant,
    next_warnings: Instant,
}

impl EventLoop {
    fn new(
        zone_id: &str,
        timers: Timers,
        aggregator: Arc<Aggregator>,
        cache: Box<dyn CacheStore>,
        state: Arc<RwLock<PublishedState>>,
        alive: Arc<AtomicBool>,
        completions: Sender<Command>,
    ) -> Self {
        let now = Instant::now();
        Self {
            zone_id: zone_id.to_string(),
            timers,
            aggregator,
            cache,
            pool: ThreadPool::with_name("floodrisk-refresh".to_string(), WORKER_THREADS),
            state,
            alive,
            completions,
            subscribers: Vec::new(),
            next_epoch: 0,
            applied_epoch: 0,
            warnings_epoch: 0,
            loud_in_flight: 0,
            startup_at: Some(now + timers.startup_delay),
            next_full: now + timers.full_refresh,
            next_warnings: now + timers.warnings_refresh,
        }
    }

    fn run(mut self, commands: Receiver<Command>) {
        debug!(zone = %self.zone_id, "scheduler loop running");
        while self.alive.load(Ordering::SeqCst) && self.step(&commands) {}
        debug!(zone = %self.zone_id, "scheduler loop exited");
    }

    /// Waits for one command or the next timer. Returns false once the loop
    /// should stop.
    fn step(&mut self, commands: &Receiver<Command>) -> bool {
        let wait = self.next_deadline().saturating_duration_since(Instant::now());
        match commands.recv_timeout(wait) {
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => return false,
            // A job may have queued its completion just before shutdown.
            Ok(_) if !self.alive.load(Ordering::SeqCst) => {
                debug!(zone = %self.zone_id, "stopped; dropping queued command");
                return false;
            }
            Ok(command) => self.handle(command),
            Err(RecvTimeoutError::Timeout) => {}
        }
        if self.alive.load(Ordering::SeqCst) {
            self.fire_due_timers();
        }
        true
    }

    fn next_deadline(&self) -> Instant {
        match self.startup_at {
            Some(at) => at,
            None => self.next_full.min(self.next_warnings),
        }
    }

    fn current(&self) -> PublishedState {
        read_state(&self.state).clone()
    }

    fn is_offline(&self) -> bool {
        read_state(&self.state).offline
    }

    fn publish(&mut self, next: PublishedState) {
        {
            let mut guard = self.state.write().unwrap_or_else(|p| p.into_inner());
            if guard.phase != next.phase {
                info!(
                    zone = %self.zone_id,
                    from = guard.phase.label(),
                    to = next.phase.label(),
                    "phase changed"
                );
            }
            *guard = next.clone();
        }
        self.subscribers.retain(|tx| tx.send(next.clone()).is_ok());
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Refresh => self.dispatch_full(false),
            Command::SetOnline(online) => self.set_online(online),
            Command::Subscribe(tx) => {
                if tx.send(self.current()).is_ok() {
                    self.subscribers.push(tx);
                }
            }
            Command::Completed(completion) => self.complete(completion),
            Command::Shutdown => {}
        }
    }

    fn fire_due_timers(&mut self) {
        let now = Instant::now();

        if let Some(at) = self.startup_at {
            if now >= at {
                self.startup_at = None;
                self.next_full = now + self.timers.full_refresh;
                self.next_warnings = now + self.timers.warnings_refresh;
                if self.is_offline() {
                    debug!(zone = %self.zone_id, "offline; skipping startup refresh");
                } else {
                    self.dispatch_full(false);
                }
            }
            return;
        }

        if now >= self.next_full {
            self.next_full = now + self.timers.full_refresh;
            if self.is_offline() {
                debug!(zone = %self.zone_id, "offline; skipping scheduled refresh");
            } else {
                self.dispatch_full(true);
            }
        }
        if now >= self.next_warnings {
            self.next_warnings = now + self.timers.warnings_refresh;
            if self.is_offline() {
                debug!(zone = %self.zone_id, "offline; skipping warnings refresh");
            } else {
                self.dispatch_warnings();
            }
        }
    }

    fn set_online(&mut self, online: bool) {
        let mut next = self.current();
        if next.offline == !online {
            return;
        }
        next.offline = !online;
        if online {
            info!(zone = %self.zone_id, "connectivity restored; refreshing");
            self.publish(next);
            self.dispatch_full(true);
        } else {
            info!(zone = %self.zone_id, "connectivity lost; serving last known state");
            next.phase = ConnectionPhase::StaleOffline;
            self.publish(next);
        }
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn bump_epoch(&mut self) -> u64 {
        self.next_epoch += 1;
        self.next_epoch
    }

    fn dispatch_full(&mut self, silent: bool) {
        let epoch = self.bump_epoch();
        debug!(zone = %self.zone_id, epoch, silent, "dispatching full refresh");
        if !silent {
            self.loud_in_flight += 1;
            let mut next = self.current();
            if !next.loading {
                next.loading = true;
                self.publish(next);
            }
        }

        let aggregator = Arc::clone(&self.aggregator);
        let zone_id = self.zone_id.clone();
        let alive = Arc::clone(&self.alive);
        let completions = self.completions.clone();
        self.pool.execute(move || {
            let outcome = guarded("full refresh", || run_full_refresh(&aggregator, &zone_id));
            deliver(
                &alive,
                &completions,
                Completion {
                    epoch,
                    silent,
                    outcome: Outcome::Full(outcome),
                },
            );
        });
    }

    fn dispatch_warnings(&mut self) {
        let epoch = self.bump_epoch();
        debug!(zone = %self.zone_id, epoch, "dispatching warnings refresh");

        let aggregator = Arc::clone(&self.aggregator);
        let zone_id = self.zone_id.clone();
        let alive = Arc::clone(&self.alive);
        let completions = self.completions.clone();
        self.pool.execute(move || {
            let outcome = guarded("warnings refresh", || {
                aggregator
                    .fetch_zone_warnings(&zone_id)
                    .map_err(|e| e.to_string())
            });
            deliver(
                &alive,
                &completions,
                Completion {
                    epoch,
                    silent: true,
                    outcome: Outcome::Warnings(outcome),
                },
            );
        });
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    fn complete(&mut self, completion: Completion) {
        if !completion.silent {
            self.loud_in_flight = self.loud_in_flight.saturating_sub(1);
        }
        let mut next = self.current();
        next.loading = self.loud_in_flight > 0;

        if completion.epoch <= self.applied_epoch {
            debug!(
                epoch = completion.epoch,
                applied = self.applied_epoch,
                "dropping superseded completion"
            );
            if next != self.current() {
                self.publish(next);
            }
            return;
        }

        match completion.outcome {
            Outcome::Full(Ok(refresh)) => self.apply_full(next, completion.epoch, refresh),
            Outcome::Full(Err(message)) => self.apply_failure(next, message),
            Outcome::Warnings(Ok(warnings)) => self.apply_warnings(next, completion.epoch, warnings),
            Outcome::Warnings(Err(message)) => {
                self.apply_failure(next, format!("warnings refresh failed: {}", message))
            }
        }
    }

    fn apply_full(&mut self, mut next: PublishedState, epoch: u64, mut refresh: FullRefresh) {
        let degraded = refresh.weather.is_fallback;
        if degraded && next.phase != ConnectionPhase::Cold {
            self.apply_failure(next, format!("{}; keeping last known data", DEGRADED_MESSAGE));
            return;
        }

        // Warnings fetched after this refresh was dispatched are newer than its own.
        if self.warnings_epoch > epoch {
            let merged = Aggregator::with_warnings(&refresh.weather, next.weather.warnings.clone())
                .and_then(|weather| {
                    let zone_risks = self.aggregator.calculate_zone_risks(&weather)?;
                    Ok((weather, zone_risks))
                });
            match merged {
                Ok((weather, zone_risks)) => {
                    debug!(zone = %self.zone_id, epoch, warnings_epoch = self.warnings_epoch, "keeping newer warnings");
                    refresh.weather = weather;
                    refresh.zone_risks = zone_risks;
                }
                Err(e) => warn!(zone = %self.zone_id, error = %e, "could not keep newer warnings"),
            }
        }

        self.applied_epoch = epoch;
        next.epoch = next.epoch.max(epoch);
        next.weather = refresh.weather;
        next.water_level = refresh.water_level;
        next.zone_risks = refresh.zone_risks;
        next.last_updated = Some(Utc::now());

        if degraded {
            warn!(zone = %self.zone_id, "no live data yet; publishing fallback conditions");
            next.last_error = Some(format!("{}; showing fallback conditions", DEGRADED_MESSAGE));
        } else {
            next.last_error = None;
            next.phase = if next.offline {
                ConnectionPhase::StaleOffline
            } else {
                ConnectionPhase::Live
            };
            self.persist(&next);
        }
        info!(
            zone = %self.zone_id,
            epoch,
            risk = ?next.weather.risk_level,
            level_m = next.water_level.estimated_level_m,
            "published refresh"
        );
        self.publish(next);
    }

    fn apply_warnings(&mut self, mut next: PublishedState, epoch: u64, warnings: Vec<Warning>) {
        let merged = Aggregator::with_warnings(&next.weather, warnings).and_then(|weather| {
            let zone_risks = self.aggregator.calculate_zone_risks(&weather)?;
            Ok((weather, zone_risks))
        });

        match merged {
            Ok((weather, zone_risks)) => {
                debug!(zone = %self.zone_id, count = weather.warnings.len(), "warnings refreshed");
                self.warnings_epoch = epoch;
                next.epoch = next.epoch.max(epoch);
                next.weather = weather;
                next.zone_risks = zone_risks;
                next.last_updated = Some(Utc::now());
                if !next.weather.is_fallback {
                    self.persist(&next);
                }
                self.publish(next);
            }
            Err(e) => self.apply_failure(next, e.to_string()),
        }
    }

    fn apply_failure(&mut self, mut next: PublishedState, message: String) {
        warn!(zone = %self.zone_id, error = %message, "refresh failed; keeping previous state");
        next.last_error = Some(message);
        self.publish(next);
    }

    fn persist(&mut self, state: &PublishedState) {
        if let Err(e) = self.cache.save(&state.to_cache_entry()) {
            warn!(backend = self.cache.name(), error = %e, "failed to persist state");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
