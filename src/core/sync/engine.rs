//! The sync engine: owns every camera's connection lifecycle.
//!
//! One attempt task per camera drives the state machine from `Searching`
//! through `Connecting` to `Syncing` and stays alive watching the link.
//! Around the attempt tasks run a handful of background loops: a monitor
//! following the enabled-device list, a periodic reconnect sweep, the
//! location fan-out and the keep-alive resend. Everything stops through
//! CancellationToken plus join, never by dropping tasks on the floor.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::constants::{
    CONNECT_TIMEOUT_SECS, HEALTH_CHECK_INTERVAL_SECS, KEEPALIVE_INTERVAL_SECS, PRESENCE_GRACE_SECS,
};
use crate::core::bluetooth::presence::{PresenceEvent, PresenceSet};
use crate::core::bluetooth::registry::{ActiveLink, ConnectionRegistry};
use crate::core::bluetooth::transport::CameraConnector;
use crate::core::bluetooth::types::DeviceId;
use crate::core::camera::capabilities::CameraVendor;
use crate::core::camera::create_delegate;
use crate::core::location::{LocationFix, TimeZoneSpec};
use crate::core::sync::states::{DeviceState, StateMap, classify_failure};
use crate::error::SyncError;
use crate::firmware::{FirmwareSource, UpdateNotifier, is_newer};
use crate::repository::{Device, DeviceRepository};

/// Timing knobs of the engine. Tests shrink these; production uses the
/// defaults from `constants`.
#[derive(Debug, Clone)]
pub struct SyncTimings {
    /// Upper bound on a whole connection attempt, discovery included.
    pub connect_timeout: Duration,
    /// Interval of the periodic reconnect sweep.
    pub health_check_interval: Duration,
    /// Wait between a camera's advertisement and the connection attempt,
    /// giving the camera time to finish its own startup.
    pub presence_grace: Duration,
    /// Interval of the keep-alive location resend.
    pub keepalive_interval: Duration,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            health_check_interval: Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS),
            presence_grace: Duration::from_secs(PRESENCE_GRACE_SECS),
            keepalive_interval: Duration::from_secs(KEEPALIVE_INTERVAL_SECS),
        }
    }
}

/// Construction options for [`CameraSyncEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Host name pushed to cameras during setup.
    pub display_name: String,
    pub timezone: TimeZoneSpec,
    pub timings: SyncTimings,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            display_name: "camsync".to_string(),
            timezone: TimeZoneSpec::UTC,
            timings: SyncTimings::default(),
        }
    }
}

struct BackgroundTasks {
    cancel: CancellationToken,
    monitor: Option<JoinHandle<()>>,
    health: Option<(CancellationToken, JoinHandle<()>)>,
    fanout: Option<JoinHandle<()>>,
    keepalive: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            monitor: None,
            health: None,
            fanout: None,
            keepalive: None,
        }
    }
}

/// Raises the scanning flag for the duration of a sweep. Dropping lowers
/// it, so a cancelled sweep cannot leave the flag stuck.
struct ScanFlag<'a> {
    tx: &'a watch::Sender<bool>,
}

impl<'a> ScanFlag<'a> {
    fn raise(tx: &'a watch::Sender<bool>) -> Self {
        tx.send_replace(true);
        Self { tx }
    }
}

impl Drop for ScanFlag<'_> {
    fn drop(&mut self) {
        self.tx.send_replace(false);
    }
}

struct EngineInner {
    repository: Arc<dyn DeviceRepository>,
    connector: Arc<dyn CameraConnector>,
    firmware: Arc<dyn FirmwareSource>,
    notifier: Arc<dyn UpdateNotifier>,
    registry: ConnectionRegistry,
    states: StateMap,
    presence: PresenceSet,
    /// Serializes eligibility sweeps. Nothing that joins a task may run
    /// under this lock.
    scan_lock: Mutex<()>,
    scanning_tx: watch::Sender<bool>,
    /// Latest enabled-device list seen by the monitor.
    enabled: StdMutex<Vec<Device>>,
    location_rx: watch::Receiver<Option<LocationFix>>,
    /// Fix most recently delivered to at least one camera, with the
    /// delivery time; feeds the keep-alive resend.
    last_sent: StdMutex<Option<(LocationFix, Instant)>>,
    display_name: String,
    timezone: TimeZoneSpec,
    timings: SyncTimings,
    tasks: Mutex<BackgroundTasks>,
}

/// Handle to the engine. Cheap to clone; all clones drive the same state.
#[derive(Clone)]
pub struct CameraSyncEngine {
    inner: Arc<EngineInner>,
}

impl CameraSyncEngine {
    pub fn new(
        repository: Arc<dyn DeviceRepository>,
        connector: Arc<dyn CameraConnector>,
        firmware: Arc<dyn FirmwareSource>,
        notifier: Arc<dyn UpdateNotifier>,
        location_rx: watch::Receiver<Option<LocationFix>>,
        options: EngineOptions,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                repository,
                connector,
                firmware,
                notifier,
                registry: ConnectionRegistry::new(),
                states: StateMap::new(),
                presence: PresenceSet::new(),
                scan_lock: Mutex::new(()),
                scanning_tx: watch::channel(false).0,
                enabled: StdMutex::new(Vec::new()),
                location_rx,
                last_sent: StdMutex::new(None),
                display_name: options.display_name,
                timezone: options.timezone,
                timings: options.timings,
                tasks: Mutex::new(BackgroundTasks::new()),
            }),
        }
    }

    /// Starts following the enabled-device list. The first non-empty list
    /// triggers a proactive connect pass that ignores presence.
    pub async fn start_background_monitoring(&self, devices: watch::Receiver<Vec<Device>>) {
        let mut tasks = self.inner.tasks.lock().await;
        if tasks.monitor.is_some() {
            warn!("Background monitoring is already running");
            return;
        }
        let cancel = tasks.cancel.clone();
        tasks.monitor = Some(tokio::spawn(monitor_loop(
            self.inner.clone(),
            devices,
            cancel,
        )));
        info!("Background monitoring started");
    }

    /// Stops every background loop, then every camera. Safe to call twice.
    pub async fn stop_all_devices(&self) {
        info!("Stopping all cameras");
        let (monitor, health, fanout, keepalive) = {
            let mut tasks = self.inner.tasks.lock().await;
            tasks.cancel.cancel();
            (
                tasks.monitor.take(),
                tasks.health.take(),
                tasks.fanout.take(),
                tasks.keepalive.take(),
            )
        };
        // join outside the lock; the loops may be mid-arm and need it
        join_background("monitor", monitor).await;
        join_background("health check", health.map(|(_, task)| task)).await;
        join_background("location fan-out", fanout).await;
        join_background("keep-alive", keepalive).await;
        self.inner.tasks.lock().await.cancel = CancellationToken::new();

        self.inner.stop_tracked().await;
        info!("All cameras stopped");
    }

    /// Starts a connection attempt for one camera. A no-op when the camera
    /// is not in an eligible state or an attempt already owns it, so
    /// concurrent callers collapse into a single attempt.
    pub async fn start_device_sync(&self, device: &Device) {
        self.inner.spawn_attempt(device).await;
    }

    /// Cancels and joins the camera's attempt task. By the time this
    /// returns, teardown writes have happened and the registry entry is
    /// gone.
    pub async fn stop_device_sync(&self, id: &DeviceId) {
        self.inner.stop_attempt(id).await;
    }

    /// Forces an eligibility sweep that ignores presence.
    pub async fn refresh_connections(&self) {
        self.inner.check_and_connect(true).await;
    }

    pub async fn handle_presence_event(&self, event: PresenceEvent) {
        match event {
            PresenceEvent::Appeared(id) => {
                if !self.inner.presence.mark_present(&id) {
                    return;
                }
                debug!("Device {} appeared", id);
                let inner = self.inner.clone();
                let grace = self.inner.timings.presence_grace;
                let cancel = self.inner.tasks.lock().await.cancel.clone();
                // cameras need a moment after waking before they accept a
                // connection, so the sweep runs after a grace period
                tokio::spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(grace) => inner.check_and_connect(false).await,
                    }
                });
            }
            PresenceEvent::Disappeared(id) => {
                debug!("Device {} disappeared", id);
                self.inner.presence.mark_absent(&id);
                self.inner.check_and_connect(false).await;
            }
        }
    }

    /// Presence information only gates connects while an observer is
    /// active; turning observation off clears the advertisement set.
    pub fn set_presence_observation_active(&self, active: bool) {
        if active {
            debug!("Presence observation active");
        } else {
            debug!("Presence observation stopped, clearing advertisement set");
            self.inner.presence.clear();
        }
    }

    pub fn device_state(&self, id: &DeviceId) -> DeviceState {
        self.inner.states.get(id)
    }

    /// Watch over the whole state map; every mutation publishes a fresh
    /// snapshot.
    pub fn states(&self) -> watch::Receiver<Arc<HashMap<DeviceId, DeviceState>>> {
        self.inner.states.subscribe()
    }

    pub async fn is_device_connected(&self, id: &DeviceId) -> bool {
        self.inner.registry.is_linked(id).await
    }

    pub async fn connected_device_count(&self) -> usize {
        self.inner.registry.linked_count().await
    }

    pub fn is_scanning(&self) -> bool {
        *self.inner.scanning_tx.borrow()
    }

    pub fn scanning(&self) -> watch::Receiver<bool> {
        self.inner.scanning_tx.subscribe()
    }
}

async fn join_background(label: &str, task: Option<JoinHandle<()>>) {
    if let Some(task) = task {
        match task.await {
            Ok(()) => debug!("{} task finished", label),
            Err(e) if e.is_cancelled() => debug!("{} task was cancelled", label),
            Err(e) => error!("{} task ended with a join error: {:?}", label, e),
        }
    }
}

impl EngineInner {
    fn store_enabled(&self, list: Vec<Device>) {
        *self.enabled.lock().unwrap() = list;
    }

    fn enabled_snapshot(&self) -> Vec<Device> {
        self.enabled.lock().unwrap().clone()
    }

    fn any_eligible_enabled(&self) -> bool {
        self.enabled
            .lock()
            .unwrap()
            .iter()
            .any(|d| self.states.get(&d.id).is_eligible_for_sync())
    }

    /// One eligibility sweep: start attempts for eligible enabled cameras,
    /// then release cameras that dropped off the enabled list.
    async fn check_and_connect(self: &Arc<Self>, ignore_presence: bool) {
        let _guard = self.scan_lock.lock().await;
        let flag = ScanFlag::raise(&self.scanning_tx);

        let enabled = self.enabled_snapshot();
        let enabled_ids: HashSet<DeviceId> = enabled.iter().map(|d| d.id.clone()).collect();
        debug!(
            "Sweeping {} enabled device(s), ignore_presence={}",
            enabled.len(),
            ignore_presence
        );

        let mut to_disconnect = Vec::new();
        for id in self.registry.tracked_ids().await {
            if !enabled_ids.contains(&id) {
                to_disconnect.push(id);
            }
        }

        let mut started = 0usize;
        for device in &enabled {
            if !self.states.get(&device.id).is_eligible_for_sync() {
                continue;
            }
            if !ignore_presence && !self.presence.allows(&device.id) {
                debug!("Device {} is not advertising, skipping", device.id);
                continue;
            }
            if self.spawn_attempt(device).await {
                started += 1;
            }
        }
        if started > 0 {
            info!("Started {} connection attempt(s)", started);
        }

        drop(flag);
        drop(_guard);

        // stopping joins the attempt task; that wait must not happen with
        // the sweep lock held
        for id in to_disconnect {
            info!("Device {} is no longer enabled, releasing", id);
            self.stop_attempt(&id).await;
        }
    }

    /// Reserves the registry slot and spawns the attempt task. Returns
    /// whether an attempt was actually started.
    async fn spawn_attempt(self: &Arc<Self>, device: &Device) -> bool {
        let state = self.states.get(&device.id);
        if !state.is_eligible_for_sync() {
            debug!("Device {} is {:?}, not starting", device.id, state);
            return false;
        }
        let cancel = CancellationToken::new();
        if !self.registry.try_reserve(&device.id, cancel.clone()).await {
            debug!("Device {} already has a connection attempt", device.id);
            return false;
        }
        self.states.set(&device.id, DeviceState::Searching);
        let task = tokio::spawn(run_device_attempt(self.clone(), device.clone(), cancel));
        self.registry.set_task(&device.id, task).await;
        true
    }

    async fn stop_attempt(&self, id: &DeviceId) {
        let Some((cancel, task)) = self.registry.take(id).await else {
            debug!("Device {} has no connection to stop", id);
            return;
        };
        cancel.cancel();
        if let Some(task) = task {
            match task.await {
                Ok(()) => debug!("Attempt task for {} finished", id),
                Err(e) if e.is_cancelled() => debug!("Attempt task for {} was cancelled", id),
                Err(e) => error!("Attempt task for {} ended with a join error: {:?}", id, e),
            }
        }
    }

    async fn stop_tracked(&self) {
        for id in self.registry.tracked_ids().await {
            self.stop_attempt(&id).await;
        }
    }

    async fn arm_health_check(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().await;
        if tasks.health.is_some() || tasks.cancel.is_cancelled() {
            return;
        }
        debug!("Arming periodic reconnect sweep");
        let cancel = tasks.cancel.child_token();
        tasks.health = Some((
            cancel.clone(),
            tokio::spawn(health_loop(self.clone(), cancel)),
        ));
    }

    async fn disarm_health_check(&self) {
        let taken = self.tasks.lock().await.health.take();
        if let Some((cancel, task)) = taken {
            debug!("Disarming periodic reconnect sweep");
            cancel.cancel();
            join_background("health check", Some(task)).await;
        }
    }

    /// Spawns the fan-out and keep-alive loops on first use.
    async fn ensure_sync_tasks(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().await;
        if tasks.cancel.is_cancelled() {
            return;
        }
        if tasks.fanout.is_none() {
            let cancel = tasks.cancel.clone();
            tasks.fanout = Some(tokio::spawn(fanout_loop(
                self.clone(),
                self.location_rx.clone(),
                cancel,
            )));
        }
        if tasks.keepalive.is_none() {
            let cancel = tasks.cancel.clone();
            tasks.keepalive = Some(tokio::spawn(keepalive_loop(self.clone(), cancel)));
        }
    }

    /// Delivers one fix to every linked camera that supports location sync.
    /// A failing camera never affects the others.
    async fn broadcast_location(&self, fix: &LocationFix, keepalive: bool) {
        if !keepalive && !fix.is_fresh(Utc::now()) {
            debug!("Discarding stale location fix from {}", fix.timestamp);
            return;
        }
        let links = self.registry.links().await;
        if links.is_empty() {
            return;
        }

        let mut delivered = 0usize;
        for link in links {
            if !link.delegate.capabilities().location_sync {
                continue;
            }
            match link.delegate.sync_location(fix).await {
                Ok(()) => {
                    delivered += 1;
                    let now = Utc::now();
                    self.states.transform(&link.device_id, |state| match state {
                        DeviceState::Syncing {
                            firmware_version, ..
                        } => Some(DeviceState::Syncing {
                            firmware_version: firmware_version.clone(),
                            last_location_sync: Some(now),
                        }),
                        _ => None,
                    });
                    if let Err(e) = self
                        .repository
                        .update_last_synced_at(&link.device_id, now)
                        .await
                    {
                        warn!("Failed to store sync time for {}: {}", link.device_id, e);
                    }
                }
                Err(e) => warn!("Location sync to {} failed: {}", link.device_id, e),
            }
        }
        if delivered > 0 {
            debug!("Location fanned out to {} camera(s)", delivered);
            *self.last_sent.lock().unwrap() = Some((fix.clone(), Instant::now()));
        }
    }
}

/// Follows the enabled-device list and the global sync switch.
async fn monitor_loop(
    inner: Arc<EngineInner>,
    mut devices_rx: watch::Receiver<Vec<Device>>,
    cancel: CancellationToken,
) {
    let mut sync_enabled_rx = inner.repository.sync_enabled();
    let mut proactive_done = false;

    let initial = devices_rx.borrow_and_update().clone();
    inner.store_enabled(initial.clone());
    if *sync_enabled_rx.borrow_and_update() {
        handle_device_list(&inner, initial, &mut proactive_done).await;
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = devices_rx.changed() => {
                if changed.is_err() {
                    debug!("Device list source dropped, monitor exiting");
                    break;
                }
                let list = devices_rx.borrow_and_update().clone();
                inner.store_enabled(list.clone());
                if *sync_enabled_rx.borrow() {
                    handle_device_list(&inner, list, &mut proactive_done).await;
                }
            }
            changed = sync_enabled_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if *sync_enabled_rx.borrow_and_update() {
                    info!("Sync enabled, sweeping");
                    let list = inner.enabled_snapshot();
                    handle_device_list(&inner, list, &mut proactive_done).await;
                } else {
                    info!("Sync disabled, releasing all cameras");
                    inner.disarm_health_check().await;
                    inner.stop_tracked().await;
                }
            }
        }
    }
}

async fn handle_device_list(
    inner: &Arc<EngineInner>,
    list: Vec<Device>,
    proactive_done: &mut bool,
) {
    if list.is_empty() {
        inner.disarm_health_check().await;
        // the sweep still runs so removed cameras get released
        inner.check_and_connect(false).await;
        return;
    }
    inner.arm_health_check().await;
    let ignore_presence = !*proactive_done;
    *proactive_done = true;
    inner.check_and_connect(ignore_presence).await;
}

/// Periodic reconnect sweep. Runs only while at least one enabled camera
/// is worth another attempt, to keep the radio quiet otherwise.
async fn health_loop(inner: Arc<EngineInner>, cancel: CancellationToken) {
    let interval = inner.timings.health_check_interval;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                if inner.any_eligible_enabled() {
                    debug!("Periodic reconnect sweep");
                    inner.check_and_connect(false).await;
                }
            }
        }
    }
}

/// Fans incoming fixes out to every linked camera.
async fn fanout_loop(
    inner: Arc<EngineInner>,
    mut fixes: watch::Receiver<Option<LocationFix>>,
    cancel: CancellationToken,
) {
    // a fix published before the first camera linked still counts
    let pending = fixes.borrow_and_update().clone();
    if let Some(fix) = pending {
        inner.broadcast_location(&fix, false).await;
    }
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = fixes.changed() => {
                if changed.is_err() {
                    debug!("Location source dropped, fan-out exiting");
                    break;
                }
                let fix = fixes.borrow_and_update().clone();
                if let Some(fix) = fix {
                    inner.broadcast_location(&fix, false).await;
                }
            }
        }
    }
}

/// Re-sends the last delivered fix when the source has gone quiet, so
/// cameras do not drop their GPS state between fixes.
async fn keepalive_loop(inner: Arc<EngineInner>, cancel: CancellationToken) {
    let interval = inner.timings.keepalive_interval;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                let resend = {
                    let last = inner.last_sent.lock().unwrap();
                    match &*last {
                        Some((fix, at)) if at.elapsed() >= interval => {
                            Some(fix.restamped(Utc::now()))
                        }
                        _ => None,
                    }
                };
                if let Some(fix) = resend {
                    debug!("Keep-alive location resend");
                    inner.broadcast_location(&fix, true).await;
                }
            }
        }
    }
}

enum AttemptExit {
    Cancelled,
    LinkLost,
    Timeout,
    Failed(SyncError),
}

/// One camera's connection attempt, from vendor resolution to link loss.
/// Cleanup runs in exactly one place regardless of how the attempt ends.
async fn run_device_attempt(inner: Arc<EngineInner>, device: Device, cancel: CancellationToken) {
    let id = device.id.clone();
    let mut link: Option<ActiveLink> = None;
    let exit = drive_attempt(&inner, &device, &cancel, &mut link).await;

    if let Some(link) = link.take() {
        link.delegate.on_disconnecting().await;
        link.transport.disconnect().await;
    }
    inner.registry.remove(&id).await;

    match exit {
        AttemptExit::Cancelled => {
            info!("Device {} released", id);
            inner.states.set(&id, DeviceState::Disconnected);
        }
        AttemptExit::LinkLost => {
            info!("Device {} link lost", id);
            // only an actively syncing camera falls back to Disconnected;
            // a camera parked in an error state keeps showing it
            inner.states.transform(&id, |state| {
                state.is_syncing().then_some(DeviceState::Disconnected)
            });
        }
        AttemptExit::Timeout => {
            warn!("Device {} connection attempt timed out", id);
            inner.states.set(&id, DeviceState::Unreachable);
        }
        AttemptExit::Failed(err) => {
            warn!("Device {} sync failed: {}", id, err);
            inner.states.set(&id, classify_failure(&err));
        }
    }
}

async fn drive_attempt(
    inner: &Arc<EngineInner>,
    device: &Device,
    cancel: &CancellationToken,
    link_out: &mut Option<ActiveLink>,
) -> AttemptExit {
    let id = &device.id;
    info!("Looking for {} ({})", device.name, id);

    let vendor = match CameraVendor::for_model(&device.model) {
        Some(vendor) if vendor.gatt_map().is_some() => vendor,
        _ => return AttemptExit::Failed(SyncError::UnsupportedVendor(device.model.clone())),
    };

    inner.states.set(id, DeviceState::Connecting);
    let transport = tokio::select! {
        _ = cancel.cancelled() => return AttemptExit::Cancelled,
        result = tokio::time::timeout(inner.timings.connect_timeout, inner.connector.connect(device)) => {
            match result {
                Err(_) => return AttemptExit::Timeout,
                Ok(Err(e)) => return AttemptExit::Failed(e),
                Ok(Ok(transport)) => transport,
            }
        }
    };

    let Some(delegate) = create_delegate(vendor, transport.clone()) else {
        return AttemptExit::Failed(SyncError::UnsupportedVendor(device.model.clone()));
    };
    info!("Connected to {} as a {} body", device.name, vendor.label());

    let active = ActiveLink {
        device_id: id.clone(),
        delegate: delegate.clone(),
        transport: transport.clone(),
    };
    // from here on every exit path tears the link down
    *link_out = Some(active.clone());

    let outcome = delegate.run_setup(&inner.display_name, inner.timezone).await;
    if let Some(version) = &outcome.firmware_version {
        if let Err(e) = inner.repository.update_firmware_version(id, version).await {
            warn!("Failed to store firmware version for {}: {}", id, e);
        }
    }

    inner.registry.attach_link(id, active).await;
    inner.states.set(
        id,
        DeviceState::Syncing {
            firmware_version: outcome.firmware_version.clone(),
            last_location_sync: None,
        },
    );
    inner.ensure_sync_tasks().await;

    // firmware comparison runs off to the side, it must not hold up syncing
    tokio::spawn(check_firmware_update(
        inner.clone(),
        id.clone(),
        outcome.firmware_version,
    ));

    let mut connected = transport.connected();
    loop {
        if !*connected.borrow_and_update() {
            return AttemptExit::LinkLost;
        }
        tokio::select! {
            _ = cancel.cancelled() => return AttemptExit::Cancelled,
            changed = connected.changed() => {
                if changed.is_err() {
                    return AttemptExit::LinkLost;
                }
            }
        }
    }
}

/// Compares the camera's firmware against the catalog and raises a
/// notification once per version.
async fn check_firmware_update(
    inner: Arc<EngineInner>,
    id: DeviceId,
    read_version: Option<String>,
) {
    let Some(device) = inner.repository.device(&id).await else {
        return;
    };
    let Some(current) = read_version.or_else(|| device.firmware_version.clone()) else {
        return;
    };
    let from_source = inner.firmware.latest_version_for(&device.model).await;
    let Some(latest) = from_source.or_else(|| device.latest_firmware_version.clone()) else {
        debug!("No known latest firmware for {}", device.model);
        return;
    };
    if !is_newer(&latest, &current) {
        debug!("Firmware on {} is up to date ({})", device.model, current);
        return;
    }
    if device.update_notification_shown {
        return;
    }
    info!(
        "Firmware {} available for {} (installed {})",
        latest, device.model, current
    );
    inner.notifier.notify_firmware_update(&device, &latest);
    if let Err(e) = inner.repository.set_update_notification_shown(&id, true).await {
        warn!("Failed to record firmware notification for {}: {}", id, e);
    }
}
