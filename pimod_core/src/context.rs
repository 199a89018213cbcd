//! Controller context — process image ownership and synchronization.
//!
//! The `IoContext` owns the shared process image buffer, builds devices
//! and signals from the topology document, and keeps the buffer
//! consistent with the hardware channel: on demand via `sync_in` /
//! `sync_out`, or periodically via the autorefresh thread or the
//! drift-compensated `cycle_loop`.
//!
//! One image lock guards every signal read/write and the whole of each
//! bulk sync, so the two mutation paths never interleave. At most one
//! refresh loop (autorefresh or `cycle_loop`) may be active per context.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pimod_common::channel::HardwareChannel;
use pimod_common::config::{ByteOrder, DeviceConfig, DeviceFilter, RemapTable, Topology};
use pimod_common::consts::{DEFAULT_DEVICE_PATH, SIM_IMAGE_LEN};
use pimod_common::error::CoreError;
use tracing::{error, info, warn};

use crate::channel;
use crate::device::Device;
use crate::registry::SignalRegistry;
use crate::signal::Signal;

/// Construction options for an [`IoContext`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Redirect all hardware access onto an in-memory image.
    pub simulate: bool,
    /// Start the periodic background refresh at construction.
    pub autorefresh: bool,
    /// Refresh period for autorefresh and the default cycle loop.
    pub cycle_time: Duration,
    /// Path of the `piControl` character device.
    pub device_path: PathBuf,
    /// Restrict which topology devices are built.
    pub device_filter: Option<DeviceFilter>,
    /// Replace-I/O table applied after device construction.
    pub remap: Option<RemapTable>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            simulate: false,
            autorefresh: false,
            cycle_time: Duration::from_millis(50),
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            device_filter: None,
            remap: None,
        }
    }
}

/// Timing statistics of the refresh loops.
#[derive(Debug, Default)]
pub struct RefreshStats {
    cycles: AtomicU64,
    deadline_misses: AtomicU64,
    max_cycle_us: AtomicU64,
}

impl RefreshStats {
    /// Account one iteration. Returns whether the deadline was missed.
    fn record(&self, elapsed: Duration, period: Duration) -> bool {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.max_cycle_us
            .fetch_max(elapsed.as_micros() as u64, Ordering::Relaxed);
        let missed = elapsed >= period;
        if missed {
            self.deadline_misses.fetch_add(1, Ordering::Relaxed);
        }
        missed
    }

    /// Number of refresh iterations executed.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Number of iterations whose latency reached or exceeded the period.
    pub fn deadline_misses(&self) -> u64 {
        self.deadline_misses.load(Ordering::Relaxed)
    }

    /// Maximum observed iteration latency in microseconds.
    pub fn max_cycle_us(&self) -> u64 {
        self.max_cycle_us.load(Ordering::Relaxed)
    }
}

/// The controller context.
///
/// Owns the process image, the device list, the signal registry and the
/// hardware channel. All buffer access by application code goes through
/// the signals in [`IoContext::io`]; the raw buffer is never handed out.
pub struct IoContext {
    image: Arc<Mutex<Vec<u8>>>,
    channel: Arc<dyn HardwareChannel>,
    devices: Vec<Device>,
    io: SignalRegistry,
    options: ContextOptions,
    running: Arc<AtomicBool>,
    loop_active: Arc<AtomicBool>,
    stats: Arc<RefreshStats>,
    autorefresh: Option<JoinHandle<()>>,
}

impl IoContext {
    /// Build a context from a topology document.
    ///
    /// The image is sized to the maximum `offset + length` of the
    /// selected devices (at least 4 KiB in simulation); the channel is
    /// opened per `options.simulate`; devices and signals are built; a
    /// configured remap table is applied; autorefresh starts if
    /// requested.
    ///
    /// # Errors
    /// `CoreError::Channel` when the device cannot be opened,
    /// `CoreError::Construction` for bad signal geometry, plus any
    /// remap failure.
    pub fn new(topology: &Topology, options: ContextOptions) -> Result<Self, CoreError> {
        let selected = Self::select_devices(topology, &options);
        let mut image_len = selected
            .iter()
            .map(|d| d.offset + d.length)
            .max()
            .unwrap_or(0);
        if options.simulate {
            image_len = image_len.max(SIM_IMAGE_LEN);
        }
        let image = Arc::new(Mutex::new(vec![0u8; image_len]));
        let chan = channel::open(options.simulate, &image, &options.device_path)?;
        Self::assemble(&selected, options, image, chan)
    }

    /// Build a context over an externally constructed channel.
    ///
    /// Intended for custom backends and tests; the image is sized to the
    /// selected topology only. Simulated contexts should use
    /// [`IoContext::new`], which shares the image with the simulator.
    ///
    /// # Errors
    /// Same construction failures as [`IoContext::new`].
    pub fn with_channel(
        topology: &Topology,
        options: ContextOptions,
        channel: Arc<dyn HardwareChannel>,
    ) -> Result<Self, CoreError> {
        let selected = Self::select_devices(topology, &options);
        let image_len = selected
            .iter()
            .map(|d| d.offset + d.length)
            .max()
            .unwrap_or(0);
        let image = Arc::new(Mutex::new(vec![0u8; image_len]));
        Self::assemble(&selected, options, image, channel)
    }

    fn select_devices<'t>(
        topology: &'t Topology,
        options: &ContextOptions,
    ) -> Vec<&'t DeviceConfig> {
        let filter = options.device_filter.clone().unwrap_or_default();
        topology
            .devices
            .iter()
            .filter(|d| filter.matches(d))
            .collect()
    }

    fn assemble(
        selected: &[&DeviceConfig],
        options: ContextOptions,
        image: Arc<Mutex<Vec<u8>>>,
        channel: Arc<dyn HardwareChannel>,
    ) -> Result<Self, CoreError> {
        let mut io = SignalRegistry::new();
        let mut devices = Vec::with_capacity(selected.len());
        for config in selected {
            devices.push(Device::build(config, &image, &channel, &mut io)?);
        }

        if let Some(table) = &options.remap {
            io.apply_remap(table)?;
        }

        info!(
            devices = devices.len(),
            signals = io.len(),
            image_len = image.lock().expect("process image lock poisoned").len(),
            simulate = channel.is_simulated(),
            "controller context built"
        );

        let mut ctx = Self {
            image,
            channel,
            devices,
            io,
            options,
            running: Arc::new(AtomicBool::new(true)),
            loop_active: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RefreshStats::default()),
            autorefresh: None,
        };
        if ctx.options.autorefresh {
            ctx.start_autorefresh()?;
        }
        Ok(ctx)
    }

    /// The signal registry.
    pub fn io(&self) -> &SignalRegistry {
        &self.io
    }

    /// The built devices, in topology order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Length of the process image in bytes.
    pub fn image_len(&self) -> usize {
        self.image.lock().expect("process image lock poisoned").len()
    }

    /// Timing statistics of the refresh loops.
    pub fn stats(&self) -> &RefreshStats {
        &self.stats
    }

    /// Rebind a configured signal under a new name and packed format.
    ///
    /// # Errors
    /// See [`SignalRegistry::replace`].
    pub fn replace_io(
        &mut self,
        old_name: &str,
        new_name: &str,
        format: &str,
        byte_order: ByteOrder,
    ) -> Result<Arc<Signal>, CoreError> {
        self.io.replace(old_name, new_name, format, byte_order)
    }

    /// Apply a replace-I/O table.
    ///
    /// # Errors
    /// See [`SignalRegistry::apply_remap`].
    pub fn apply_remap(&mut self, table: &RemapTable) -> Result<(), CoreError> {
        self.io.apply_remap(table)
    }

    /// Bulk-read the full process image from the hardware channel.
    ///
    /// No-op for simulated channels, whose buffer already is the image.
    ///
    /// # Errors
    /// `CoreError::Channel` on driver failure; never retried here.
    pub fn sync_in(&self) -> Result<(), CoreError> {
        if self.channel.is_simulated() {
            return Ok(());
        }
        let mut image = self.image.lock().expect("process image lock poisoned");
        self.channel.read_block(&mut image, 0)?;
        Ok(())
    }

    /// Bulk-write the full process image to the hardware channel.
    ///
    /// No-op for simulated channels.
    ///
    /// # Errors
    /// `CoreError::Channel` on driver failure; never retried here.
    pub fn sync_out(&self) -> Result<(), CoreError> {
        if self.channel.is_simulated() {
            return Ok(());
        }
        let image = self.image.lock().expect("process image lock poisoned");
        self.channel.write_block(&image, 0)?;
        Ok(())
    }

    /// Run the cycle loop: `sync_in` → `user_fn` → `sync_out`, then sleep
    /// for the remainder of `period` (drift-compensated; a period shorter
    /// than the iteration latency yields back-to-back iterations counted
    /// as deadline misses).
    ///
    /// The loop terminates at the next iteration boundary after
    /// [`IoContext::stop`]; the final iteration's `sync_out` completes.
    /// A `user_fn` or sync failure terminates the loop and propagates.
    ///
    /// # Errors
    /// `CoreError::Config` when another refresh loop is already active;
    /// otherwise whatever the iteration failed with.
    pub fn cycle_loop<F>(&self, mut user_fn: F, period: Duration) -> Result<(), CoreError>
    where
        F: FnMut(&IoContext) -> Result<(), CoreError>,
    {
        if self.loop_active.swap(true, Ordering::SeqCst) {
            return Err(CoreError::Config(
                "another refresh loop is already active on this context".to_string(),
            ));
        }
        let result = self.run_cycle_loop(&mut user_fn, period);
        self.loop_active.store(false, Ordering::SeqCst);
        result
    }

    fn run_cycle_loop(
        &self,
        user_fn: &mut dyn FnMut(&IoContext) -> Result<(), CoreError>,
        period: Duration,
    ) -> Result<(), CoreError> {
        info!(period_us = period.as_micros() as u64, "cycle loop started");
        while self.running.load(Ordering::SeqCst) {
            let start = Instant::now();
            self.sync_in()?;
            user_fn(self)?;
            self.sync_out()?;
            pace(&self.stats, start, period);
        }
        info!(
            cycles = self.stats.cycles(),
            deadline_misses = self.stats.deadline_misses(),
            "cycle loop stopped"
        );
        Ok(())
    }

    fn start_autorefresh(&mut self) -> Result<(), CoreError> {
        if self.loop_active.swap(true, Ordering::SeqCst) {
            return Err(CoreError::Config(
                "another refresh loop is already active on this context".to_string(),
            ));
        }
        let image = Arc::clone(&self.image);
        let chan = Arc::clone(&self.channel);
        let running = Arc::clone(&self.running);
        let loop_active = Arc::clone(&self.loop_active);
        let stats = Arc::clone(&self.stats);
        let period = self.options.cycle_time;

        let handle = thread::Builder::new()
            .name("pimod-autorefresh".to_string())
            .spawn(move || {
                info!(period_us = period.as_micros() as u64, "autorefresh started");
                while running.load(Ordering::SeqCst) {
                    let start = Instant::now();
                    if !chan.is_simulated() {
                        let mut image =
                            image.lock().expect("process image lock poisoned");
                        if let Err(e) = chan.read_block(&mut image, 0) {
                            error!("autorefresh sync-in failed: {e}");
                            break;
                        }
                        if let Err(e) = chan.write_block(&image, 0) {
                            error!("autorefresh sync-out failed: {e}");
                            break;
                        }
                    }
                    pace(&stats, start, period);
                }
                loop_active.store(false, Ordering::SeqCst);
                info!("autorefresh stopped");
            })
            .map_err(|e| CoreError::Config(format!("could not spawn autorefresh thread: {e}")))?;
        self.autorefresh = Some(handle);
        Ok(())
    }

    /// Request loop shutdown. Takes effect at the next iteration
    /// boundary. Safe to call repeatedly or before any loop started.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("stop requested");
        }
    }

    /// The running flag, for wiring into the host's signal handling.
    /// Storing `false` stops any active loop at its next boundary.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Stop any running loop, join the autorefresh thread and release
    /// the hardware channel. Idempotent.
    ///
    /// # Errors
    /// `CoreError::Channel` when releasing the channel fails.
    pub fn close(&mut self) -> Result<(), CoreError> {
        self.stop();
        if let Some(handle) = self.autorefresh.take() {
            if handle.join().is_err() {
                warn!("autorefresh thread panicked");
            }
        }
        self.channel.close()?;
        info!("controller context closed");
        Ok(())
    }
}

/// Account the finished iteration and sleep out the period remainder.
/// Deadline misses are reported (warn, throttled) rather than absorbed.
fn pace(stats: &RefreshStats, start: Instant, period: Duration) {
    let elapsed = start.elapsed();
    if stats.record(elapsed, period) {
        let misses = stats.deadline_misses();
        if misses <= 10 || misses % 1000 == 0 {
            warn!(
                elapsed_us = elapsed.as_micros() as u64,
                period_us = period.as_micros() as u64,
                misses,
                "refresh deadline missed"
            );
        }
    } else {
        thread::sleep(period - elapsed);
    }
}
