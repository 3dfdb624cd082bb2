//! The control loop: sole owner of the mutable control state.
//!
//! Two cadences meet here. Pose samples arrive at whatever rate the
//! vision engine manages and land in a latest-wins slot; the loop
//! drains at most one per tick. The tick itself runs at a steady
//! profile-set rate, advances the filter bank whether or not anything
//! arrived, and publishes an immutable snapshot for readers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use crate::classifier::GripClassifier;
use crate::config::Profile;
use crate::filter::{FilterBank, ProgressVector};
use crate::rotation::rotation_offset;
use crate::source::{PoseSample, PoseSlot, PoseSource};

/// Coarse regime derived from the target. Display-only, recomputed on
/// read, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusLabel {
    Formed,
    Transitioning,
    Chaos,
}

impl StatusLabel {
    pub fn from_target(target: f32) -> Self {
        if target < 0.1 {
            StatusLabel::Formed
        } else if target > 0.9 {
            StatusLabel::Chaos
        } else {
            StatusLabel::Transitioning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Formed => "FORMED",
            StatusLabel::Transitioning => "TRANSITIONING",
            StatusLabel::Chaos => "CHAOS",
        }
    }
}

/// What readers see, refreshed once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub progress_target: f32,
    pub progress_vector: ProgressVector,
    pub rotation_offset: f32,
    pub hand_active: bool,
    pub status_label: StatusLabel,
}

impl Snapshot {
    fn initial() -> Self {
        Self {
            progress_target: 0.0,
            progress_vector: ProgressVector::default(),
            rotation_offset: 0.0,
            hand_active: false,
            status_label: StatusLabel::Formed,
        }
    }
}

/// Requests marshalled onto the owner thread from IPC handlers and the
/// signal thread. Drained at the top of every tick.
pub enum Command {
    SetTarget(f32),
    Reload(Profile),
}

/// Shared read handle onto the last published snapshot.
#[derive(Clone)]
pub struct Published {
    inner: Arc<Mutex<Snapshot>>,
}

impl Published {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Snapshot::initial())),
        }
    }

    pub fn get(&self) -> Snapshot {
        *self.inner.lock().unwrap()
    }

    fn set(&self, snap: Snapshot) {
        *self.inner.lock().unwrap() = snap;
    }
}

/// All mutable control state, confined to one owner. Kept separate from
/// the thread scaffolding so the scheduling rules stay testable without
/// spinning anything up.
pub struct ControlState {
    classifier: GripClassifier,
    bank: FilterBank,
    target: f32,
    rotation: f32,
    hand_active: bool,
}

impl ControlState {
    pub fn new(profile: &Profile) -> Self {
        Self {
            classifier: GripClassifier::new(profile.thresholds),
            bank: FilterBank::new(profile.smoothing),
            target: 0.0,
            rotation: 0.0,
            hand_active: false,
        }
    }

    /// Fold one pose delivery into the state. Absence only drops the
    /// presence flag; the last target and rotation stand until new
    /// evidence replaces them.
    pub fn apply_sample(&mut self, sample: &PoseSample) {
        match sample {
            None => self.hand_active = false,
            Some(pose) => {
                self.hand_active = true;
                if let Some(t) = self.classifier.classify(pose).target() {
                    self.target = t;
                }
                self.rotation = rotation_offset(pose.steer_x());
            }
        }
    }

    /// Manual override. Last writer wins against the gesture path.
    /// Clamped here because socket clients cannot be trusted to
    /// pre-validate.
    pub fn set_target(&mut self, target: f32) {
        self.target = target.clamp(0.0, 1.0);
    }

    pub fn apply_profile(&mut self, profile: &Profile) {
        self.classifier.set_thresholds(profile.thresholds);
        self.bank.set_coefficients(profile.smoothing);
    }

    /// One scheduling tick: relax every channel toward the target and
    /// produce the snapshot readers will see.
    pub fn tick(&mut self) -> Snapshot {
        let progress = self.bank.tick(self.target);
        Snapshot {
            progress_target: self.target,
            progress_vector: progress,
            rotation_offset: self.rotation,
            hand_active: self.hand_active,
            status_label: StatusLabel::from_target(self.target),
        }
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}

/// The scheduler thread plus its handles. Owns the pose source so stop
/// can detach it.
pub struct ControlLoop {
    commands: Sender<Command>,
    slot: PoseSlot,
    published: Published,
    stopped: Arc<AtomicBool>,
    source: Box<dyn PoseSource>,
    handle: Option<JoinHandle<()>>,
}

impl ControlLoop {
    pub fn start(profile: Profile, mut source: Box<dyn PoseSource>) -> Self {
        let slot = PoseSlot::new();
        if let Err(e) = source.start(slot.clone()) {
            // degraded mode, reported once: override stays available
            warn!("pose source unavailable ({e}); manual override only");
        }

        let (tx, rx) = channel();
        let published = Published::new();
        let stopped = Arc::new(AtomicBool::new(false));

        let state = ControlState::new(&profile);
        let interval = profile.timing.tick_interval();
        let handle = thread::spawn({
            let slot = slot.clone();
            let published = published.clone();
            let stopped = stopped.clone();
            move || run(state, interval, slot, rx, published, stopped)
        });

        info!(
            "control loop running at {} Hz (profile '{}')",
            profile.timing.tick_hz,
            profile.meta.name.as_deref().unwrap_or("unnamed")
        );

        Self {
            commands: tx,
            slot,
            published,
            stopped,
            source,
            handle: Some(handle),
        }
    }

    /// Sender for marshalling requests onto the owner thread.
    pub fn commander(&self) -> Sender<Command> {
        self.commands.clone()
    }

    /// Mailbox the vision engine's deliveries are published into.
    pub fn slot(&self) -> PoseSlot {
        self.slot.clone()
    }

    pub fn published(&self) -> Published {
        self.published.clone()
    }

    /// Halt future ticks and detach the source. Safe to call any number
    /// of times; device release underneath is best-effort.
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.source.stop();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for ControlLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    mut state: ControlState,
    mut interval: Duration,
    slot: PoseSlot,
    rx: Receiver<Command>,
    published: Published,
    stopped: Arc<AtomicBool>,
) {
    let mut last_status = StatusLabel::from_target(state.target());
    while !stopped.load(Ordering::SeqCst) {
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                Command::SetTarget(t) => state.set_target(t),
                Command::Reload(profile) => {
                    interval = profile.timing.tick_interval();
                    state.apply_profile(&profile);
                    info!("control loop picked up new profile settings");
                }
            }
        }

        if let Some(sample) = slot.drain() {
            state.apply_sample(&sample);
        }

        let snap = state.tick();
        if snap.status_label != last_status {
            debug!("status {} -> {}", last_status.as_str(), snap.status_label.as_str());
            last_status = snap.status_label;
        }
        published.set(snap);
        thread::sleep(interval);
    }
}
