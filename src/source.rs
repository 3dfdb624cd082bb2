//! Pose delivery: the latest-wins mailbox and the source capability.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::warn;

use crate::landmarks::HandPose;

/// One delivery from the vision engine. `None` means the engine looked
/// and saw no hand, which is itself information (presence drops).
pub type PoseSample = Option<HandPose>;

/// Single-slot mailbox between delivery threads and the control loop.
/// Writers overwrite whatever is pending; the loop drains at most one
/// sample per tick and never waits for one. Under camera-rate delivery
/// against a faster tick this drops nothing; under a slow tick it drops
/// the stale samples, which is the point.
#[derive(Clone, Default)]
pub struct PoseSlot {
    inner: Arc<Mutex<Option<PoseSample>>>,
}

impl PoseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, sample: PoseSample) {
        *self.inner.lock().unwrap() = Some(sample);
    }

    /// Take the pending delivery, if any arrived since the last drain.
    pub fn drain(&self) -> Option<PoseSample> {
        self.inner.lock().unwrap().take()
    }
}

/// A pose-producing capability. Implementations deliver samples into
/// the slot from their own thread; `stop` detaches and is best-effort
/// (the underlying device release may never complete).
pub trait PoseSource: Send {
    fn start(&mut self, slot: PoseSlot) -> Result<()>;
    fn stop(&mut self);
}

/// Stand-in when no vision engine is attached. The pipeline runs in
/// manual-override-only mode; presence simply never rises.
pub struct NullSource;

impl PoseSource for NullSource {
    fn start(&mut self, _slot: PoseSlot) -> Result<()> {
        warn!("no pose engine attached; running in manual-override mode");
        Ok(())
    }

    fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{LANDMARK_COUNT, Landmark};

    fn pose(x: f32) -> HandPose {
        HandPose::new(vec![Landmark::new(x, 0.5); LANDMARK_COUNT]).unwrap()
    }

    #[test]
    fn drain_is_empty_until_published() {
        let slot = PoseSlot::new();
        assert!(slot.drain().is_none());
    }

    #[test]
    fn latest_delivery_wins() {
        let slot = PoseSlot::new();
        slot.publish(Some(pose(0.1)));
        slot.publish(Some(pose(0.9)));
        let sample = slot.drain().expect("a delivery is pending");
        assert_eq!(sample.unwrap().steer_x(), 0.9);
        assert!(slot.drain().is_none());
    }

    #[test]
    fn absence_is_a_delivery() {
        let slot = PoseSlot::new();
        slot.publish(Some(pose(0.5)));
        slot.publish(None);
        let sample = slot.drain().expect("a delivery is pending");
        assert!(sample.is_none());
    }

    #[test]
    fn null_source_starts_and_stops() {
        let mut src = NullSource;
        assert!(src.start(PoseSlot::new()).is_ok());
        src.stop();
        src.stop();
    }
}
