//! The progress filter bank: four channels chasing one target.

use serde::Serialize;

use crate::config::Smoothing;

/// Smoothed per-channel progress, refreshed once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProgressVector {
    pub foliage: f32,
    pub ornaments: f32,
    pub gifts: f32,
    pub photos: f32,
}

#[derive(Debug)]
pub struct FilterBank {
    k: Smoothing,
    v: ProgressVector,
}

impl FilterBank {
    pub fn new(k: Smoothing) -> Self {
        Self {
            k,
            v: ProgressVector::default(),
        }
    }

    pub fn set_coefficients(&mut self, k: Smoothing) {
        self.k = k;
    }

    /// One relaxation step toward `target` on every channel. Runs
    /// unconditionally each tick; a stale target still pulls the
    /// channels the rest of the way in.
    ///
    /// Channels are never clamped. Targets are in [0,1] by contract and
    /// `v + (t - v) * k` with k in (0,1) cannot overshoot a fixed
    /// in-range target, so the channels stay in [0,1] on their own.
    pub fn tick(&mut self, target: f32) -> ProgressVector {
        self.v.foliage += (target - self.v.foliage) * self.k.foliage;
        self.v.ornaments += (target - self.v.ornaments) * self.k.ornaments;
        self.v.gifts += (target - self.v.gifts) * self.k.gifts;
        self.v.photos += (target - self.v.photos) * self.k.photos;
        self.v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_bank() -> FilterBank {
        FilterBank::new(Smoothing {
            foliage: 0.10,
            ornaments: 0.05,
            gifts: 0.02,
            photos: 0.06,
        })
    }

    #[test]
    fn first_tick_applies_each_coefficient_once() {
        let mut bank = default_bank();
        let v = bank.tick(1.0);
        assert_eq!(v.foliage, 0.10);
        assert_eq!(v.ornaments, 0.05);
        assert_eq!(v.gifts, 0.02);
        assert_eq!(v.photos, 0.06);
    }

    #[test]
    fn convergence_is_monotonic() {
        let mut bank = default_bank();
        let target = 1.0;
        let mut prev = ProgressVector::default();
        for _ in 0..60 {
            let v = bank.tick(target);
            assert!((target - v.foliage).abs() < (target - prev.foliage).abs());
            assert!((target - v.ornaments).abs() < (target - prev.ornaments).abs());
            assert!((target - v.gifts).abs() < (target - prev.gifts).abs());
            assert!((target - v.photos).abs() < (target - prev.photos).abs());
            prev = v;
        }
    }

    #[test]
    fn settling_order_holds_every_tick() {
        // foliage leads, then photos, then ornaments, gifts trails
        let mut bank = default_bank();
        let target = 1.0;
        for _ in 0..300 {
            let v = bank.tick(target);
            let d_foliage = (target - v.foliage).abs();
            let d_photos = (target - v.photos).abs();
            let d_ornaments = (target - v.ornaments).abs();
            let d_gifts = (target - v.gifts).abs();
            assert!(d_foliage <= d_photos);
            assert!(d_photos <= d_ornaments);
            assert!(d_ornaments <= d_gifts);
        }
    }

    #[test]
    fn settling_order_holds_downward_too() {
        // ordering is guaranteed from a shared start, so park every
        // channel at the top rail before flipping the target
        let mut bank = default_bank();
        for _ in 0..2000 {
            bank.tick(1.0);
        }
        for _ in 0..300 {
            let v = bank.tick(0.0);
            assert!(v.foliage <= v.photos);
            assert!(v.photos <= v.ornaments);
            assert!(v.ornaments <= v.gifts);
        }
    }

    #[test]
    fn channels_stay_in_range_without_clamping() {
        let mut bank = default_bank();
        for target in [1.0, 0.0, 1.0, 0.3, 0.9, 0.0] {
            for _ in 0..500 {
                let v = bank.tick(target);
                for c in [v.foliage, v.ornaments, v.gifts, v.photos] {
                    assert!((0.0..=1.0).contains(&c));
                }
            }
        }
    }

    #[test]
    fn relaxation_continues_on_unchanged_target() {
        let mut bank = default_bank();
        let a = bank.tick(1.0);
        let b = bank.tick(1.0);
        assert!(b.gifts > a.gifts);
    }
}
