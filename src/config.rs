use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use std::{fs, io::Write, path::PathBuf, time::Duration};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Grip thresholds on the averaged wrist->fingertip distance.
/// The gap between them is the dead band.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Thresholds {
    pub open_min: f32,
    pub fist_max: f32,
}

/// Per-channel relaxation coefficients, fraction of remaining distance
/// covered per tick.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Smoothing {
    pub foliage: f32,
    pub ornaments: f32,
    pub gifts: f32,
    pub photos: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Timing {
    pub tick_hz: u32,
}

impl Timing {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz as f64)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub thresholds: Thresholds,
    pub smoothing: Smoothing,
    pub timing: Timing,
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> PathBuf {
    let home = UserDirs::new().unwrap().home_dir().to_path_buf();
    home.join(".config").join("handctl")
}

fn profiles_dir() -> PathBuf {
    config_dir().join("profiles")
}

fn active_ptr_path() -> PathBuf {
    config_dir().join("active")
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir();
        let profdir = profiles_dir();
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path();
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Self::load_profile(&active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = Self::load_profile(&self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.reload()?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(name: &str) -> Result<Profile> {
        let path = profiles_dir().join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        parse_profile(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        serde_json::json!({
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "thresholds": {
                "open_min": self.profile.thresholds.open_min,
                "fist_max": self.profile.thresholds.fist_max,
            },
            "tick_hz": self.profile.timing.tick_hz,
            "hints": {
                "override": "handctl set <0..1> drives the target without a camera",
                "pose_feed": "the vision engine posts {\"op\":\"pose\",...} lines to the socket"
            }
        })
    }
}

fn parse_profile(txt: &str) -> Result<Profile> {
    let profile: Profile = toml::from_str(txt)?;
    validate_profile(&profile)?;
    Ok(profile)
}

fn validate_profile(p: &Profile) -> Result<()> {
    let th = &p.thresholds;
    if !(0.0..=1.0).contains(&th.fist_max) || !(0.0..=1.0).contains(&th.open_min) {
        return Err(anyhow!("thresholds must be in [0,1] normalized units"));
    }
    if th.fist_max >= th.open_min {
        return Err(anyhow!(
            "thresholds.fist_max ({}) must sit below thresholds.open_min ({}); the gap is the dead band",
            th.fist_max,
            th.open_min
        ));
    }

    let k = &p.smoothing;
    for (name, v) in [
        ("foliage", k.foliage),
        ("ornaments", k.ornaments),
        ("gifts", k.gifts),
        ("photos", k.photos),
    ] {
        if !(v > 0.0 && v < 1.0) {
            return Err(anyhow!(
                "smoothing.{name} must be strictly between 0 and 1, got {v}"
            ));
        }
    }

    if p.timing.tick_hz == 0 || p.timing.tick_hz > 240 {
        return Err(anyhow!(
            "timing.tick_hz must be in 1..=240, got {}",
            p.timing.tick_hz
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_parses() {
        let p = parse_profile(default_profile_text()).unwrap();
        assert_eq!(p.thresholds.open_min, 0.35);
        assert_eq!(p.thresholds.fist_max, 0.20);
        assert_eq!(p.smoothing.foliage, 0.10);
        assert_eq!(p.smoothing.ornaments, 0.05);
        assert_eq!(p.smoothing.gifts, 0.02);
        assert_eq!(p.smoothing.photos, 0.06);
        assert_eq!(p.timing.tick_hz, 60);
    }

    #[test]
    fn rejects_inverted_dead_band() {
        let txt = default_profile_text().replace("open_min = 0.35", "open_min = 0.15");
        assert!(parse_profile(&txt).is_err());
    }

    #[test]
    fn rejects_out_of_range_coefficient() {
        let txt = default_profile_text().replace("gifts = 0.02", "gifts = 1.0");
        assert!(parse_profile(&txt).is_err());
    }

    #[test]
    fn rejects_zero_tick_rate() {
        let txt = default_profile_text().replace("tick_hz = 60", "tick_hz = 0");
        assert!(parse_profile(&txt).is_err());
    }

    #[test]
    fn tick_interval_matches_rate() {
        let t = Timing { tick_hz: 60 };
        let ms = t.tick_interval().as_secs_f64() * 1000.0;
        assert!((ms - 16.666).abs() < 0.1);
    }
}
