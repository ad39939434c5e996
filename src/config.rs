use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::calibration::CalibrationMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// プレイヤーの目の高さ (メートル)
    #[serde(default = "default_player_eye_height")]
    pub player_eye_height: f32,
    /// 頭/手の床オフセットと全身トラッカーの床スケーリングを有効にする
    #[serde(default = "default_true")]
    pub floor_height_adjust: bool,
    /// ルーム調整の高さを床として扱う
    #[serde(default)]
    pub move_floor_with_room_adjust: bool,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    #[serde(default)]
    pub automatic_calibration: AutomaticCalibrationConfig,
    /// アバターファイル名ごとの設定
    #[serde(default)]
    pub avatars: BTreeMap<String, AvatarSettings>,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// 平滑化係数 (ティックあたりのブレンド量、0.0..=1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothConfig {
    pub position: f32,
    pub rotation: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    #[serde(default = "default_waist_smoothing")]
    pub waist: SmoothConfig,
    #[serde(default = "default_feet_smoothing")]
    pub feet: SmoothConfig,
}

/// 腰トラッカーの装着位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaistTrackerPosition {
    #[default]
    Front,
    Left,
    Back,
    Right,
}

impl WaistTrackerPosition {
    /// Y軸まわりの回転角 (度)
    pub fn yaw_degrees(self) -> f32 {
        match self {
            WaistTrackerPosition::Front => 0.0,
            WaistTrackerPosition::Left => 90.0,
            WaistTrackerPosition::Back => 180.0,
            WaistTrackerPosition::Right => 270.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomaticCalibrationConfig {
    /// 足トラッカーから足首までの距離
    #[serde(default = "default_leg_offset")]
    pub leg_offset: f32,
    /// 腰トラッカーから骨盤中心までの距離
    #[serde(default = "default_pelvis_offset")]
    pub pelvis_offset: f32,
    #[serde(default)]
    pub waist_tracker_position: WaistTrackerPosition,
    /// 身長に対する目の高さの比 (8頭身モデル)
    #[serde(default = "default_eye_height_ratio")]
    pub eye_height_ratio: f32,
    /// 目の高さに対する骨盤の高さの比
    #[serde(default = "default_pelvis_height_ratio")]
    pub pelvis_height_ratio: f32,
    /// 頭の奥行きぶん基準フレームを後ろへずらす
    #[serde(default)]
    pub compensate_head_depth: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvatarSettings {
    #[serde(default)]
    pub calibration_mode: CalibrationMode,
    /// キャリブレーション無しでも全身トラッキングを使う
    #[serde(default)]
    pub bypass_calibration: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_calibration_data")]
    pub calibration_data: PathBuf,
    #[serde(default = "default_avatars_dir")]
    pub avatars_dir: PathBuf,
}

fn default_player_eye_height() -> f32 { 1.7 }
fn default_true() -> bool { true }
fn default_waist_smoothing() -> SmoothConfig { SmoothConfig { position: 0.5, rotation: 0.35 } }
fn default_feet_smoothing() -> SmoothConfig { SmoothConfig { position: 0.45, rotation: 0.55 } }
fn default_leg_offset() -> f32 { 0.15 }
fn default_pelvis_offset() -> f32 { 0.1 }
fn default_eye_height_ratio() -> f32 { 7.0 / 8.0 }
fn default_pelvis_height_ratio() -> f32 { 4.0 / 7.0 }
fn default_calibration_data() -> PathBuf { PathBuf::from("calibration.dat") }
fn default_avatars_dir() -> PathBuf { PathBuf::from("avatars") }

impl Default for Settings {
    fn default() -> Self {
        Self {
            player_eye_height: default_player_eye_height(),
            floor_height_adjust: true,
            move_floor_with_room_adjust: false,
            smoothing: SmoothingConfig::default(),
            automatic_calibration: AutomaticCalibrationConfig::default(),
            avatars: BTreeMap::new(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            waist: default_waist_smoothing(),
            feet: default_feet_smoothing(),
        }
    }
}

impl Default for AutomaticCalibrationConfig {
    fn default() -> Self {
        Self {
            leg_offset: default_leg_offset(),
            pelvis_offset: default_pelvis_offset(),
            waist_tracker_position: WaistTrackerPosition::default(),
            eye_height_ratio: default_eye_height_ratio(),
            pelvis_height_ratio: default_pelvis_height_ratio(),
            compensate_head_depth: false,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            calibration_data: default_calibration_data(),
            avatars_dir: default_avatars_dir(),
        }
    }
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read settings file")?;
        let mut settings: Settings =
            toml::from_str(&content).context("Failed to parse settings file")?;
        settings.prune_stale_avatars();
        Ok(settings)
    }

    /// 読めなければデフォルト値
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("Settings file {} not found, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings from {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.prune_stale_avatars();
        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, content).context("Failed to write settings file")?;
        Ok(())
    }

    /// 未登録ならデフォルト値
    pub fn avatar(&self, file_name: &str) -> AvatarSettings {
        self.avatars.get(file_name).cloned().unwrap_or_default()
    }

    pub fn avatar_mut(&mut self, file_name: &str) -> &mut AvatarSettings {
        self.avatars.entry(file_name.to_string()).or_default()
    }

    /// アバターファイルが消えたエントリを削除
    pub fn prune_stale_avatars(&mut self) {
        let dir = self.paths.avatars_dir.clone();
        self.avatars.retain(|name, _| {
            let keep = dir.join(name).is_file();
            if !keep {
                warn!("Removing settings for missing avatar {}", name);
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert!((settings.automatic_calibration.leg_offset - 0.15).abs() < 1e-6);
        assert!((settings.automatic_calibration.pelvis_offset - 0.1).abs() < 1e-6);
        assert!(settings.floor_height_adjust);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
player_eye_height = 1.55

[smoothing.waist]
position = 0.2
rotation = 0.3

[automatic_calibration]
waist_tracker_position = "back"

[avatars."Robot.avatar"]
calibration_mode = "automatic"
"#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert!((settings.player_eye_height - 1.55).abs() < 1e-6);
        assert!((settings.smoothing.waist.position - 0.2).abs() < 1e-6);
        assert_eq!(settings.smoothing.feet, default_feet_smoothing());
        assert_eq!(
            settings.automatic_calibration.waist_tracker_position,
            WaistTrackerPosition::Back
        );
        assert_eq!(
            settings.avatar("Robot.avatar").calibration_mode,
            CalibrationMode::Automatic
        );
        assert_eq!(settings.avatar("Other.avatar"), AvatarSettings::default());
    }

    #[test]
    fn test_waist_tracker_yaw() {
        assert_eq!(WaistTrackerPosition::Front.yaw_degrees(), 0.0);
        assert_eq!(WaistTrackerPosition::Left.yaw_degrees(), 90.0);
        assert_eq!(WaistTrackerPosition::Back.yaw_degrees(), 180.0);
        assert_eq!(WaistTrackerPosition::Right.yaw_degrees(), 270.0);
    }

    #[test]
    fn test_prune_stale_avatars() {
        let dir = std::env::temp_dir().join(format!("avatar_tracking_cfg_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Present.avatar"), b"").unwrap();

        let mut settings = Settings::default();
        settings.paths.avatars_dir = dir.clone();
        settings.avatar_mut("Present.avatar").bypass_calibration = true;
        settings.avatar_mut("Gone.avatar").bypass_calibration = true;
        settings.prune_stale_avatars();

        assert!(settings.avatars.contains_key("Present.avatar"));
        assert!(!settings.avatars.contains_key("Gone.avatar"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let settings = Settings::load_or_default("/nonexistent/avatar_tracking/settings.toml");
        assert_eq!(settings, Settings::default());
    }
}
