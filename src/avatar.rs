use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::calibration::validate_file_name;
use crate::pose::Pose;

/// ノードごとのオフセット
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeOffsets {
    #[serde(default)]
    pub head: Pose,
    #[serde(default)]
    pub left_hand: Pose,
    #[serde(default)]
    pub right_hand: Pose,
    #[serde(default)]
    pub pelvis: Pose,
    #[serde(default)]
    pub left_foot: Pose,
    #[serde(default)]
    pub right_foot: Pose,
}

/// アバターの骨のワールド姿勢 (手動キャリブレーションの目標)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkeletonAnchors {
    /// トラッキング原点のワールド姿勢
    #[serde(default)]
    pub origin: Pose,
    pub pelvis: Pose,
    pub left_foot: Pose,
    pub right_foot: Pose,
}

/// 読み込み済みアバターの情報 (読み取り専用)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarProfile {
    /// avatars ディレクトリ内のファイル名。キャリブレーションのキー
    #[serde(skip)]
    pub file_name: String,
    /// 実行時のスケール
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// スケール前の目の高さ
    pub eye_height: f32,
    /// 静的な取り付けオフセット
    #[serde(default)]
    pub rest_offsets: NodeOffsets,
    /// 自動キャリブレーション時に使うオフセット
    #[serde(default)]
    pub calibration_offsets: NodeOffsets,
    #[serde(default)]
    pub skeleton: Option<SkeletonAnchors>,
}

fn default_scale() -> f32 { 1.0 }

impl AvatarProfile {
    pub fn new(file_name: &str, eye_height: f32) -> Self {
        Self {
            file_name: file_name.to_string(),
            scale: 1.0,
            eye_height,
            rest_offsets: NodeOffsets::default(),
            calibration_offsets: NodeOffsets::default(),
            skeleton: None,
        }
    }

    /// TOML 形式のアバター記述を読む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("Avatar path has no file name")?;
        validate_file_name(file_name)?;

        let content = fs::read_to_string(path).context("Failed to read avatar file")?;
        let mut profile: AvatarProfile =
            toml::from_str(&content).context("Failed to parse avatar file")?;
        profile.file_name = file_name.to_string();
        Ok(profile)
    }

    pub fn scaled_eye_height(&self) -> f32 {
        self.eye_height * self.scale
    }
}
