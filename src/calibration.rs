use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::pose::CalibrationPose;

/// ファイル先頭のシグネチャ
pub const SIGNATURE: [u8; 4] = *b"CAcd";
/// ファイル形式のバージョン
pub const FORMAT_VERSION: u8 = 2;

// --- データ構造 ---

/// どのキャリブレーションを適用するか (アバターごと)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationMode {
    #[default]
    None,
    Manual,
    Automatic,
}

/// 全身トラッカーのキャリブレーション結果
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FullBodyCalibration {
    pub head: CalibrationPose,
    pub waist: CalibrationPose,
    pub left_foot: CalibrationPose,
    pub right_foot: CalibrationPose,
}

impl FullBodyCalibration {
    /// 腰/足のいずれかが identity でなければキャリブレーション済み。
    /// 頭の補正は自動キャリブレーションでほぼ identity になるため判定に含めない
    pub fn is_calibrated(&self) -> bool {
        !self.waist.is_identity()
            || !self.left_foot.is_identity()
            || !self.right_foot.is_identity()
    }

    /// 4つとも identity に戻す
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct CalibrationFile {
    automatic: FullBodyCalibration,
    manual: BTreeMap<String, FullBodyCalibration>,
}

/// 自動キャリブレーション1件 + アバターファイルごとの手動キャリブレーション
#[derive(Debug)]
pub struct CalibrationStore {
    path: PathBuf,
    avatars_dir: PathBuf,
    data: CalibrationFile,
    dirty: bool,
}

impl CalibrationStore {
    /// 空のストア (全て identity)
    pub fn new<P: AsRef<Path>, D: AsRef<Path>>(path: P, avatars_dir: D) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            avatars_dir: avatars_dir.as_ref().to_path_buf(),
            data: CalibrationFile::default(),
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn automatic(&self) -> &FullBodyCalibration {
        &self.data.automatic
    }

    pub fn automatic_mut(&mut self) -> &mut FullBodyCalibration {
        self.dirty = true;
        &mut self.data.automatic
    }

    /// 手動キャリブレーション。未作成なら identity を返す
    pub fn manual(&self, avatar_file: &str) -> FullBodyCalibration {
        self.data.manual.get(avatar_file).copied().unwrap_or_default()
    }

    /// 初回アクセスで identity のエントリを作る
    pub fn manual_mut(&mut self, avatar_file: &str) -> Result<&mut FullBodyCalibration> {
        validate_file_name(avatar_file)?;
        self.dirty = true;
        Ok(self.data.manual.entry(avatar_file.to_string()).or_default())
    }

    pub fn manual_keys(&self) -> impl Iterator<Item = &str> {
        self.data.manual.keys().map(String::as_str)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn load<P: AsRef<Path>, D: AsRef<Path>>(path: P, avatars_dir: D) -> Result<Self> {
        let mut store = Self::new(path, avatars_dir);
        let bytes = fs::read(&store.path).context("Failed to read calibration file")?;
        store.data = decode(&bytes)?;
        store.prune_stale();
        info!(
            "Loaded calibration data from {} ({} manual entries)",
            store.path.display(),
            store.data.manual.len()
        );
        Ok(store)
    }

    /// ファイルが無い/壊れている場合は空のストア
    pub fn load_or_default<P: AsRef<Path>, D: AsRef<Path>>(path: P, avatars_dir: D) -> Self {
        if !path.as_ref().exists() {
            info!("No calibration data at {}", path.as_ref().display());
            return Self::new(path, avatars_dir);
        }
        match Self::load(&path, &avatars_dir) {
            Ok(store) => store,
            Err(e) => {
                warn!(
                    "Failed to load calibration data from {}: {:#}",
                    path.as_ref().display(),
                    e
                );
                Self::new(path, avatars_dir)
            }
        }
    }

    pub fn save(&mut self) -> Result<()> {
        self.prune_stale();
        let bytes = encode(&self.data)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create calibration directory")?;
        }
        fs::write(&self.path, bytes).context("Failed to write calibration file")?;
        self.dirty = false;
        info!("Saved calibration data to {}", self.path.display());
        Ok(())
    }

    /// 変更があるときだけ保存
    pub fn save_if_dirty(&mut self) -> Result<()> {
        if self.dirty {
            self.save()?;
        }
        Ok(())
    }

    /// JSON ダンプ (確認用)
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.data)?)
    }

    /// 不正な名前と、アバターファイルが消えたエントリを削除
    fn prune_stale(&mut self) {
        let dir = &self.avatars_dir;
        self.data.manual.retain(|name, _| {
            if validate_file_name(name).is_err() {
                warn!("Skipping calibration entry with invalid name {:?}", name);
                return false;
            }
            let keep = dir.join(name).is_file();
            if !keep {
                warn!("Removing calibration data for missing avatar {}", name);
            }
            keep
        });
    }
}

// --- Encode / Decode ---

fn encode(data: &CalibrationFile) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(64);
    bytes.extend_from_slice(&SIGNATURE);
    bytes.push(FORMAT_VERSION);
    bytes.extend(bincode::serialize(data).context("Failed to encode calibration data")?);
    Ok(bytes)
}

fn decode(bytes: &[u8]) -> Result<CalibrationFile> {
    if bytes.len() < SIGNATURE.len() + 1 || bytes[..SIGNATURE.len()] != SIGNATURE {
        bail!("Invalid calibration file signature");
    }
    let version = bytes[SIGNATURE.len()];
    if version != FORMAT_VERSION {
        bail!("Unsupported calibration file version: {}", version);
    }
    let data = bincode::deserialize(&bytes[SIGNATURE.len() + 1..])
        .context("Failed to decode calibration data")?;
    Ok(data)
}

/// アバターファイル名 (ディレクトリを含まない名前) の検証
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Avatar file name is empty");
    }
    if name.chars().any(|c| c.is_control() || c == '/' || c == '\\') {
        bail!("Invalid avatar file name: {:?}", name);
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => bail!("Invalid avatar file name: {:?}", name),
    }
}
