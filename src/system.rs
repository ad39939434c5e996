use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::avatar::{AvatarProfile, SkeletonAnchors};
use crate::calibration::{CalibrationMode, CalibrationStore};
use crate::config::Settings;
use crate::device::{DeviceManager, DeviceProvider, DeviceState, DeviceUse, RoomAdjust};
use crate::events::Event;
use crate::pose::Pose;
use crate::tracker::rig::calibration_mode;
use crate::tracker::{CorrectionContext, PoseCorrectionPipeline, RigContext, TrackingRig};

/// アプリケーションのルート。各サービスを所有し、毎フレーム `tick` で駆動する
///
/// キャリブレーションの保存はアバター切り替えと `shutdown` のときだけ行う。
pub struct TrackingSystem<P: DeviceProvider> {
    provider: P,
    devices: DeviceManager,
    rig: TrackingRig,
    pipeline: PoseCorrectionPipeline,
    settings: Settings,
    settings_path: Option<PathBuf>,
    store: CalibrationStore,
    avatar: Option<AvatarProfile>,
    uptime: f64,
}

impl<P: DeviceProvider> TrackingSystem<P> {
    /// 設定のパスからキャリブレーションを読み込む
    pub fn new(provider: P, settings: Settings) -> Self {
        let store = CalibrationStore::load_or_default(
            &settings.paths.calibration_data,
            &settings.paths.avatars_dir,
        );
        Self::with_store(provider, settings, store)
    }

    pub fn with_store(
        provider: P,
        settings: Settings,
        store: CalibrationStore,
    ) -> Self {
        let pipeline = PoseCorrectionPipeline::new(&settings.smoothing);
        Self {
            provider,
            devices: DeviceManager::new(),
            rig: TrackingRig::new(),
            pipeline,
            settings,
            settings_path: None,
            store,
            avatar: None,
            uptime: 0.0,
        }
    }

    /// `save` で設定もこのパスに書き出す
    pub fn with_settings_path<Q: AsRef<Path>>(mut self, path: Q) -> Self {
        self.settings_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn tick(&mut self, delta_time: f32) {
        self.uptime += f64::from(delta_time);

        if self.devices.tick(&mut self.provider) {
            self.rig.on_devices_changed();
        }

        let mut rig_ctx = RigContext {
            devices: &self.devices,
            avatar: self.avatar.as_ref(),
            settings: &mut self.settings,
            store: &mut self.store,
        };
        self.rig.tick(&mut rig_ctx);

        let ctx = CorrectionContext {
            devices: &self.devices,
            rig: &self.rig,
            avatar: self.avatar.as_ref(),
            settings: &self.settings,
            store: &self.store,
        };
        self.pipeline.update(&ctx);
    }

    /// 補正済みポーズ
    pub fn try_get_pose(&self, device_use: DeviceUse) -> Option<Pose> {
        self.pipeline.try_get_pose(device_use)
    }

    pub fn try_get_device_state(&self, device_use: DeviceUse) -> Option<DeviceState> {
        self.devices.try_get_device_state(device_use)
    }

    pub fn devices_changed(&mut self) -> &mut Event<()> {
        &mut self.devices.devices_changed
    }

    pub fn tracking_changed(&mut self) -> &mut Event<()> {
        &mut self.rig.tracking_changed
    }

    pub fn calibration_mode_changed(&mut self) -> &mut Event<CalibrationMode> {
        &mut self.rig.calibration_mode_changed
    }

    pub fn active_calibration_mode_changed(&mut self) -> &mut Event<CalibrationMode> {
        &mut self.rig.active_calibration_mode_changed
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn rig(&self) -> &TrackingRig {
        &self.rig
    }

    pub fn devices(&self) -> &DeviceManager {
        &self.devices
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn calibration_store(&self) -> &CalibrationStore {
        &self.store
    }

    pub fn avatar(&self) -> Option<&AvatarProfile> {
        self.avatar.as_ref()
    }

    pub fn uptime(&self) -> f64 {
        self.uptime
    }

    /// 設定を変更する。オフセットは次のティックで再計算する
    pub fn update_settings<F: FnOnce(&mut Settings)>(&mut self, f: F) {
        f(&mut self.settings);
        self.pipeline.set_smoothing(&self.settings.smoothing);
        let floor_height = self.floor_height();
        self.rig.set_floor_height(floor_height);
        self.rig.mark_offsets_dirty();
    }

    pub fn calibration_mode(&self) -> CalibrationMode {
        calibration_mode(&self.settings, self.avatar.as_ref())
    }

    pub fn set_calibration_mode(&mut self, mode: CalibrationMode) {
        self.rig
            .set_calibration_mode(mode, &mut self.settings, self.avatar.as_ref());
    }

    pub fn begin_calibration(&mut self, mode: CalibrationMode) {
        self.rig.begin_calibration(mode);
    }

    pub fn end_calibration(&mut self) {
        self.rig.end_calibration();
    }

    pub fn cancel_calibration(&mut self) {
        self.rig.cancel_calibration();
    }

    pub fn clear_calibration_data(&mut self, mode: CalibrationMode) -> Result<()> {
        let mut ctx = RigContext {
            devices: &self.devices,
            avatar: self.avatar.as_ref(),
            settings: &mut self.settings,
            store: &mut self.store,
        };
        self.rig.clear_calibration_data(mode, &mut ctx)
    }

    /// アバターを切り替える。切り替え前に未保存のキャリブレーションを書き出す
    pub fn set_avatar(&mut self, avatar: Option<AvatarProfile>) -> Result<()> {
        self.store.save_if_dirty()?;
        match &avatar {
            Some(a) => info!("Switching to avatar {}", a.file_name),
            None => info!("Unloading avatar"),
        }
        self.avatar = avatar;
        self.rig.on_avatar_changed(&self.settings, self.avatar.as_ref());
        Ok(())
    }

    pub fn set_avatar_scale(&mut self, scale: f32) {
        if let Some(avatar) = self.avatar.as_mut() {
            debug!("Avatar scale changed to {}", scale);
            avatar.scale = scale;
            self.rig.mark_offsets_dirty();
        }
    }

    /// アバターの骨の現在位置 (手動キャリブレーション用)
    pub fn set_skeleton_anchors(&mut self, anchors: Option<SkeletonAnchors>) {
        if let Some(avatar) = self.avatar.as_mut() {
            avatar.skeleton = anchors;
        }
    }

    pub fn set_room_adjust(&mut self, room_adjust: RoomAdjust) {
        self.devices.set_room_adjust(room_adjust);
        let floor_height = self.floor_height();
        self.rig.set_floor_height(floor_height);
        self.rig.mark_offsets_dirty();
    }

    pub fn set_player_space(&mut self, player_space: Option<Pose>) {
        self.pipeline.set_player_space(player_space);
    }

    /// キャリブレーションと設定を書き出す
    pub fn save(&mut self) -> Result<()> {
        self.store.save_if_dirty()?;
        if let Some(path) = &self.settings_path {
            self.settings.save(path).context("Failed to save settings")?;
        }
        Ok(())
    }

    pub fn shutdown(mut self) -> Result<()> {
        info!("Shutting down");
        self.rig.cancel_calibration();
        self.save()
    }

    fn floor_height(&self) -> f32 {
        if self.settings.move_floor_with_room_adjust {
            self.devices.room_adjust().center.y
        } else {
            0.0
        }
    }
}
