use nalgebra::Vector3;

use super::rig::{active_calibration, calibration_mode, floor_scale, TrackingRig};
use super::smooth::Smoother;
use crate::avatar::AvatarProfile;
use crate::calibration::{CalibrationMode, CalibrationStore};
use crate::config::{Settings, SmoothingConfig};
use crate::device::{DeviceManager, DeviceUse};
use crate::pose::{yaw_degrees, CalibrationPose, Pose};

/// `PoseCorrectionPipeline::update` が参照するサービス
pub struct CorrectionContext<'a> {
    pub devices: &'a DeviceManager,
    pub rig: &'a TrackingRig,
    pub avatar: Option<&'a AvatarProfile>,
    pub settings: &'a Settings,
    pub store: &'a CalibrationStore,
}

/// 頭/手の高さに足す量 (アバターの目の高さ - プレイヤーの目の高さ)
pub fn floor_offset(settings: &Settings, avatar: Option<&AvatarProfile>) -> f32 {
    match avatar {
        Some(avatar) if settings.floor_height_adjust => {
            avatar.scaled_eye_height() - settings.player_eye_height
        }
        _ => 0.0,
    }
}

/// 腰/足を使ってよいか
pub fn should_track_full_body(
    settings: &Settings,
    store: &CalibrationStore,
    avatar: Option<&AvatarProfile>,
) -> bool {
    let Some(avatar) = avatar else {
        return false;
    };
    let avatar_settings = settings.avatar(&avatar.file_name);
    avatar_settings.bypass_calibration
        || match avatar_settings.calibration_mode {
            CalibrationMode::Manual => store.manual(&avatar.file_name).is_calibrated(),
            CalibrationMode::Automatic => store.automatic().is_calibrated(),
            CalibrationMode::None => false,
        }
}

/// デバイスの生ポーズから補正済みポーズを作る
///
/// 頭/手: 床オフセットを足す
/// 腰/足: キャリブレーション補正 → 高さのスケーリング → 平滑化
pub struct PoseCorrectionPipeline {
    poses: [Option<Pose>; 6],
    waist: Smoother,
    left_foot: Smoother,
    right_foot: Smoother,
    player_space: Option<Pose>,
}

impl PoseCorrectionPipeline {
    pub fn new(smoothing: &SmoothingConfig) -> Self {
        Self {
            poses: [None; 6],
            waist: Smoother::from_config(&smoothing.waist),
            left_foot: Smoother::from_config(&smoothing.feet),
            right_foot: Smoother::from_config(&smoothing.feet),
            player_space: None,
        }
    }

    pub fn set_smoothing(&mut self, smoothing: &SmoothingConfig) {
        self.waist.set_factors(&smoothing.waist);
        self.left_foot.set_factors(&smoothing.feet);
        self.right_foot.set_factors(&smoothing.feet);
    }

    /// 頭/手をこのフレーム (アバターのルート) 基準で返す。None ならトラッキング空間のまま
    pub fn set_player_space(&mut self, player_space: Option<Pose>) {
        self.player_space = player_space;
    }

    /// 直近の `update` の結果
    pub fn try_get_pose(&self, device_use: DeviceUse) -> Option<Pose> {
        self.poses[device_use.index()]
    }

    pub fn update(&mut self, ctx: &CorrectionContext<'_>) {
        for device_use in [DeviceUse::Head, DeviceUse::LeftHand, DeviceUse::RightHand] {
            self.poses[device_use.index()] = self.upper_body_pose(device_use, ctx);
        }
        for device_use in [DeviceUse::Waist, DeviceUse::LeftFoot, DeviceUse::RightFoot] {
            let pose = self.full_body_pose(device_use, ctx);
            if pose.is_none() {
                self.smoother(device_use).reset();
            }
            self.poses[device_use.index()] = pose;
        }
    }

    fn upper_body_pose(&self, device_use: DeviceUse, ctx: &CorrectionContext<'_>) -> Option<Pose> {
        let state = ctx.devices.try_get_device_state(device_use)?;
        if !state.is_tracking {
            return None;
        }

        let mut pose = state.pose();
        pose.position.y += floor_offset(ctx.settings, ctx.avatar);

        Some(match &self.player_space {
            Some(space) => space.transform(&pose),
            None => pose,
        })
    }

    fn full_body_pose(
        &mut self,
        device_use: DeviceUse,
        ctx: &CorrectionContext<'_>,
    ) -> Option<Pose> {
        let state = ctx.devices.try_get_device_state(device_use)?;

        if let Some(preview) = calibration_preview(device_use, ctx) {
            self.smoother(device_use).reset();
            return Some(preview);
        }

        if !state.is_tracking || !should_track_full_body(ctx.settings, ctx.store, ctx.avatar) {
            return None;
        }

        let correction = runtime_correction(device_use, ctx);
        let mut pose = state.pose().corrected_by(&correction);
        if let Some(avatar) = ctx.avatar {
            pose.position.y *= floor_scale(ctx.settings, avatar);
        }

        Some(self.smoother(device_use).apply(pose))
    }

    fn smoother(&mut self, device_use: DeviceUse) -> &mut Smoother {
        match device_use {
            DeviceUse::LeftFoot => &mut self.left_foot,
            DeviceUse::RightFoot => &mut self.right_foot,
            _ => &mut self.waist,
        }
    }
}

/// 手動キャリブレーション中は、アバターの骨の位置をそのまま返す
fn calibration_preview(device_use: DeviceUse, ctx: &CorrectionContext<'_>) -> Option<Pose> {
    if ctx.rig.active_calibration_mode() != CalibrationMode::Manual {
        return None;
    }
    let anchors = ctx.avatar?.skeleton.as_ref()?;
    let anchor = match device_use {
        DeviceUse::Waist => &anchors.pelvis,
        DeviceUse::LeftFoot => &anchors.left_foot,
        DeviceUse::RightFoot => &anchors.right_foot,
        _ => return None,
    };
    Some(anchors.origin.inverse_transform(anchor))
}

/// 適用するモードの補正。自動キャリブレーションには装着位置のオフセットを足す
fn runtime_correction(device_use: DeviceUse, ctx: &CorrectionContext<'_>) -> CalibrationPose {
    let mode = calibration_mode(ctx.settings, ctx.avatar);
    let record = active_calibration(mode, ctx.store, ctx.avatar);
    let auto = &ctx.settings.automatic_calibration;

    match (device_use, mode) {
        (DeviceUse::Waist, CalibrationMode::Automatic) => {
            let mut correction = record.waist;
            correction.position -= record.waist.rotation * (Vector3::z() * auto.pelvis_offset);
            correction.rotation *= yaw_degrees(auto.waist_tracker_position.yaw_degrees());
            correction
        }
        (DeviceUse::LeftFoot | DeviceUse::RightFoot, CalibrationMode::Automatic) => {
            let mut correction = if device_use == DeviceUse::LeftFoot {
                record.left_foot
            } else {
                record.right_foot
            };
            correction.position -= Vector3::y() * auto.leg_offset;
            correction
        }
        (DeviceUse::Waist, _) => record.waist,
        (DeviceUse::LeftFoot, _) => record.left_foot,
        (DeviceUse::RightFoot, _) => record.right_foot,
        _ => CalibrationPose::identity(),
    }
}
