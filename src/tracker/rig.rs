use anyhow::{Context, Result};
use log::{info, trace, warn};

use super::calibrator::HumanoidCalibrator;
use crate::avatar::AvatarProfile;
use crate::calibration::{CalibrationMode, CalibrationStore, FullBodyCalibration};
use crate::config::Settings;
use crate::device::{DeviceManager, DeviceUse, Hand};
use crate::events::Event;
use crate::pose::{CalibrationPose, Pose};

/// 両手のトリガーがこの値以上でキャリブレーション実行
pub const TRIGGER_THRESHOLD: f32 = 1.0;

/// トラッキングされる1点
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackedNode {
    /// デバイスのポーズ (トラッキングしていなければ identity)
    pub pose: Pose,
    pub is_tracking: bool,
    /// 適用中のキャリブレーション補正
    pub calibration: CalibrationPose,
    /// IK が読むオフセット (スケール込み)
    pub offset: Pose,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackedNodes {
    pub head: TrackedNode,
    pub left_hand: TrackedNode,
    pub right_hand: TrackedNode,
    pub pelvis: TrackedNode,
    pub left_foot: TrackedNode,
    pub right_foot: TrackedNode,
}

impl TrackedNodes {
    pub fn get(&self, device_use: DeviceUse) -> &TrackedNode {
        match device_use {
            DeviceUse::Head => &self.head,
            DeviceUse::LeftHand => &self.left_hand,
            DeviceUse::RightHand => &self.right_hand,
            DeviceUse::Waist => &self.pelvis,
            DeviceUse::LeftFoot => &self.left_foot,
            DeviceUse::RightFoot => &self.right_foot,
        }
    }

    pub fn get_mut(&mut self, device_use: DeviceUse) -> &mut TrackedNode {
        match device_use {
            DeviceUse::Head => &mut self.head,
            DeviceUse::LeftHand => &mut self.left_hand,
            DeviceUse::RightHand => &mut self.right_hand,
            DeviceUse::Waist => &mut self.pelvis,
            DeviceUse::LeftFoot => &mut self.left_foot,
            DeviceUse::RightFoot => &mut self.right_foot,
        }
    }
}

/// `TrackingRig::tick` が参照するサービス
pub struct RigContext<'a> {
    pub devices: &'a DeviceManager,
    pub avatar: Option<&'a AvatarProfile>,
    pub settings: &'a mut Settings,
    pub store: &'a mut CalibrationStore,
}

/// アバターごとのキャリブレーションモード (アバター無しなら None)
pub fn calibration_mode(settings: &Settings, avatar: Option<&AvatarProfile>) -> CalibrationMode {
    avatar.map_or(CalibrationMode::None, |a| settings.avatar(&a.file_name).calibration_mode)
}

/// モードに応じたキャリブレーション記録
pub fn active_calibration(
    mode: CalibrationMode,
    store: &CalibrationStore,
    avatar: Option<&AvatarProfile>,
) -> FullBodyCalibration {
    match (mode, avatar) {
        (CalibrationMode::Automatic, _) => *store.automatic(),
        (CalibrationMode::Manual, Some(avatar)) => store.manual(&avatar.file_name),
        _ => FullBodyCalibration::default(),
    }
}

/// 全身トラッカーの高さに掛ける倍率 (アバターの目の高さ / プレイヤーの目の高さ)
pub fn floor_scale(settings: &Settings, avatar: &AvatarProfile) -> f32 {
    if !settings.floor_height_adjust || settings.player_eye_height <= f32::EPSILON {
        return 1.0;
    }
    avatar.scaled_eye_height() / settings.player_eye_height
}

/// 毎ティックのノード更新、キャリブレーション状態遷移、オフセット再計算
///
/// `Idle → begin_calibration(mode) → Calibrating(mode) → 両トリガー → 計算 → Idle`
pub struct TrackingRig {
    nodes: TrackedNodes,
    active_calibration_mode: CalibrationMode,
    offsets_dirty: bool,
    full_body_scale: f32,
    tracker_scale: f32,
    floor_height: f32,
    pub tracking_changed: Event<()>,
    pub calibration_mode_changed: Event<CalibrationMode>,
    pub active_calibration_mode_changed: Event<CalibrationMode>,
}

impl TrackingRig {
    pub fn new() -> Self {
        Self {
            nodes: TrackedNodes::default(),
            active_calibration_mode: CalibrationMode::None,
            offsets_dirty: true,
            full_body_scale: 1.0,
            tracker_scale: 1.0,
            floor_height: 0.0,
            tracking_changed: Event::new(),
            calibration_mode_changed: Event::new(),
            active_calibration_mode_changed: Event::new(),
        }
    }

    pub fn nodes(&self) -> &TrackedNodes {
        &self.nodes
    }

    /// キャリブレーション中のモード。待機中は None
    pub fn active_calibration_mode(&self) -> CalibrationMode {
        self.active_calibration_mode
    }

    pub fn is_calibrating(&self) -> bool {
        self.active_calibration_mode != CalibrationMode::None
    }

    /// キャリブレーション中は IK を止める
    pub fn ik_enabled(&self) -> bool {
        !self.is_calibrating()
    }

    pub fn full_body_scale(&self) -> f32 {
        self.full_body_scale
    }

    pub fn tracker_scale(&self) -> f32 {
        self.tracker_scale
    }

    pub fn offsets_dirty(&self) -> bool {
        self.offsets_dirty
    }

    /// 次のティックでオフセットを再計算する
    pub fn mark_offsets_dirty(&mut self) {
        self.offsets_dirty = true;
    }

    /// 床からの頭の高さ
    pub fn eye_height(&self) -> f32 {
        self.nodes.head.pose.position.y - self.floor_height
    }

    /// ルーム調整で動く床の高さ
    pub fn set_floor_height(&mut self, floor_height: f32) {
        if self.floor_height != floor_height {
            self.floor_height = floor_height;
            self.offsets_dirty = true;
        }
    }

    pub fn begin_calibration(&mut self, mode: CalibrationMode) {
        if mode == CalibrationMode::None {
            return;
        }
        info!("Beginning {:?} calibration", mode);
        self.set_active_calibration_mode(mode);
    }

    /// 保存せずに待機状態へ
    pub fn cancel_calibration(&mut self) {
        if self.is_calibrating() {
            info!("Calibration cancelled");
            self.set_active_calibration_mode(CalibrationMode::None);
        }
    }

    pub fn end_calibration(&mut self) {
        self.set_active_calibration_mode(CalibrationMode::None);
        self.offsets_dirty = true;
        self.tracking_changed.emit(&());
    }

    /// デバイスの割り当てが変わった
    pub fn on_devices_changed(&mut self) {
        self.tracking_changed.emit(&());
    }

    /// アバター切り替え。進行中のキャリブレーションは破棄する
    pub fn on_avatar_changed(&mut self, settings: &Settings, avatar: Option<&AvatarProfile>) {
        self.cancel_calibration();
        self.offsets_dirty = true;
        self.calibration_mode_changed
            .emit(&calibration_mode(settings, avatar));
    }

    pub fn set_calibration_mode(
        &mut self,
        mode: CalibrationMode,
        settings: &mut Settings,
        avatar: Option<&AvatarProfile>,
    ) {
        let Some(avatar) = avatar else {
            warn!("No avatar loaded, cannot set calibration mode");
            return;
        };
        settings.avatar_mut(&avatar.file_name).calibration_mode = mode;
        self.offsets_dirty = true;
        self.calibration_mode_changed.emit(&mode);
    }

    /// 全スロットを identity に戻す
    pub fn clear_calibration_data(
        &mut self,
        mode: CalibrationMode,
        ctx: &mut RigContext<'_>,
    ) -> Result<()> {
        match mode {
            CalibrationMode::Automatic => {
                info!("Clearing automatic calibration");
                ctx.store.automatic_mut().clear();
            }
            CalibrationMode::Manual => {
                let Some(avatar) = ctx.avatar else {
                    warn!("No avatar loaded, nothing to clear");
                    return Ok(());
                };
                info!("Clearing manual calibration for {}", avatar.file_name);
                ctx.store
                    .manual_mut(&avatar.file_name)
                    .context("Failed to clear manual calibration")?
                    .clear();
            }
            CalibrationMode::None => return Ok(()),
        }
        self.offsets_dirty = true;
        self.tracking_changed.emit(&());
        Ok(())
    }

    pub fn tick(&mut self, ctx: &mut RigContext<'_>) {
        self.update_nodes(ctx.devices);

        if self.is_calibrating() && triggers_pulled(ctx.devices) {
            let mode = self.active_calibration_mode;
            match self.calibrate(mode, ctx) {
                Ok(true) => {
                    if let Some(avatar) = ctx.avatar {
                        ctx.settings.avatar_mut(&avatar.file_name).calibration_mode = mode;
                        self.calibration_mode_changed.emit(&mode);
                    }
                    self.end_calibration();
                }
                Ok(false) => self.cancel_calibration(),
                Err(e) => {
                    warn!("Calibration failed: {:#}", e);
                    self.cancel_calibration();
                }
            }
        }

        if self.offsets_dirty {
            self.update_offsets(ctx);
        }
    }

    fn update_nodes(&mut self, devices: &DeviceManager) {
        for device_use in DeviceUse::ALL {
            let node = self.nodes.get_mut(device_use);
            match devices.try_get_device_state(device_use) {
                Some(state) if state.is_tracking => {
                    node.pose = state.pose();
                    node.is_tracking = true;
                }
                _ => {
                    node.pose = Pose::identity();
                    node.is_tracking = false;
                }
            }
        }
    }

    /// 実行できなければ false
    fn calibrate(&mut self, mode: CalibrationMode, ctx: &mut RigContext<'_>) -> Result<bool> {
        if !self.nodes.head.is_tracking {
            warn!("Head is not tracking, skipping calibration");
            return Ok(false);
        }

        let eye_height = self.eye_height();
        if ctx.settings.player_eye_height != eye_height {
            ctx.settings.player_eye_height = eye_height;
            self.offsets_dirty = true;
        }

        let calibrator = HumanoidCalibrator::from_config(&ctx.settings.automatic_calibration);
        match mode {
            CalibrationMode::Automatic => {
                *ctx.store.automatic_mut() =
                    calibrator.calibrate_automatic(&self.nodes, eye_height, self.floor_height);
                Ok(true)
            }
            CalibrationMode::Manual => {
                let Some(avatar) = ctx.avatar else {
                    warn!("No avatar loaded, skipping manual calibration");
                    return Ok(false);
                };
                let Some(anchors) = avatar.skeleton.as_ref() else {
                    warn!(
                        "Avatar {} has no skeleton, skipping manual calibration",
                        avatar.file_name
                    );
                    return Ok(false);
                };
                let scale = floor_scale(&*ctx.settings, avatar);
                let calibration = calibrator.calibrate_manual(&self.nodes, anchors, scale);
                *ctx.store.manual_mut(&avatar.file_name)? = calibration;
                Ok(true)
            }
            CalibrationMode::None => Ok(false),
        }
    }

    fn update_offsets(&mut self, ctx: &RigContext<'_>) {
        self.offsets_dirty = false;
        let Some(avatar) = ctx.avatar else {
            trace!("No avatar loaded, resetting offsets");
            self.full_body_scale = 1.0;
            self.tracker_scale = 1.0;
            for device_use in DeviceUse::ALL {
                let node = self.nodes.get_mut(device_use);
                node.offset = Pose::identity();
                node.calibration = CalibrationPose::identity();
            }
            return;
        };
        trace!("Updating offsets");

        let settings = &*ctx.settings;
        let mode = calibration_mode(settings, Some(avatar));
        let manual = ctx.store.manual(&avatar.file_name);
        let automatic = *ctx.store.automatic();

        self.full_body_scale = if settings.player_eye_height > f32::EPSILON {
            avatar.scaled_eye_height() / settings.player_eye_height
        } else {
            1.0
        };
        self.tracker_scale = if self.full_body_scale > f32::EPSILON {
            avatar.scale / self.full_body_scale
        } else {
            avatar.scale
        };

        let rest = &avatar.rest_offsets;
        let hints = &avatar.calibration_offsets;
        let nodes = &mut self.nodes;

        nodes.left_hand.offset = rest.left_hand.scaled(avatar.scale);
        nodes.right_hand.offset = rest.right_hand.scaled(avatar.scale);
        let tracker_scale = self.tracker_scale;
        nodes.head.offset = resolve_offset(
            mode,
            &rest.head,
            &hints.head,
            avatar.scale,
            &manual.head,
            &automatic.head,
        );
        nodes.pelvis.offset = resolve_offset(
            mode,
            &rest.pelvis,
            &hints.pelvis,
            tracker_scale,
            &manual.waist,
            &automatic.waist,
        );
        nodes.left_foot.offset = resolve_offset(
            mode,
            &rest.left_foot,
            &hints.left_foot,
            tracker_scale,
            &manual.left_foot,
            &automatic.left_foot,
        );
        nodes.right_foot.offset = resolve_offset(
            mode,
            &rest.right_foot,
            &hints.right_foot,
            tracker_scale,
            &manual.right_foot,
            &automatic.right_foot,
        );

        let record = active_calibration(mode, &*ctx.store, Some(avatar));
        nodes.head.calibration = record.head;
        nodes.pelvis.calibration = record.waist;
        nodes.left_foot.calibration = record.left_foot;
        nodes.right_foot.calibration = record.right_foot;
    }

    fn set_active_calibration_mode(&mut self, mode: CalibrationMode) {
        if self.active_calibration_mode != mode {
            self.active_calibration_mode = mode;
            self.active_calibration_mode_changed.emit(&mode);
        }
    }
}

impl Default for TrackingRig {
    fn default() -> Self {
        Self::new()
    }
}

fn triggers_pulled(devices: &DeviceManager) -> bool {
    devices.trigger_value(Hand::Left) >= TRIGGER_THRESHOLD
        && devices.trigger_value(Hand::Right) >= TRIGGER_THRESHOLD
}

/// キャリブレーション済みのスロットは静的オフセットを使わない
fn resolve_offset(
    mode: CalibrationMode,
    rest: &Pose,
    hint: &Pose,
    scale: f32,
    manual: &CalibrationPose,
    automatic: &CalibrationPose,
) -> Pose {
    match mode {
        CalibrationMode::Manual if !manual.is_identity() => Pose::identity(),
        CalibrationMode::Automatic if !automatic.is_identity() => hint.scaled(scale),
        _ => rest.scaled(scale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::SkeletonAnchors;
    use crate::device::MockDeviceProvider;
    use crate::pose::yaw_degrees;
    use nalgebra::Vector3;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Fixture {
        provider: MockDeviceProvider,
        devices: DeviceManager,
        settings: Settings,
        store: CalibrationStore,
        avatar: AvatarProfile,
        rig: TrackingRig,
    }

    impl Fixture {
        fn new() -> Self {
            let mut avatar = AvatarProfile::new("Test.avatar", 1.5);
            avatar.rest_offsets.pelvis = Pose::from_position(Vector3::new(0.0, 0.0, 0.1));
            avatar.rest_offsets.left_hand = Pose::from_position(Vector3::new(0.0, 0.0, 0.2));
            avatar.calibration_offsets.pelvis = Pose::from_position(Vector3::new(0.0, 0.05, 0.0));
            avatar.skeleton = Some(SkeletonAnchors {
                origin: Pose::identity(),
                pelvis: Pose::from_position(Vector3::new(0.0, 0.9, 0.0)),
                left_foot: Pose::from_position(Vector3::new(-0.1, 0.05, 0.0)),
                right_foot: Pose::from_position(Vector3::new(0.1, 0.05, 0.0)),
            });
            Self {
                provider: MockDeviceProvider::standing(1.6),
                devices: DeviceManager::new(),
                settings: Settings::default(),
                store: CalibrationStore::new("unused.dat", "unused"),
                avatar,
                rig: TrackingRig::new(),
            }
        }

        fn tick(&mut self) {
            self.devices.tick(&mut self.provider);
            let mut ctx = RigContext {
                devices: &self.devices,
                avatar: Some(&self.avatar),
                settings: &mut self.settings,
                store: &mut self.store,
            };
            self.rig.tick(&mut ctx);
        }

        fn pull_triggers(&mut self, value: f32) {
            self.provider.set_trigger(Hand::Left, Some(value));
            self.provider.set_trigger(Hand::Right, Some(value));
        }
    }

    #[test]
    fn test_nodes_follow_devices() {
        let mut f = Fixture::new();
        f.tick();
        assert!(f.rig.nodes().head.is_tracking);
        assert!((f.rig.eye_height() - 1.6).abs() < 1e-6);

        f.provider.set_tracking("LHR-WAIST", false);
        f.tick();
        assert!(!f.rig.nodes().pelvis.is_tracking);
        assert!(f.rig.nodes().pelvis.pose.is_identity());
    }

    #[test]
    fn test_automatic_calibration_flow() {
        let mut f = Fixture::new();
        let modes = Rc::new(RefCell::new(Vec::new()));
        let m = Rc::clone(&modes);
        f.rig
            .active_calibration_mode_changed
            .subscribe(move |mode| m.borrow_mut().push(*mode));

        f.tick();
        f.rig.begin_calibration(CalibrationMode::Automatic);
        assert!(!f.rig.ik_enabled());

        // 片方だけ、または閾値未満では実行しない
        f.provider.set_trigger(Hand::Left, Some(1.0));
        f.tick();
        f.pull_triggers(0.99);
        f.tick();
        assert!(f.rig.is_calibrating());
        assert!(!f.store.automatic().is_calibrated());

        f.pull_triggers(1.0);
        f.tick();
        assert!(!f.rig.is_calibrating());
        assert!(f.rig.ik_enabled());
        assert!(f.store.automatic().is_calibrated());
        assert!(f.store.is_dirty());
        assert_eq!(f.settings.avatar("Test.avatar").calibration_mode, CalibrationMode::Automatic);
        assert!((f.settings.player_eye_height - 1.6).abs() < 1e-6);
        assert_eq!(
            *modes.borrow(),
            vec![CalibrationMode::Automatic, CalibrationMode::None]
        );
    }

    #[test]
    fn test_cancel_does_not_persist() {
        let mut f = Fixture::new();
        f.tick();
        f.rig.begin_calibration(CalibrationMode::Automatic);
        f.rig.cancel_calibration();
        f.pull_triggers(1.0);
        f.tick();
        assert!(!f.rig.is_calibrating());
        assert!(!f.store.automatic().is_calibrated());
        assert!(!f.store.is_dirty());
    }

    #[test]
    fn test_begin_with_none_is_ignored() {
        let mut f = Fixture::new();
        f.rig.begin_calibration(CalibrationMode::None);
        assert!(!f.rig.is_calibrating());
    }

    #[test]
    fn test_manual_calibration_without_skeleton_is_noop() {
        let mut f = Fixture::new();
        f.avatar.skeleton = None;
        f.tick();
        f.rig.begin_calibration(CalibrationMode::Manual);
        f.pull_triggers(1.0);
        f.tick();
        assert!(!f.rig.is_calibrating());
        assert!(!f.store.manual("Test.avatar").is_calibrated());
        assert_eq!(f.settings.avatar("Test.avatar").calibration_mode, CalibrationMode::None);
    }

    #[test]
    fn test_manual_calibration_replaces_avatar_record() {
        let mut f = Fixture::new();
        f.tick();
        f.rig.begin_calibration(CalibrationMode::Manual);
        f.pull_triggers(1.0);
        f.tick();

        let manual = f.store.manual("Test.avatar");
        assert!(manual.is_calibrated());
        assert!(!f.store.automatic().is_calibrated());
        assert_eq!(f.settings.avatar("Test.avatar").calibration_mode, CalibrationMode::Manual);
        assert_eq!(f.rig.nodes().pelvis.calibration, manual.waist);
    }

    #[test]
    fn test_offsets_and_scales() {
        let mut f = Fixture::new();
        f.avatar.scale = 1.2;
        f.settings.player_eye_height = 1.6;
        f.tick();

        // 1.5 * 1.2 / 1.6
        assert!((f.rig.full_body_scale() - 1.125).abs() < 1e-5);
        assert!((f.rig.tracker_scale() - 1.2 / 1.125).abs() < 1e-5);
        let pelvis = f.rig.nodes().pelvis.offset;
        assert!((pelvis.position.z - 0.1 * 1.2 / 1.125).abs() < 1e-5);
        let hand = f.rig.nodes().left_hand.offset;
        assert!((hand.position.z - 0.2 * 1.2).abs() < 1e-5);
    }

    #[test]
    fn test_offset_resolution_per_mode() {
        let rest = Pose::from_position(Vector3::new(0.0, 0.0, 1.0));
        let hint = Pose::from_position(Vector3::new(0.0, 1.0, 0.0));
        let set = Pose::new(Vector3::new(0.0, 0.1, 0.0), yaw_degrees(3.0));
        let unset = Pose::identity();

        let resolve = |mode, manual: &CalibrationPose, automatic: &CalibrationPose| {
            resolve_offset(mode, &rest, &hint, 2.0, manual, automatic)
        };
        assert_eq!(resolve(CalibrationMode::None, &set, &set), rest.scaled(2.0));
        assert_eq!(resolve(CalibrationMode::Manual, &set, &unset), Pose::identity());
        assert_eq!(resolve(CalibrationMode::Manual, &unset, &set), rest.scaled(2.0));
        assert_eq!(resolve(CalibrationMode::Automatic, &unset, &set), hint.scaled(2.0));
        assert_eq!(resolve(CalibrationMode::Automatic, &set, &unset), rest.scaled(2.0));
    }

    #[test]
    fn test_offsets_recomputed_only_when_dirty() {
        let mut f = Fixture::new();
        f.tick();
        assert!(!f.rig.offsets_dirty());

        // 設定を直接変えても dirty にしない限り再計算されない
        f.settings.player_eye_height = 1.5;
        f.tick();
        assert!((f.rig.full_body_scale() - 1.5 / 1.7).abs() < 1e-5);

        f.rig.mark_offsets_dirty();
        f.tick();
        assert!((f.rig.full_body_scale() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_clear_automatic() {
        let mut f = Fixture::new();
        f.tick();
        f.rig.begin_calibration(CalibrationMode::Automatic);
        f.pull_triggers(1.0);
        f.tick();
        assert!(f.store.automatic().is_calibrated());

        let mut ctx = RigContext {
            devices: &f.devices,
            avatar: Some(&f.avatar),
            settings: &mut f.settings,
            store: &mut f.store,
        };
        f.rig.clear_calibration_data(CalibrationMode::Automatic, &mut ctx).unwrap();
        assert_eq!(*f.store.automatic(), FullBodyCalibration::default());
        assert!(!f.store.automatic().is_calibrated());
        assert!(f.rig.offsets_dirty());
    }

    #[test]
    fn test_clear_manual() {
        let mut f = Fixture::new();
        f.tick();
        f.rig.begin_calibration(CalibrationMode::Manual);
        f.pull_triggers(1.0);
        f.tick();
        assert!(f.store.manual("Test.avatar").is_calibrated());

        let mut ctx = RigContext {
            devices: &f.devices,
            avatar: Some(&f.avatar),
            settings: &mut f.settings,
            store: &mut f.store,
        };
        f.rig.clear_calibration_data(CalibrationMode::Manual, &mut ctx).unwrap();
        assert_eq!(f.store.manual("Test.avatar"), FullBodyCalibration::default());
        assert!(!f.store.manual("Test.avatar").is_calibrated());
        assert!(f.rig.offsets_dirty());

        f.pull_triggers(0.0);
        f.tick();
        assert!(f.rig.nodes().pelvis.calibration.is_identity());
    }

    #[test]
    fn test_avatar_unload_resets_offsets() {
        let mut f = Fixture::new();
        f.avatar.scale = 1.2;
        f.tick();
        assert!(!f.rig.nodes().pelvis.offset.is_identity());

        f.rig.on_avatar_changed(&f.settings, None);
        f.devices.tick(&mut f.provider);
        let mut ctx = RigContext {
            devices: &f.devices,
            avatar: None,
            settings: &mut f.settings,
            store: &mut f.store,
        };
        f.rig.tick(&mut ctx);

        for device_use in DeviceUse::ALL {
            let node = f.rig.nodes().get(device_use);
            assert!(node.offset.is_identity());
            assert!(node.calibration.is_identity());
        }
        assert_eq!(f.rig.full_body_scale(), 1.0);
        assert_eq!(f.rig.tracker_scale(), 1.0);
    }

    #[test]
    fn test_floor_height_moves_eye_height() {
        let mut f = Fixture::new();
        f.tick();
        f.rig.set_floor_height(0.2);
        assert!(f.rig.offsets_dirty());
        assert!((f.rig.eye_height() - 1.4).abs() < 1e-6);
    }
}
