use nalgebra::Vector3;
use std::collections::HashMap;

use super::{DeviceClass, DeviceProvider, Hand, RawDevice, TrackerRole};
use crate::pose::{yaw_degrees, Pose};

/// 台本どおりにデバイスを返すプロバイダ (テスト/シミュレーション用)
#[derive(Debug, Default)]
pub struct MockDeviceProvider {
    devices: Vec<RawDevice>,
    roles: HashMap<String, TrackerRole>,
    triggers: [Option<f32>; 2],
    changed: bool,
}

impl MockDeviceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// HMD + 両手コントローラ + 腰/両足トラッカーで直立しているプレイヤー
    pub fn standing(eye_height: f32) -> Self {
        let mut provider = Self::new();
        provider.add_device(
            RawDevice::new("HMD", DeviceClass::HeadMounted)
                .with_pose(Pose::from_position(Vector3::new(0.0, eye_height, 0.0))),
        );
        provider.add_device(
            RawDevice::new("CTRL-L", DeviceClass::Controller(Hand::Left))
                .with_pose(Pose::from_position(Vector3::new(-0.3, eye_height * 0.55, 0.1))),
        );
        provider.add_device(
            RawDevice::new("CTRL-R", DeviceClass::Controller(Hand::Right))
                .with_pose(Pose::from_position(Vector3::new(0.3, eye_height * 0.55, 0.1))),
        );
        provider.add_tracker(
            "LHR-WAIST",
            "vive_tracker_waist",
            Pose::new(Vector3::new(0.0, eye_height * 0.57, 0.12), yaw_degrees(180.0)),
        );
        provider.add_tracker(
            "LHR-LFOOT",
            "vive_tracker_left_foot",
            Pose::new(Vector3::new(-0.12, 0.08, 0.05), yaw_degrees(-15.0)),
        );
        provider.add_tracker(
            "LHR-RFOOT",
            "vive_tracker_right_foot",
            Pose::new(Vector3::new(0.12, 0.08, 0.05), yaw_degrees(15.0)),
        );
        provider.set_trigger(Hand::Left, Some(0.0));
        provider.set_trigger(Hand::Right, Some(0.0));
        provider
    }

    pub fn add_device(&mut self, device: RawDevice) {
        self.devices.retain(|d| d.id != device.id);
        self.devices.push(device);
        self.changed = true;
    }

    /// 汎用トラッカーを追加し、controller type から役割を設定する
    pub fn add_tracker(&mut self, id: &str, controller_type: &str, pose: Pose) {
        self.roles
            .insert(id.to_string(), TrackerRole::from_controller_type(controller_type));
        self.add_device(
            RawDevice::new(id, DeviceClass::GenericTracker)
                .with_controller_type(controller_type)
                .with_pose(pose),
        );
    }

    pub fn remove_device(&mut self, id: &str) {
        let before = self.devices.len();
        self.devices.retain(|d| d.id != id);
        self.changed |= self.devices.len() != before;
    }

    pub fn set_role(&mut self, id: &str, role: TrackerRole) {
        self.roles.insert(id.to_string(), role);
        self.changed = true;
    }

    pub fn set_pose(&mut self, id: &str, pose: Pose) {
        if let Some(device) = self.devices.iter_mut().find(|d| d.id == id) {
            device.pose = pose;
        }
    }

    pub fn pose(&self, id: &str) -> Option<Pose> {
        self.devices.iter().find(|d| d.id == id).map(|d| d.pose)
    }

    pub fn set_tracking(&mut self, id: &str, is_tracking: bool) {
        if let Some(device) = self.devices.iter_mut().find(|d| d.id == id) {
            device.is_tracking = is_tracking;
        }
    }

    pub fn set_trigger(&mut self, hand: Hand, value: Option<f32>) {
        self.triggers[hand_index(hand)] = value;
    }

    /// 一覧が変わっていなくても次の poll で変更ありと報告させる
    pub fn force_changed(&mut self) {
        self.changed = true;
    }
}

fn hand_index(hand: Hand) -> usize {
    match hand {
        Hand::Left => 0,
        Hand::Right => 1,
    }
}

impl DeviceProvider for MockDeviceProvider {
    fn poll_devices(&mut self, out: &mut Vec<RawDevice>) -> bool {
        out.clone_from(&self.devices);
        std::mem::take(&mut self.changed)
    }

    fn tracker_role(&self, id: &str) -> TrackerRole {
        self.roles.get(id).copied().unwrap_or_default()
    }

    fn trigger_value(&self, hand: Hand) -> Option<f32> {
        self.triggers[hand_index(hand)]
    }
}
