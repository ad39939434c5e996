pub mod manager;
pub mod mock;
pub mod provider;

pub use manager::DeviceManager;
pub use mock::MockDeviceProvider;
pub use provider::DeviceProvider;

use nalgebra::{UnitQuaternion, Vector3};
use std::fmt;

use crate::pose::{euler_degrees, yaw_degrees, Pose};

/// 論理的な部位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceUse {
    Head,
    LeftHand,
    RightHand,
    Waist,
    LeftFoot,
    RightFoot,
}

impl DeviceUse {
    pub const ALL: [DeviceUse; 6] = [
        DeviceUse::Head,
        DeviceUse::LeftHand,
        DeviceUse::RightHand,
        DeviceUse::Waist,
        DeviceUse::LeftFoot,
        DeviceUse::RightFoot,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// 腰/足 (キャリブレーション対象)
    pub fn is_full_body(self) -> bool {
        matches!(self, DeviceUse::Waist | DeviceUse::LeftFoot | DeviceUse::RightFoot)
    }
}

impl fmt::Display for DeviceUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

/// ハードウェア特性による分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    HeadMounted,
    Controller(Hand),
    GenericTracker,
    /// ベースステーション等。割り当て対象外
    Other,
}

/// プラットフォームが返すトラッカーの役割
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerRole {
    #[default]
    Unknown,
    ViveTracker,
    HeldInHand,
    LeftFoot,
    RightFoot,
    LeftShoulder,
    RightShoulder,
    Waist,
    Chest,
    Camera,
    Keyboard,
    KinectToVrTracker,
}

impl TrackerRole {
    /// controller type 文字列から
    pub fn from_controller_type(controller_type: &str) -> Self {
        match controller_type {
            "vive_tracker" => TrackerRole::ViveTracker,
            "vive_tracker_handed" => TrackerRole::HeldInHand,
            "vive_tracker_left_foot" => TrackerRole::LeftFoot,
            "vive_tracker_right_foot" => TrackerRole::RightFoot,
            "vive_tracker_left_shoulder" => TrackerRole::LeftShoulder,
            "vive_tracker_right_shoulder" => TrackerRole::RightShoulder,
            "vive_tracker_waist" => TrackerRole::Waist,
            "vive_tracker_chest" => TrackerRole::Chest,
            "vive_tracker_camera" => TrackerRole::Camera,
            "vive_tracker_keyboard" => TrackerRole::Keyboard,
            "kinect_device" => TrackerRole::KinectToVrTracker,
            _ => TrackerRole::Unknown,
        }
    }

    /// 直接割り当てられる役割
    pub fn device_use(self) -> Option<DeviceUse> {
        match self {
            TrackerRole::Waist => Some(DeviceUse::Waist),
            TrackerRole::LeftFoot => Some(DeviceUse::LeftFoot),
            TrackerRole::RightFoot => Some(DeviceUse::RightFoot),
            _ => None,
        }
    }
}

/// プロバイダが1ティックごとに報告する生デバイス
#[derive(Debug, Clone, PartialEq)]
pub struct RawDevice {
    /// プラットフォーム上で安定したID (シリアル番号など)
    pub id: String,
    pub class: DeviceClass,
    /// ドライバが報告する controller type
    pub controller_type: String,
    pub is_connected: bool,
    pub is_tracking: bool,
    pub pose: Pose,
}

impl RawDevice {
    pub fn new(id: &str, class: DeviceClass) -> Self {
        Self {
            id: id.to_string(),
            class,
            controller_type: String::new(),
            is_connected: true,
            is_tracking: true,
            pose: Pose::identity(),
        }
    }

    pub fn with_controller_type(mut self, controller_type: &str) -> Self {
        self.controller_type = controller_type.to_string();
        self
    }

    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }
}

/// 部位ごとのデバイス状態 (毎ティック作り直す)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceState {
    pub is_connected: bool,
    pub is_tracking: bool,
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl DeviceState {
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            is_connected: false,
            is_tracking: false,
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

/// ルーム調整 (床の中心と向き)。デバイスのポーズに適用する
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomAdjust {
    pub center: Vector3<f32>,
    /// Y軸まわりの回転 (度)
    pub rotation: f32,
}

impl RoomAdjust {
    pub fn apply(&self, pose: &Pose) -> Pose {
        let rot = yaw_degrees(self.rotation);
        Pose::new(self.center + rot * pose.position, rot * pose.rotation)
    }
}

impl Default for RoomAdjust {
    fn default() -> Self {
        Self {
            center: Vector3::zeros(),
            rotation: 0.0,
        }
    }
}

/// ドライバ固有の取り付け向き補正
pub fn mounting_correction(
    controller_type: &str,
    device_use: DeviceUse,
) -> Option<UnitQuaternion<f32>> {
    let is_foot = matches!(device_use, DeviceUse::LeftFoot | DeviceUse::RightFoot);

    // Driver4VR
    if controller_type.starts_with("d4vr_tracker_") && is_foot {
        return Some(euler_degrees(-90.0, 180.0, 0.0));
    }

    // KinectToVR
    if controller_type == "kinect_device" {
        if device_use == DeviceUse::Waist {
            return Some(euler_degrees(-90.0, 180.0, 0.0));
        }
        if is_foot {
            return Some(euler_degrees(0.0, 180.0, 0.0));
        }
    }

    None
}
