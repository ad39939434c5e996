use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// 位置と回転
///
/// 座標系: +Y 上, +Z 前, +X 右
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

/// トラッカー自身のローカル座標系で表した補正量
///
/// `corrected = raw.position + raw.rotation * corr.position`
/// `corrected_rot = raw.rotation * corr.rotation`
pub type CalibrationPose = Pose;

impl Pose {
    pub fn new(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self { position, rotation }
    }

    /// 原点、回転なし
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn from_position(position: Vector3<f32>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// 厳密な比較。キャリブレーション済み判定に使う
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// `self` をトラッカー生ポーズとみなし、ローカル座標系の補正を適用する
    pub fn corrected_by(&self, correction: &CalibrationPose) -> Pose {
        Pose {
            position: self.position + self.rotation * correction.position,
            rotation: self.rotation * correction.rotation,
        }
    }

    /// `target` を `self` のローカル座標系で表した補正量を求める。
    /// `self.corrected_by(&result) == target` となる
    pub fn correction_to(&self, target: &Pose) -> CalibrationPose {
        let inv = self.rotation.inverse();
        Pose {
            position: inv * (target.position - self.position),
            rotation: inv * target.rotation,
        }
    }

    /// 親フレーム `self` 内のローカルポーズをワールドへ
    pub fn transform(&self, local: &Pose) -> Pose {
        self.corrected_by(local)
    }

    /// ワールドポーズを `self` のローカルフレームへ
    pub fn inverse_transform(&self, world: &Pose) -> Pose {
        self.correction_to(world)
    }

    /// 位置だけスケール
    pub fn scaled(&self, scale: f32) -> Pose {
        Pose::new(self.position * scale, self.rotation)
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.rotation * Vector3::z()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Y軸回転 (度)。正の角度で +Z が +X 側へ回る
pub fn yaw_degrees(degrees: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), degrees.to_radians())
}

/// オイラー角 (度) から。Z → X → Y の順に回す
pub fn euler_degrees(x: f32, y: f32, z: f32) -> UnitQuaternion<f32> {
    let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), x.to_radians());
    let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), z.to_radians());
    yaw_degrees(y) * rx * rz
}

/// 水平な前方向から回転を作る (up = +Y)。
/// 真上/真下を向いている場合は None
pub fn look_rotation_horizontal(forward: Vector3<f32>) -> Option<UnitQuaternion<f32>> {
    let flat = Vector3::new(forward.x, 0.0, forward.z);
    if flat.norm_squared() < 1e-8 {
        return None;
    }
    Some(UnitQuaternion::face_towards(&flat, &Vector3::y()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq_vec(a: &Vector3<f32>, b: &Vector3<f32>, eps: f32) -> bool {
        (a - b).norm() < eps
    }

    #[test]
    fn test_pose_identity() {
        let pose = Pose::identity();
        assert_eq!(pose.position, Vector3::zeros());
        assert_eq!(pose.rotation, UnitQuaternion::identity());
        assert!(pose.is_identity());
    }

    #[test]
    fn test_correction_at_origin() {
        let raw = Pose::identity();
        let correction = Pose::from_position(Vector3::new(0.0, 0.1, 0.0));
        let corrected = raw.corrected_by(&correction);
        assert!(approx_eq_vec(&corrected.position, &Vector3::new(0.0, 0.1, 0.0), 1e-6));
        assert_eq!(corrected.rotation, UnitQuaternion::identity());
    }

    #[test]
    fn test_correction_is_tracker_local() {
        // 90度回転したトラッカーでは補正の +Z がワールド +X になる
        let raw = Pose::new(Vector3::new(1.0, 0.0, 0.0), yaw_degrees(90.0));
        let correction = Pose::from_position(Vector3::new(0.0, 0.0, 1.0));
        let corrected = raw.corrected_by(&correction);
        assert!(approx_eq_vec(&corrected.position, &Vector3::new(2.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_correction_to_roundtrip() {
        let raw = Pose::new(
            Vector3::new(0.3, 1.0, -0.2),
            UnitQuaternion::from_euler_angles(0.2, 1.1, -0.4),
        );
        let target = Pose::new(Vector3::new(0.0, 0.9, 0.1), yaw_degrees(-10.0));
        let corr = raw.correction_to(&target);
        let back = raw.corrected_by(&corr);
        assert!(approx_eq_vec(&back.position, &target.position, 1e-5));
        assert!(back.rotation.angle_to(&target.rotation) < 1e-4);
    }

    #[test]
    fn test_look_rotation_discards_pitch() {
        let rot = look_rotation_horizontal(Vector3::new(0.0, -0.5, 1.0)).unwrap();
        assert!(rot.angle_to(&UnitQuaternion::identity()) < 1e-5);
        assert!(look_rotation_horizontal(Vector3::new(0.0, 1.0, 0.0)).is_none());
    }

    #[test]
    fn test_yaw_direction() {
        let fwd = yaw_degrees(90.0) * Vector3::z();
        assert!(approx_eq_vec(&fwd, &Vector3::x(), 1e-6));
    }
}
