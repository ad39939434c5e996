use crate::config::SmoothConfig;
use crate::pose::Pose;

/// 固定ブレンド係数によるポーズ平滑化フィルタ
///
/// 位置: Lerp
/// 回転: Slerp (反対向きに近い場合は NLERP)
///
/// 係数はティックごとにそのまま使う (経過時間での正規化はしない)
pub struct Smoother {
    alpha_position: f32,
    alpha_rotation: f32,
    prev: Option<Pose>,
}

impl Smoother {
    pub fn new(alpha_position: f32, alpha_rotation: f32) -> Self {
        Self {
            alpha_position: alpha_position.clamp(0.0, 1.0),
            alpha_rotation: alpha_rotation.clamp(0.0, 1.0),
            prev: None,
        }
    }

    pub fn from_config(config: &SmoothConfig) -> Self {
        Self::new(config.position, config.rotation)
    }

    pub fn set_factors(&mut self, config: &SmoothConfig) {
        self.alpha_position = config.position.clamp(0.0, 1.0);
        self.alpha_rotation = config.rotation.clamp(0.0, 1.0);
    }

    pub fn apply(&mut self, pose: Pose) -> Pose {
        let prev = match self.prev {
            Some(prev) => prev,
            None => {
                self.prev = Some(pose);
                return pose;
            }
        };

        let position = prev.position.lerp(&pose.position, self.alpha_position);
        let rotation = prev
            .rotation
            .try_slerp(&pose.rotation, self.alpha_rotation, 1e-6)
            .unwrap_or_else(|| prev.rotation.nlerp(&pose.rotation, self.alpha_rotation));

        let result = Pose::new(position, rotation);
        self.prev = Some(result);
        result
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::yaw_degrees;
    use nalgebra::{UnitQuaternion, Vector3};

    fn approx_eq_pose(a: &Pose, b: &Pose, eps: f32) -> bool {
        (a.position - b.position).norm() < eps && a.rotation.angle_to(&b.rotation) < eps
    }

    #[test]
    fn test_first_frame_passthrough() {
        let mut s = Smoother::new(0.5, 0.5);
        let pose = Pose::from_position(Vector3::new(1.0, 2.0, 3.0));
        let result = s.apply(pose);
        assert_eq!(result, pose);
    }

    #[test]
    fn test_no_smoothing() {
        let mut s = Smoother::new(1.0, 1.0);
        let pose1 = Pose::identity();
        let pose2 = Pose::new(Vector3::new(1.0, 2.0, 3.0), yaw_degrees(40.0));
        s.apply(pose1);
        let result = s.apply(pose2);
        assert!(approx_eq_pose(&result, &pose2, 1e-5));
    }

    #[test]
    fn test_full_smoothing() {
        let mut s = Smoother::new(0.0, 0.0);
        let pose1 = Pose::from_position(Vector3::new(1.0, 2.0, 3.0));
        let pose2 = Pose::new(Vector3::new(4.0, 5.0, 6.0), yaw_degrees(30.0));
        s.apply(pose1);
        let result = s.apply(pose2);
        assert!(approx_eq_pose(&result, &pose1, 1e-5));
    }

    #[test]
    fn test_position_smoothing() {
        let mut s = Smoother::new(0.5, 1.0);
        s.apply(Pose::identity());
        let result = s.apply(Pose::from_position(Vector3::new(2.0, 4.0, 6.0)));
        let expected = Pose::from_position(Vector3::new(1.0, 2.0, 3.0));
        assert!(approx_eq_pose(&result, &expected, 1e-6));
    }

    #[test]
    fn test_rotation_slerp() {
        let mut s = Smoother::new(1.0, 0.5);
        s.apply(Pose::identity());
        let result = s.apply(Pose::new(Vector3::zeros(), yaw_degrees(90.0)));
        assert!(result.rotation.angle_to(&yaw_degrees(45.0)) < 1e-5);
    }

    #[test]
    fn test_factor_clamped() {
        let mut s = Smoother::new(15.0, -3.0);
        s.apply(Pose::identity());
        let result = s.apply(Pose::new(Vector3::new(1.0, 0.0, 0.0), yaw_degrees(20.0)));
        assert!((result.position.x - 1.0).abs() < 1e-6);
        assert!(result.rotation.angle_to(&UnitQuaternion::identity()) < 1e-6);
    }

    #[test]
    fn test_reset() {
        let mut s = Smoother::new(0.0, 0.0);
        let pose1 = Pose::from_position(Vector3::new(1.0, 2.0, 3.0));
        let pose2 = Pose::from_position(Vector3::new(4.0, 5.0, 6.0));
        s.apply(pose1);
        s.reset();
        // リセット後は素通し
        let result = s.apply(pose2);
        assert_eq!(result, pose2);
    }
}
