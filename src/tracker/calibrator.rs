use log::{info, trace};
use nalgebra::{UnitQuaternion, Vector3};

use super::rig::{TrackedNode, TrackedNodes};
use crate::avatar::SkeletonAnchors;
use crate::calibration::FullBodyCalibration;
use crate::config::AutomaticCalibrationConfig;
use crate::pose::{look_rotation_horizontal, yaw_degrees, CalibrationPose, Pose};

/// 足のつま先の開き (度)
const FOOT_TOE_OUT_DEGREES: f32 = 10.0;

/// トラッカーの生ポーズから身体上の目標点への補正を求める
///
/// 補正は常にトラッカー自身のローカル座標系で表す:
/// `position = inv(tracker_rot) * (target - tracker_pos)`,
/// `rotation = inv(tracker_rot) * target_rot`
pub struct HumanoidCalibrator {
    eye_height_ratio: f32,
    pelvis_height_ratio: f32,
    compensate_head_depth: bool,
}

impl HumanoidCalibrator {
    pub fn new(pelvis_height_ratio: f32) -> Self {
        Self {
            eye_height_ratio: 7.0 / 8.0,
            pelvis_height_ratio,
            compensate_head_depth: false,
        }
    }

    pub fn from_config(config: &AutomaticCalibrationConfig) -> Self {
        Self {
            eye_height_ratio: config.eye_height_ratio,
            pelvis_height_ratio: config.pelvis_height_ratio,
            compensate_head_depth: config.compensate_head_depth,
        }
    }

    /// 体型の比率から目標点を決める (スケルトン不要)
    ///
    /// `eye_height`: 床からの目の高さ, `floor_height`: 床の高さ (ルーム調整分)
    pub fn calibrate_automatic(
        &self,
        nodes: &TrackedNodes,
        eye_height: f32,
        floor_height: f32,
    ) -> FullBodyCalibration {
        info!(
            "Calibrating automatically (eye height {:.3} m, estimated body height {:.3} m)",
            eye_height,
            eye_height / self.eye_height_ratio
        );

        let center = self.center(&nodes.head, eye_height, floor_height);
        let left_foot_local = center.inverse_transform(&nodes.left_foot.pose).position;
        let right_foot_local = center.inverse_transform(&nodes.right_foot.pose).position;

        let head_target = Pose::new(
            Vector3::new(0.0, eye_height, 0.0),
            center.rotation.inverse() * nodes.head.pose.rotation,
        );
        let pelvis_target =
            Pose::from_position(Vector3::new(0.0, eye_height * self.pelvis_height_ratio, 0.0));
        // 足は現在の左右の開きを保ったまま床の上
        let left_foot_target = Pose::new(
            Vector3::new(left_foot_local.x, 0.0, 0.0),
            yaw_degrees(-FOOT_TOE_OUT_DEGREES),
        );
        let right_foot_target = Pose::new(
            Vector3::new(right_foot_local.x, 0.0, 0.0),
            yaw_degrees(FOOT_TOE_OUT_DEGREES),
        );

        FullBodyCalibration {
            head: correction("head", &nodes.head, &center.transform(&head_target)),
            waist: correction("waist", &nodes.pelvis, &center.transform(&pelvis_target)),
            left_foot: correction(
                "left foot",
                &nodes.left_foot,
                &center.transform(&left_foot_target),
            ),
            right_foot: correction(
                "right foot",
                &nodes.right_foot,
                &center.transform(&right_foot_target),
            ),
        }
    }

    /// アバターの骨の位置を目標にする。
    /// `floor_scale` は実行時に全身トラッカーの高さへ掛ける倍率
    pub fn calibrate_manual(
        &self,
        nodes: &TrackedNodes,
        anchors: &SkeletonAnchors,
        floor_scale: f32,
    ) -> FullBodyCalibration {
        info!("Calibrating manually (floor scale {:.3})", floor_scale);

        let unscaled = |anchor: &Pose| {
            let mut local = anchors.origin.inverse_transform(anchor);
            if floor_scale > f32::EPSILON {
                local.position.y /= floor_scale;
            }
            local
        };

        FullBodyCalibration {
            head: CalibrationPose::identity(),
            waist: correction("waist", &nodes.pelvis, &unscaled(&anchors.pelvis)),
            left_foot: correction("left foot", &nodes.left_foot, &unscaled(&anchors.left_foot)),
            right_foot: correction("right foot", &nodes.right_foot, &unscaled(&anchors.right_foot)),
        }
    }

    /// 頭の真下の床に置いた水平な基準フレーム
    fn center(&self, head: &TrackedNode, eye_height: f32, floor_height: f32) -> Pose {
        let forward = head.pose.forward();
        let rotation = look_rotation_horizontal(forward)
            .or_else(|| look_rotation_horizontal(head.pose.rotation * Vector3::y()))
            .unwrap_or_else(UnitQuaternion::identity);

        let mut position = head.pose.position;
        if self.compensate_head_depth {
            position -= head.pose.rotation * Vector3::new(0.0, 0.0, head_depth(eye_height));
        }
        position.y = floor_height;

        Pose::new(position, rotation)
    }
}

impl Default for HumanoidCalibrator {
    fn default() -> Self {
        Self::from_config(&AutomaticCalibrationConfig::default())
    }
}

/// 目の高さから推定した頭の奥行き
fn head_depth(eye_height: f32) -> f32 {
    0.08 + 0.000175 * eye_height
}

/// トラッキングしていなければ identity
fn correction(name: &str, node: &TrackedNode, target: &Pose) -> CalibrationPose {
    if !node.is_tracking {
        trace!("{} is not tracking, leaving it uncalibrated", name);
        return CalibrationPose::identity();
    }
    let result = node.pose.correction_to(target);
    trace!(
        "Set {} correction to {:?} {:?}",
        name,
        result.position,
        result.rotation.euler_angles()
    );
    result
}
