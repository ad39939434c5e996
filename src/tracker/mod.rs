pub mod calibrator;
pub mod correction;
pub mod rig;
pub mod smooth;

pub use calibrator::HumanoidCalibrator;
pub use correction::{CorrectionContext, PoseCorrectionPipeline};
pub use rig::{RigContext, TrackedNode, TrackedNodes, TrackingRig};
pub use smooth::Smoother;
