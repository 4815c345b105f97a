//! 空间推理：可达手臂选择与有界接近位姿搜索

pub mod arm;
pub mod pose_search;

pub use arm::{ArmSelector, ReachEnvelope};
pub use pose_search::{BoundedPoseSearch, FallbackReason, PoseSearchResult};
