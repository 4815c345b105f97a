//! 编排错误类型与原因码
//!
//! 与 RecoveryPolicy 配合：每个终止结果都带一个 ErrorKind，调用方据此决定重试同一意图还是放弃。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendError;

/// 编排过程中可能出现的错误；在编排器边界统一转换为结构化结果，不会作为未捕获故障抛出
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("No reachable arm for object: {0}")]
    NoReachableArm(String),

    /// 警告而非失败：位姿搜索超时，使用了几何回退位姿
    #[error("Pose search fallback used: {0}")]
    PoseSearchFallbackUsed(String),

    #[error("Grasp failed: {0}")]
    GraspFailed(String),

    #[error("Place failed: {0}")]
    PlaceFailed(String),

    /// 非致命：记录日志后仍从当前位置尝试执行
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// 致命：立即中止且不收臂
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Destination unresolved: {0}")]
    DestinationUnresolved(String),

    /// 位姿搜索返回 NotFound（目标点结构上无效）
    #[error("No approach pose for target: {0}")]
    NoApproachPose(String),

    #[error("Perception failed: {0}")]
    PerceptionFailed(String),

    /// 后端能回应但调用失败（如快照读取出错）：可恢复，仍收臂清理
    #[error("Backend call failed: {0}")]
    BackendFailed(String),

    #[error("Cancelled")]
    Cancelled,
}

/// 原因码（OrchestratorError 的判别值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ObjectNotFound,
    NoReachableArm,
    PoseSearchFallbackUsed,
    GraspFailed,
    PlaceFailed,
    NavigationFailed,
    BackendUnavailable,
    DestinationUnresolved,
    NoApproachPose,
    PerceptionFailed,
    BackendFailed,
    Cancelled,
}

impl ErrorKind {
    /// 可恢复：相同意图重试可能成功；结构性错误（物体不存在、不可达、目的地无效）不可恢复
    pub fn is_recoverable(self) -> bool {
        !matches!(
            self,
            ErrorKind::ObjectNotFound
                | ErrorKind::NoReachableArm
                | ErrorKind::DestinationUnresolved
                | ErrorKind::NoApproachPose
        )
    }

    /// 仅产生警告、任务继续
    pub fn is_warning(self) -> bool {
        matches!(self, ErrorKind::PoseSearchFallbackUsed | ErrorKind::NavigationFailed)
    }
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::ObjectNotFound(_) => ErrorKind::ObjectNotFound,
            OrchestratorError::NoReachableArm(_) => ErrorKind::NoReachableArm,
            OrchestratorError::PoseSearchFallbackUsed(_) => ErrorKind::PoseSearchFallbackUsed,
            OrchestratorError::GraspFailed(_) => ErrorKind::GraspFailed,
            OrchestratorError::PlaceFailed(_) => ErrorKind::PlaceFailed,
            OrchestratorError::NavigationFailed(_) => ErrorKind::NavigationFailed,
            OrchestratorError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            OrchestratorError::DestinationUnresolved(_) => ErrorKind::DestinationUnresolved,
            OrchestratorError::NoApproachPose(_) => ErrorKind::NoApproachPose,
            OrchestratorError::PerceptionFailed(_) => ErrorKind::PerceptionFailed,
            OrchestratorError::BackendFailed(_) => ErrorKind::BackendFailed,
            OrchestratorError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// 不含原因前缀的消息；与 kind 一起存入结构化结果，from_kind 可无损还原
    pub fn detail(&self) -> String {
        match self {
            OrchestratorError::ObjectNotFound(m)
            | OrchestratorError::NoReachableArm(m)
            | OrchestratorError::PoseSearchFallbackUsed(m)
            | OrchestratorError::GraspFailed(m)
            | OrchestratorError::PlaceFailed(m)
            | OrchestratorError::NavigationFailed(m)
            | OrchestratorError::BackendUnavailable(m)
            | OrchestratorError::DestinationUnresolved(m)
            | OrchestratorError::NoApproachPose(m)
            | OrchestratorError::PerceptionFailed(m)
            | OrchestratorError::BackendFailed(m) => m.clone(),
            OrchestratorError::Cancelled => "cancelled".to_string(),
        }
    }

    /// 由原因码与消息重建错误（结构化结果还原为 Err）
    pub fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::ObjectNotFound => OrchestratorError::ObjectNotFound(message),
            ErrorKind::NoReachableArm => OrchestratorError::NoReachableArm(message),
            ErrorKind::PoseSearchFallbackUsed => OrchestratorError::PoseSearchFallbackUsed(message),
            ErrorKind::GraspFailed => OrchestratorError::GraspFailed(message),
            ErrorKind::PlaceFailed => OrchestratorError::PlaceFailed(message),
            ErrorKind::NavigationFailed => OrchestratorError::NavigationFailed(message),
            ErrorKind::BackendUnavailable => OrchestratorError::BackendUnavailable(message),
            ErrorKind::DestinationUnresolved => OrchestratorError::DestinationUnresolved(message),
            ErrorKind::NoApproachPose => OrchestratorError::NoApproachPose(message),
            ErrorKind::PerceptionFailed => OrchestratorError::PerceptionFailed(message),
            ErrorKind::BackendFailed => OrchestratorError::BackendFailed(message),
            ErrorKind::Cancelled => OrchestratorError::Cancelled,
        }
    }
}

/// 只有 Unavailable 映射为 BackendUnavailable（不收臂中止）；普通执行失败仍走 FAILED + 收臂
impl From<BackendError> for OrchestratorError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Cancelled => OrchestratorError::Cancelled,
            BackendError::Unavailable(msg) => OrchestratorError::BackendUnavailable(msg),
            BackendError::ExecutionFailed(msg) => OrchestratorError::BackendFailed(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_kinds_not_recoverable() {
        assert!(!ErrorKind::ObjectNotFound.is_recoverable());
        assert!(!ErrorKind::NoReachableArm.is_recoverable());
        assert!(ErrorKind::PoseSearchFallbackUsed.is_recoverable());
        assert!(ErrorKind::GraspFailed.is_recoverable());
    }

    #[test]
    fn test_kind_and_detail_rebuild_the_error() {
        let err = OrchestratorError::PlaceFailed("slipped".into());
        assert_eq!(err.detail(), "slipped");
        let rebuilt = OrchestratorError::from_kind(err.kind(), err.detail());
        assert_eq!(rebuilt, err);
        assert_eq!(rebuilt.to_string(), "Place failed: slipped");
    }

    #[test]
    fn test_backend_error_conversion() {
        let err: OrchestratorError = BackendError::Unavailable("socket closed".into()).into();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        let err: OrchestratorError = BackendError::Cancelled.into();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        let err: OrchestratorError = BackendError::ExecutionFailed("snapshot stale".into()).into();
        assert_eq!(err, OrchestratorError::BackendFailed("snapshot stale".into()));
        assert!(err.kind().is_recoverable());
    }
}
