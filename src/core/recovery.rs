//! 错误恢复策略
//!
//! 根据阶段与后端错误给出处置：继续（记警告）/ 失败（进入 FAILED，随后收臂清理）/ 中止（后端不可用，不收臂）。
//! 执行阶段不做盲目重试：同一位姿重复同样的抓取没有预期收益。

use crate::backend::BackendError;
use crate::core::{OrchestratorError, Phase};

/// 对单次后端调用失败的处置
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// 记录警告后继续下一步
    Continue(OrchestratorError),
    /// 尽力而为的动作失败：只记录，不影响结果
    BestEffort(String),
    /// 终止意图，仍执行收臂清理
    Fail(OrchestratorError),
    /// 立即中止，不再向后端发任何命令
    Abort(OrchestratorError),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryPolicy;

impl RecoveryPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, phase: Phase, err: BackendError) -> Disposition {
        let msg = match err {
            BackendError::Unavailable(msg) => {
                return Disposition::Abort(OrchestratorError::BackendUnavailable(msg))
            }
            BackendError::Cancelled => return Disposition::Fail(OrchestratorError::Cancelled),
            BackendError::ExecutionFailed(msg) => msg,
        };
        match phase {
            // 接近精度失败很常见，从机器人实际停下的位置继续尝试执行
            Phase::NavigatePick | Phase::NavigatePlace => {
                Disposition::Continue(OrchestratorError::NavigationFailed(msg))
            }
            Phase::ExecutePick => Disposition::Fail(OrchestratorError::GraspFailed(msg)),
            Phase::ExecutePlace => Disposition::Fail(OrchestratorError::PlaceFailed(msg)),
            // 准备与收尾动作尽力而为
            Phase::Prepare | Phase::Park => Disposition::BestEffort(msg),
            // 终止相位之后不应再有后端调用；出现即视为后端状态不可信
            Phase::Done | Phase::Failed => Disposition::Abort(OrchestratorError::BackendUnavailable(
                format!("backend call after terminal phase: {msg}"),
            )),
        }
    }
}
