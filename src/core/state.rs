//! 状态定义：阶段、操作意图与终止结果
//!
//! ManipulationOutcome 每个意图只产生一次，构造后不再修改，交给调用方序列化。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::ArmIdentity;
use crate::core::{ErrorKind, OrchestratorError};
use crate::world::{Destination, Point, Pose};

/// 状态机阶段；Failed 可从任意阶段到达
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Prepare,
    NavigatePick,
    ExecutePick,
    NavigatePlace,
    ExecutePlace,
    Park,
    Done,
    Failed,
}

impl Phase {
    /// 正常路径上的阶段顺序
    pub const SEQUENCE: [Phase; 6] = [
        Phase::Prepare,
        Phase::NavigatePick,
        Phase::ExecutePick,
        Phase::NavigatePlace,
        Phase::ExecutePlace,
        Phase::Park,
    ];
}

/// 操作意图：把某物体搬到目的地
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulationIntent {
    /// 物体名（忽略大小写解析）
    pub object: String,
    pub destination: Destination,
    /// 手臂提示；可达时无条件采用
    #[serde(default)]
    pub arm: Option<ArmIdentity>,
}

impl ManipulationIntent {
    pub fn new(object: impl Into<String>, destination: impl Into<Destination>) -> Self {
        Self { object: object.into(), destination: destination.into(), arm: None }
    }

    pub fn with_arm(mut self, arm: ArmIdentity) -> Self {
        self.arm = Some(arm);
        self
    }
}

/// 任务继续执行但需要告知调用方的情况
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeWarning {
    pub phase: Phase,
    pub kind: Option<ErrorKind>,
    pub detail: String,
}

/// 失败原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

/// 意图的终止记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulationOutcome {
    pub intent_id: Uuid,
    /// 实际解析到的物体名（未解析到时为请求的名字）
    pub object: String,
    pub arm_used: Option<ArmIdentity>,
    pub destination: Option<Point>,
    /// 结束时从快照读取的物体位姿
    pub final_object_pose: Option<Pose>,
    /// Done 或 Failed
    pub terminal: Phase,
    /// 最后进入的阶段
    pub phase_reached: Phase,
    /// 已进入的阶段（失败阶段也计入，失败后的收臂清理不计入）
    pub phases_completed: Vec<Phase>,
    /// 失败后是否执行了收臂清理
    pub cleanup_parked: bool,
    pub failure: Option<Failure>,
    pub warnings: Vec<OutcomeWarning>,
    /// 毫秒时间戳
    pub started_at: i64,
    pub finished_at: i64,
}

impl ManipulationOutcome {
    pub fn is_success(&self) -> bool {
        self.terminal == Phase::Done
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    pub fn has_warning(&self, kind: ErrorKind) -> bool {
        self.warnings.iter().any(|w| w.kind == Some(kind))
    }

    /// 失败结果转为 Err，成功结果原样返回
    pub fn into_result(self) -> Result<ManipulationOutcome, OrchestratorError> {
        match &self.failure {
            Some(f) => Err(OrchestratorError::from_kind(f.kind, f.message.clone())),
            None => Ok(self),
        }
    }
}
