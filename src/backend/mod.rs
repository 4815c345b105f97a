//! 执行后端抽象
//!
//! 导航、抓取、放置、收臂、躯干、注视、检测与接近位姿采样都由外部后端完成；
//! 编排器把它们当作黑盒，任何调用都可能失败且都不假定很快返回。

pub mod sim;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::world::{ObjectHandle, Point, Pose, WorldSnapshot};

pub use sim::{CallCounts, FaultPlan, SearchBehavior, SimulatedBackend};

/// 后端调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// 后端执行了调用但动作失败（目标未到达、未抓住、物体未检测到等）
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// 后端无响应或连接断开；此后的任何命令都不可信
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// 调用方通过取消令牌中止了调用
    #[error("Cancelled")]
    Cancelled,
}

/// 单臂标识；抓取与放置某一阶段只使用一只手臂
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmIdentity {
    Left,
    Right,
}

impl ArmIdentity {
    pub const ALL: [ArmIdentity; 2] = [ArmIdentity::Left, ArmIdentity::Right];

    /// 肩部相对底盘中心的横向符号：左 +1，右 -1
    pub fn side_sign(self) -> f64 {
        match self {
            ArmIdentity::Left => 1.0,
            ArmIdentity::Right => -1.0,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" => Some(ArmIdentity::Left),
            "right" => Some(ArmIdentity::Right),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArmIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArmIdentity::Left => f.write_str("left"),
            ArmIdentity::Right => f.write_str("right"),
        }
    }
}

/// 收臂目标；Both 只用于收臂，不用于抓取/放置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmGroup {
    Left,
    Right,
    Both,
}

impl From<ArmIdentity> for ArmGroup {
    fn from(arm: ArmIdentity) -> Self {
        match arm {
            ArmIdentity::Left => ArmGroup::Left,
            ArmIdentity::Right => ArmGroup::Right,
        }
    }
}

/// 躯干档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorsoLevel {
    Low,
    High,
}

/// 执行后端 trait
#[async_trait]
pub trait ActuationBackend: Send + Sync {
    async fn navigate(&self, pose: &Pose) -> Result<(), BackendError>;

    async fn grasp(&self, object: &ObjectHandle, arm: ArmIdentity) -> Result<(), BackendError>;

    async fn place(
        &self,
        object: &ObjectHandle,
        arm: ArmIdentity,
        pose: &Pose,
    ) -> Result<(), BackendError>;

    async fn park_arms(&self, arms: ArmGroup) -> Result<(), BackendError>;

    /// 躯干升降到指定高度（米）
    async fn adjust_torso(&self, height: f64) -> Result<(), BackendError>;

    async fn look_at(&self, object: &ObjectHandle) -> Result<(), BackendError>;

    /// 在可选区域（放置面名）内检测物体；未检测到返回 ExecutionFailed
    async fn detect(&self, object: &ObjectHandle, region: Option<&str>) -> Result<(), BackendError>;

    /// 为目标点采样一个满足可达/无碰撞约束的底盘位姿；收敛时间无上界，令牌取消后应尽快返回 Cancelled
    async fn search_approach_pose(
        &self,
        target: Point,
        cancel: CancellationToken,
    ) -> Result<Pose, BackendError>;
}

/// 同时提供世界快照与执行能力的后端
pub trait Backend: WorldSnapshot + ActuationBackend {}

impl<T: WorldSnapshot + ActuationBackend> Backend for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arm_identity() {
        assert_eq!(ArmIdentity::parse(" Left "), Some(ArmIdentity::Left));
        assert_eq!(ArmIdentity::parse("RIGHT"), Some(ArmIdentity::Right));
        assert_eq!(ArmIdentity::parse("both"), None);
    }
}
