//! 有界接近位姿搜索
//!
//! 后端的代价地图采样在杂乱场景中收敛时间无上界：搜索与截止计时器竞速，
//! 到期时取消采样并返回几何回退位姿（距目标固定距离、正对目标、忽略碰撞）。
//! NotFound 只用于结构上无效的输入（目标在世界边界外），不是超时结果。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, BackendError};
use crate::config::PoseSearchSection;
use crate::world::{Point, Pose, WorldBounds};

/// 回退原因
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// 预算耗尽
    Timeout,
    /// 采样器在预算内报告失败
    SearchFailed(String),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::Timeout => f.write_str("search budget expired"),
            FallbackReason::SearchFailed(e) => write!(f, "search failed: {e}"),
        }
    }
}

/// 搜索结果；调用方必须按变体分支
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PoseSearchResult {
    Found { pose: Pose, confidence: f64 },
    FallbackUsed { pose: Pose, reason: FallbackReason },
    NotFound { reason: String },
}

pub struct BoundedPoseSearch {
    backend: Arc<dyn Backend>,
    bounds: WorldBounds,
    standoff: f64,
}

impl BoundedPoseSearch {
    pub fn new(backend: Arc<dyn Backend>, bounds: WorldBounds, cfg: &PoseSearchSection) -> Self {
        Self { backend, bounds, standoff: cfg.fallback_standoff_m }
    }

    /// 为目标点寻找接近位姿，调用不会阻塞超过 budget
    pub async fn find_approach_pose(&self, target: Point, budget: Duration) -> PoseSearchResult {
        if !self.bounds.contains(&target) {
            return PoseSearchResult::NotFound {
                reason: format!(
                    "target ({:.3}, {:.3}, {:.3}) is outside the world bounds",
                    target.x, target.y, target.z
                ),
            };
        }

        let deadline = Instant::now() + budget;
        // 回退位姿需要机器人当前位置；读取本身也受截止时间约束
        let robot = match timeout_at(deadline, self.backend.robot_pose()).await {
            Ok(Ok(pose)) => Some(pose),
            _ => None,
        };

        let cancel = CancellationToken::new();
        let outcome = tokio::select! {
            res = self.backend.search_approach_pose(target, cancel.clone()) => Some(res),
            _ = sleep_until(deadline) => None,
        };

        match outcome {
            Some(Ok(pose)) => PoseSearchResult::Found {
                pose,
                confidence: approach_confidence(&pose, &target),
            },
            Some(Err(e)) => {
                let reason = match e {
                    BackendError::Cancelled => FallbackReason::Timeout,
                    other => FallbackReason::SearchFailed(other.to_string()),
                };
                tracing::warn!(%reason, "Approach pose search failed, using fallback pose");
                PoseSearchResult::FallbackUsed {
                    pose: fallback_pose(&target, robot.as_ref(), self.standoff),
                    reason,
                }
            }
            None => {
                cancel.cancel();
                tracing::warn!(budget_ms = budget.as_millis() as u64, "Approach pose search timed out, using fallback pose");
                PoseSearchResult::FallbackUsed {
                    pose: fallback_pose(&target, robot.as_ref(), self.standoff),
                    reason: FallbackReason::Timeout,
                }
            }
        }
    }
}

/// 几何回退位姿：沿「目标 -> 机器人」方向后退 standoff，朝向目标；机器人位置未知或与目标重合时从 -X 方向接近
pub fn fallback_pose(target: &Point, robot: Option<&Pose>, standoff: f64) -> Pose {
    let (mut vx, mut vy) = robot
        .map(|r| (r.position.x - target.x, r.position.y - target.y))
        .unwrap_or((-1.0, 0.0));
    let norm = vx.hypot(vy);
    if norm < 1e-6 {
        (vx, vy) = (-1.0, 0.0);
    } else {
        vx /= norm;
        vy /= norm;
    }
    let x = target.x + vx * standoff;
    let y = target.y + vy * standoff;
    Pose::planar(x, y, (-vy).atan2(-vx))
}

/// 置信度：底盘朝向与「指向目标方向」夹角的余弦，截断到 [0, 1]
pub fn approach_confidence(pose: &Pose, target: &Point) -> f64 {
    let dx = target.x - pose.position.x;
    let dy = target.y - pose.position.y;
    if dx.hypot(dy) < 1e-6 {
        return 0.0;
    }
    let bearing = dy.atan2(dx);
    (bearing - pose.yaw()).cos().clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_faces_target_from_robot_side() {
        let target = Point::new(1.0, 1.0, 0.8);
        let robot = Pose::planar(1.0, -2.0, 0.0);
        let pose = fallback_pose(&target, Some(&robot), 0.65);
        assert!((pose.position.x - 1.0).abs() < 1e-9);
        assert!((pose.position.y - 0.35).abs() < 1e-9);
        assert_eq!(pose.position.z, 0.0);
        assert!((pose.yaw() - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert!((approach_confidence(&pose, &target) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_without_robot_is_deterministic() {
        let target = Point::new(0.0, 0.0, 0.9);
        let a = fallback_pose(&target, None, 0.5);
        let b = fallback_pose(&target, Some(&Pose::planar(0.0, 0.0, 1.0)), 0.5);
        assert_eq!(a, b);
        assert!((a.position.x + 0.5).abs() < 1e-9);
        assert!(a.yaw().abs() < 1e-9);
    }

    #[test]
    fn test_confidence_zero_when_facing_away() {
        let pose = Pose::planar(0.0, 0.0, std::f64::consts::PI);
        assert_eq!(approach_confidence(&pose, &Point::new(1.0, 0.0, 0.9)), 0.0);
    }
}
