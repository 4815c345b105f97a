//! 可达手臂选择
//!
//! 手臂提示只要落在该臂的标称包络内就无条件采用；否则按启发式为两臂打分（距离余量 + 横向偏好），
//! 两臂连放宽后的包络都不含物体时返回 NoReachableArm。该错误不重试：不移动底盘，可达性不会改变。

use crate::backend::ArmIdentity;
use crate::config::ArmsSection;
use crate::core::OrchestratorError;
use crate::world::{Point, Pose};

/// 同侧偏好的加分（米当量）
const SIDE_PREFERENCE: f64 = 0.05;
/// 两臂得分差小于此值视为平局，平局取右臂
const TIE_TOLERANCE: f64 = 1e-6;

/// 单臂的近似可达包络（底盘坐标系）
#[derive(Debug, Clone)]
pub struct ReachEnvelope {
    shoulder_offset: f64,
    reach: f64,
    min_height: f64,
    max_height: f64,
    max_behind: f64,
}

impl ReachEnvelope {
    pub fn from_config(cfg: &ArmsSection) -> Self {
        Self {
            shoulder_offset: cfg.shoulder_offset_m,
            reach: cfg.reach_m,
            min_height: cfg.min_height_m,
            max_height: cfg.max_height_m,
            max_behind: cfg.max_behind_m,
        }
    }

    /// 放大 slack 比例后的包络
    fn loosened(&self, slack: f64) -> Self {
        Self {
            shoulder_offset: self.shoulder_offset,
            reach: self.reach * (1.0 + slack),
            min_height: self.min_height * (1.0 - slack),
            max_height: self.max_height * (1.0 + slack),
            max_behind: self.max_behind + slack * self.reach,
        }
    }

    /// 物体在包络内时返回水平可达余量（reach - 肩部距离），否则 None
    pub fn margin(&self, arm: ArmIdentity, forward: f64, left: f64, up: f64) -> Option<f64> {
        if forward < -self.max_behind || up < self.min_height || up > self.max_height {
            return None;
        }
        let shoulder_left = arm.side_sign() * self.shoulder_offset;
        let dist = forward.hypot(left - shoulder_left);
        (dist <= self.reach).then_some(self.reach - dist)
    }
}

#[derive(Debug, Clone)]
pub struct ArmSelector {
    nominal: ReachEnvelope,
    approximate: ReachEnvelope,
    side_deadband: f64,
}

impl ArmSelector {
    pub fn new(cfg: &ArmsSection) -> Self {
        let nominal = ReachEnvelope::from_config(cfg);
        let approximate = nominal.loosened(cfg.slack);
        Self { nominal, approximate, side_deadband: cfg.side_deadband_m }
    }

    /// 物体是否在某臂的标称包络内
    pub fn within_nominal(&self, arm: ArmIdentity, object: &Point, robot: &Pose) -> bool {
        let (f, l, u) = robot.to_local(object);
        self.nominal.margin(arm, f, l, u).is_some()
    }

    /// 近似可达的手臂，按得分从高到低
    pub fn reachable_arms(&self, object: &Point, robot: &Pose) -> Vec<ArmIdentity> {
        let (f, l, u) = robot.to_local(object);
        let mut scored: Vec<(ArmIdentity, f64)> = ArmIdentity::ALL
            .into_iter()
            .filter_map(|arm| self.score(arm, f, l, u).map(|s| (arm, s)))
            .collect();
        scored.sort_by(|a, b| {
            if (a.1 - b.1).abs() < TIE_TOLERANCE {
                // 平局时右臂在前
                a.0.side_sign().total_cmp(&b.0.side_sign())
            } else {
                b.1.total_cmp(&a.1)
            }
        });
        scored.into_iter().map(|(arm, _)| arm).collect()
    }

    fn score(&self, arm: ArmIdentity, forward: f64, left: f64, up: f64) -> Option<f64> {
        let margin = self.approximate.margin(arm, forward, left, up)?;
        let side = if left.abs() > self.side_deadband && left.signum() == arm.side_sign() {
            SIDE_PREFERENCE
        } else {
            0.0
        };
        Some(margin + side)
    }

    /// 选择手臂：可信的提示优先，其次自动选择
    pub fn select(
        &self,
        object: &Point,
        robot: &Pose,
        hint: Option<ArmIdentity>,
    ) -> Result<ArmIdentity, OrchestratorError> {
        if let Some(arm) = hint {
            if self.within_nominal(arm, object, robot) {
                tracing::debug!(%arm, "Using hinted arm");
                return Ok(arm);
            }
            tracing::warn!(%arm, "Hinted arm cannot reach object, selecting automatically");
        }

        self.reachable_arms(object, robot).first().copied().ok_or_else(|| {
            OrchestratorError::NoReachableArm(format!(
                "object at ({:.2}, {:.2}, {:.2}) is outside both arm envelopes",
                object.x, object.y, object.z
            ))
        })
    }
}
