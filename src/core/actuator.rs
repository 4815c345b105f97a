//! 执行器：对后端的每次调用计时并输出结构化审计日志（JSON）
//!
//! 不施加额外超时：导航与抓取的阻塞时长由后端决定，当前调用总是执行完毕后才处理取消。

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::backend::{ArmGroup, ArmIdentity, Backend, BackendError};
use crate::world::{ObjectHandle, Pose};

#[derive(Clone)]
pub struct Actuator {
    backend: Arc<dyn Backend>,
}

impl Actuator {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub async fn navigate(&self, pose: &Pose) -> Result<(), BackendError> {
        audited("navigate", self.backend.navigate(pose)).await
    }

    pub async fn grasp(&self, object: &ObjectHandle, arm: ArmIdentity) -> Result<(), BackendError> {
        audited("grasp", self.backend.grasp(object, arm)).await
    }

    pub async fn place(
        &self,
        object: &ObjectHandle,
        arm: ArmIdentity,
        pose: &Pose,
    ) -> Result<(), BackendError> {
        audited("place", self.backend.place(object, arm, pose)).await
    }

    pub async fn park_arms(&self, arms: ArmGroup) -> Result<(), BackendError> {
        audited("park_arms", self.backend.park_arms(arms)).await
    }

    pub async fn adjust_torso(&self, height: f64) -> Result<(), BackendError> {
        audited("adjust_torso", self.backend.adjust_torso(height)).await
    }

    pub async fn look_at(&self, object: &ObjectHandle) -> Result<(), BackendError> {
        audited("look_at", self.backend.look_at(object)).await
    }

    pub async fn detect(&self, object: &ObjectHandle, region: Option<&str>) -> Result<(), BackendError> {
        audited("detect", self.backend.detect(object, region)).await
    }
}

/// 执行一次后端调用并输出审计日志
pub async fn audited<T, Fut>(call: &'static str, fut: Fut) -> Result<T, BackendError>
where
    Fut: Future<Output = Result<T, BackendError>>,
{
    let start = Instant::now();
    let result = fut.await;

    let (ok, outcome): (bool, &str) = match &result {
        Ok(_) => (true, "ok"),
        Err(BackendError::ExecutionFailed(_)) => (false, "failed"),
        Err(BackendError::Unavailable(_)) => (false, "unavailable"),
        Err(BackendError::Cancelled) => (false, "cancelled"),
    };
    let duration_ms = start.elapsed().as_millis() as u64;
    let audit = serde_json::json!({
        "event": "backend_audit",
        "call": call,
        "ok": ok,
        "outcome": outcome,
        "duration_ms": duration_ms,
    });
    tracing::info!(audit = %audit.to_string(), "backend");

    result
}
