//! 操作任务编排器：抓取-放置状态机
//!
//! PREPARE -> NAVIGATE_PICK -> EXECUTE_PICK -> NAVIGATE_PLACE -> EXECUTE_PLACE -> PARK -> DONE，
//! 任意阶段都可进入 FAILED。阶段严格按序执行；取消只在阶段边界生效。
//! 解析类错误在任何物理动作之前失败；物理动作开始后的失败仍会收臂清理；后端不可用时立即中止且不再发命令。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::{ArmGroup, ArmIdentity, Backend, BackendError};
use crate::config::{AppConfig, OrchestratorSection};
use crate::core::actuator::Actuator;
use crate::core::recovery::{Disposition, RecoveryPolicy};
use crate::core::state::{Failure, ManipulationIntent, ManipulationOutcome, OutcomeWarning, Phase};
use crate::core::{ErrorKind, OrchestratorError};
use crate::perception::with_retry;
use crate::planning::{ArmSelector, BoundedPoseSearch, PoseSearchResult};
use crate::world::{ObjectResolver, Point, Pose, SurfaceCatalog, WorldBounds};

/// 状态机提前结束的方式
#[derive(Debug)]
enum Stop {
    /// 进入 FAILED；若已有物理动作则收臂清理
    Fail(OrchestratorError),
    /// 后端不可用：不再发任何命令
    Abort(OrchestratorError),
}

impl From<OrchestratorError> for Stop {
    fn from(err: OrchestratorError) -> Self {
        match err.kind() {
            ErrorKind::BackendUnavailable => Stop::Abort(err),
            _ => Stop::Fail(err),
        }
    }
}

impl From<BackendError> for Stop {
    fn from(err: BackendError) -> Self {
        OrchestratorError::from(err).into()
    }
}

/// 单个意图的运行记录
struct Run {
    id: Uuid,
    started_at: i64,
    object: String,
    arm: Option<ArmIdentity>,
    destination: Option<Point>,
    phases: Vec<Phase>,
    warnings: Vec<OutcomeWarning>,
    /// 是否已向后端发出过物理动作
    physical: bool,
}

impl Run {
    fn new(intent: &ManipulationIntent) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: chrono::Utc::now().timestamp_millis(),
            object: intent.object.clone(),
            arm: None,
            destination: None,
            phases: Vec::new(),
            warnings: Vec::new(),
            physical: false,
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::info!(intent = %self.id, phase = ?phase, object = %self.object, "Entering phase");
        self.phases.push(phase);
    }

    fn current(&self) -> Phase {
        self.phases.last().copied().unwrap_or(Phase::Prepare)
    }

    fn warn(&mut self, kind: Option<ErrorKind>, detail: String) {
        let phase = self.current();
        tracing::warn!(intent = %self.id, phase = ?phase, kind = ?kind, "{}", detail);
        self.warnings.push(OutcomeWarning { phase, kind, detail });
    }
}

/// 编排器：对外只暴露 execute
pub struct Orchestrator {
    backend: Arc<dyn Backend>,
    actuator: Actuator,
    resolver: ObjectResolver,
    arms: ArmSelector,
    pose_search: BoundedPoseSearch,
    surfaces: SurfaceCatalog,
    recovery: RecoveryPolicy,
    bounds: WorldBounds,
    settings: OrchestratorSection,
    search_budget: Duration,
    perception_attempts: u32,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn Backend>, cfg: &AppConfig) -> Self {
        let bounds = cfg.world.bounds();
        Self {
            actuator: Actuator::new(backend.clone()),
            resolver: ObjectResolver::new(),
            arms: ArmSelector::new(&cfg.arms),
            pose_search: BoundedPoseSearch::new(backend.clone(), bounds, &cfg.pose_search),
            surfaces: SurfaceCatalog::from_config(&cfg.surfaces),
            recovery: RecoveryPolicy::new(),
            bounds,
            settings: cfg.orchestrator.clone(),
            search_budget: cfg.pose_search.budget(),
            perception_attempts: cfg.perception.max_attempts,
            backend,
        }
    }

    pub fn surfaces(&self) -> &SurfaceCatalog {
        &self.surfaces
    }

    /// 执行一个操作意图，总是返回终止记录
    pub async fn execute(&self, intent: ManipulationIntent) -> ManipulationOutcome {
        self.execute_with_cancel(intent, CancellationToken::new()).await
    }

    /// 同 execute，调用方可在阶段边界取消
    pub async fn execute_with_cancel(
        &self,
        intent: ManipulationIntent,
        cancel: CancellationToken,
    ) -> ManipulationOutcome {
        let mut run = Run::new(&intent);
        let result = self.drive(&intent, &cancel, &mut run).await;

        let (failure, cleanup_parked, aborted) = match result {
            Ok(()) => {
                run.enter(Phase::Park);
                self.park(&mut run).await;
                (None, false, false)
            }
            Err(Stop::Fail(err)) => {
                tracing::warn!(intent = %run.id, phase = ?run.current(), error = %err, "Intent failed");
                let parked = if run.physical {
                    self.park(&mut run).await;
                    true
                } else {
                    false
                };
                (Some(err), parked, false)
            }
            Err(Stop::Abort(err)) => {
                tracing::error!(intent = %run.id, phase = ?run.current(), error = %err, "Backend unavailable, aborting without cleanup");
                (Some(err), false, true)
            }
        };

        let final_object_pose = if aborted { None } else { self.object_pose(&run.object).await };
        let terminal = if failure.is_some() { Phase::Failed } else { Phase::Done };
        tracing::info!(intent = %run.id, terminal = ?terminal, arm = ?run.arm, "Intent finished");

        ManipulationOutcome {
            intent_id: run.id,
            object: run.object.clone(),
            arm_used: run.arm,
            destination: run.destination,
            final_object_pose,
            terminal,
            phase_reached: if terminal == Phase::Done { Phase::Done } else { run.current() },
            phases_completed: run.phases,
            cleanup_parked,
            failure: failure.map(|e| Failure { kind: e.kind(), message: e.detail() }),
            warnings: run.warnings,
            started_at: run.started_at,
            finished_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    async fn drive(
        &self,
        intent: &ManipulationIntent,
        cancel: &CancellationToken,
        run: &mut Run,
    ) -> Result<(), Stop> {
        // PREPARE：先做纯查询，再做物理准备
        run.enter(Phase::Prepare);
        let objects = self.backend.list_objects().await?;
        let resolution = self.resolver.resolve(&objects, &intent.object)?;
        if resolution.is_ambiguous() {
            run.warn(
                None,
                format!(
                    "'{}' matched several objects, using '{}'",
                    intent.object, resolution.object.name
                ),
            );
        }
        let object = resolution.object.clone();
        run.object = object.name.clone();
        let destination = self.surfaces.resolve(&intent.destination, &self.bounds)?;
        run.destination = Some(destination);

        checkpoint(cancel)?;
        run.physical = true;
        if let Err(e) = self.actuator.park_arms(ArmGroup::Both).await {
            self.on_error(run, e)?;
        }
        if let Err(e) = self.actuator.adjust_torso(self.settings.torso_working_height).await {
            self.on_error(run, e)?;
        }

        checkpoint(cancel)?;
        run.enter(Phase::NavigatePick);
        self.approach(run, object.pose.position).await?;

        checkpoint(cancel)?;
        run.enter(Phase::ExecutePick);
        // 导航期间物理仿真可能改变了快照，重新读取物体与机器人位姿
        let (object, _) = self.resolver.resolve_current(&*self.backend, &object.name).await?;
        let robot = self.backend.robot_pose().await?;
        let arm = self.arms.select(&object.pose.position, &robot, intent.arm)?;
        run.arm = Some(arm);
        let handle = object.handle();

        if self.settings.reacquire_before_grasp {
            let actuator = &self.actuator;
            let target = &handle;
            if let Err(e) = with_retry(self.perception_attempts, || actuator.look_at(target)).await {
                match e {
                    BackendError::Unavailable(msg) => {
                        return Err(Stop::Abort(OrchestratorError::BackendUnavailable(msg)))
                    }
                    other => run.warn(
                        Some(ErrorKind::PerceptionFailed),
                        format!("could not re-acquire '{}': {}", handle, other),
                    ),
                }
            }
        }

        if let Err(e) = self.actuator.grasp(&handle, arm).await {
            self.on_error(run, e)?;
        }
        if !self.settings.settle_delay().is_zero() {
            tokio::time::sleep(self.settings.settle_delay()).await;
        }

        checkpoint(cancel)?;
        run.enter(Phase::NavigatePlace);
        self.approach(run, destination).await?;

        checkpoint(cancel)?;
        run.enter(Phase::ExecutePlace);
        // 放置沿用抓取阶段的手臂
        if let Err(e) = self.actuator.place(&handle, arm, &Pose::at(destination)).await {
            self.on_error(run, e)?;
        }

        Ok(())
    }

    /// 搜索接近位姿并导航；找到的位姿与回退位姿都接受，导航失败只记警告
    async fn approach(&self, run: &mut Run, target: Point) -> Result<(), Stop> {
        let pose = match self.pose_search.find_approach_pose(target, self.search_budget).await {
            PoseSearchResult::Found { pose, confidence } => {
                tracing::debug!(intent = %run.id, confidence, "Approach pose found");
                pose
            }
            PoseSearchResult::FallbackUsed { pose, reason } => {
                run.warn(
                    Some(ErrorKind::PoseSearchFallbackUsed),
                    OrchestratorError::PoseSearchFallbackUsed(reason.to_string()).to_string(),
                );
                pose
            }
            PoseSearchResult::NotFound { reason } => {
                return Err(Stop::Fail(OrchestratorError::NoApproachPose(reason)))
            }
        };

        if let Err(e) = self.actuator.navigate(&pose).await {
            self.on_error(run, e)?;
        }
        Ok(())
    }

    /// 收臂清理（尽力而为），按配置降低躯干；失败不改变已确定的结果
    async fn park(&self, run: &mut Run) {
        match self.actuator.park_arms(ArmGroup::Both).await {
            Ok(()) => {}
            Err(BackendError::Unavailable(msg)) => {
                run.warn(Some(ErrorKind::BackendUnavailable), format!("park skipped: {msg}"));
                return;
            }
            Err(e) => run.warn(None, format!("park arms failed: {e}")),
        }
        if self.settings.lower_torso_on_finish {
            if let Err(e) = self.actuator.adjust_torso(self.settings.torso_rest_height).await {
                run.warn(None, format!("lower torso failed: {e}"));
            }
        }
    }

    fn on_error(&self, run: &mut Run, err: BackendError) -> Result<(), Stop> {
        match self.recovery.handle(run.current(), err) {
            Disposition::Continue(e) => {
                run.warn(Some(e.kind()), e.to_string());
                Ok(())
            }
            Disposition::BestEffort(msg) => {
                run.warn(None, msg);
                Ok(())
            }
            Disposition::Fail(e) => Err(Stop::Fail(e)),
            Disposition::Abort(e) => Err(Stop::Abort(e)),
        }
    }

    async fn object_pose(&self, name: &str) -> Option<Pose> {
        let objects = self.backend.list_objects().await.ok()?;
        objects.into_iter().find(|o| o.name == name).map(|o| o.pose)
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), Stop> {
    if cancel.is_cancelled() {
        Err(Stop::Fail(OrchestratorError::Cancelled))
    } else {
        Ok(())
    }
}
