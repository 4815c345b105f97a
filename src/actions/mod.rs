//! 机器人直接命令与只读世界查询
//!
//! 命令（注视、检测、移动、躯干、收臂）会驱动机器人，必须经由意图队列串行执行；
//! 查询只读快照，可随时调用。

use std::sync::Arc;

use serde::Serialize;

use crate::backend::{ArmGroup, Backend, BackendError, TorsoLevel};
use crate::config::AppConfig;
use crate::core::actuator::Actuator;
use crate::core::OrchestratorError;
use crate::perception::with_retry;
use crate::world::{
    ObjectResolver, Point, Pose, Quaternion, SurfaceCatalog, WorldBounds, WorldObject,
};

/// 距离查询时跳过的结构性物体（名字包含这些词）
const STRUCTURAL: [&str; 4] = ["floor", "wall", "kitchen", "robot"];

/// 单条命令的执行报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub detail: String,
}

impl CommandReport {
    fn new(command: &str, detail: impl Into<String>) -> Self {
        Self { command: command.to_string(), detail: detail.into() }
    }
}

/// 到某物体的距离
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDistance {
    pub name: String,
    pub distance: f64,
}

#[derive(Clone)]
pub struct RobotCommands {
    actuator: Actuator,
    resolver: ObjectResolver,
    surfaces: SurfaceCatalog,
    bounds: WorldBounds,
    torso_low: f64,
    torso_high: f64,
    perception_attempts: u32,
}

impl RobotCommands {
    pub fn new(backend: Arc<dyn Backend>, cfg: &AppConfig) -> Self {
        Self {
            actuator: Actuator::new(backend),
            resolver: ObjectResolver::new(),
            surfaces: SurfaceCatalog::from_config(&cfg.surfaces),
            bounds: cfg.world.bounds(),
            torso_low: cfg.orchestrator.torso_rest_height,
            torso_high: cfg.orchestrator.torso_working_height,
            perception_attempts: cfg.perception.max_attempts,
        }
    }

    fn backend(&self) -> &Arc<dyn Backend> {
        self.actuator.backend()
    }

    pub async fn look_at(&self, object: &str) -> Result<CommandReport, OrchestratorError> {
        let (target, _) = self.resolver.resolve_current(&**self.backend(), object).await?;
        let handle = target.handle();
        let actuator = &self.actuator;
        let target_ref = &handle;
        with_retry(self.perception_attempts, || actuator.look_at(target_ref))
            .await
            .map_err(|e| perception_error(&handle.0, e))?;
        Ok(CommandReport::new("look_at", format!("looking at '{handle}'")))
    }

    pub async fn detect(
        &self,
        object: &str,
        surface: Option<&str>,
    ) -> Result<CommandReport, OrchestratorError> {
        let (target, _) = self.resolver.resolve_current(&**self.backend(), object).await?;
        let region = match surface {
            Some(name) => Some(
                self.surfaces
                    .get(name)
                    .map(|s| s.name.clone())
                    .ok_or_else(|| {
                        OrchestratorError::DestinationUnresolved(format!("unknown surface '{name}'"))
                    })?,
            ),
            None => None,
        };
        let handle = target.handle();
        let actuator = &self.actuator;
        let (target_ref, region_ref) = (&handle, region.as_deref());
        with_retry(self.perception_attempts, || actuator.detect(target_ref, region_ref))
            .await
            .map_err(|e| perception_error(&handle.0, e))?;
        let detail = match &region {
            Some(r) => format!("'{handle}' detected on '{r}'"),
            None => format!("'{handle}' detected"),
        };
        Ok(CommandReport::new("detect", detail))
    }

    /// 移动到平面点，保持当前朝向
    pub async fn move_robot(&self, point: Point) -> Result<CommandReport, OrchestratorError> {
        let current = self.backend().robot_pose().await?;
        let goal = self.ground_pose(point, current.orientation)?;
        self.navigate(&goal).await?;
        Ok(CommandReport::new(
            "move_robot",
            format!("moved to ({:.2}, {:.2})", goal.position.x, goal.position.y),
        ))
    }

    /// 移动和/或旋转；缺省的部分保持当前位姿
    pub async fn move_and_rotate(
        &self,
        point: Option<Point>,
        yaw_degrees: Option<f64>,
    ) -> Result<CommandReport, OrchestratorError> {
        let current = self.backend().robot_pose().await?;
        let orientation = match yaw_degrees {
            Some(yaw) => Quaternion::from_euler_degrees(0.0, 0.0, yaw),
            None => current.orientation,
        };
        let goal = self.ground_pose(point.unwrap_or(current.position), orientation)?;
        self.navigate(&goal).await?;
        Ok(CommandReport::new(
            "move_and_rotate",
            format!(
                "at ({:.2}, {:.2}) facing {:.1} deg",
                goal.position.x,
                goal.position.y,
                goal.yaw().to_degrees()
            ),
        ))
    }

    pub async fn move_torso(&self, level: TorsoLevel) -> Result<CommandReport, OrchestratorError> {
        let height = match level {
            TorsoLevel::Low => self.torso_low,
            TorsoLevel::High => self.torso_high,
        };
        self.actuator.adjust_torso(height).await?;
        Ok(CommandReport::new("move_torso", format!("torso at {height:.2} m")))
    }

    pub async fn park_arms(&self, arms: ArmGroup) -> Result<CommandReport, OrchestratorError> {
        self.actuator.park_arms(arms).await?;
        Ok(CommandReport::new("park_arms", format!("{arms:?} parked").to_lowercase()))
    }

    pub async fn object_exists(&self, name: &str) -> Result<bool, OrchestratorError> {
        let objects = self.backend().list_objects().await?;
        match self.resolver.resolve(&objects, name) {
            Ok(_) => Ok(true),
            Err(OrchestratorError::ObjectNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 类型忽略大小写，按名字排序
    pub async fn objects_of_type(&self, object_type: &str) -> Result<Vec<WorldObject>, OrchestratorError> {
        let wanted = object_type.to_lowercase();
        let mut objects: Vec<WorldObject> = self
            .backend()
            .list_objects()
            .await?
            .into_iter()
            .filter(|o| o.object_type.to_lowercase() == wanted)
            .collect();
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    pub async fn objects_on_surface(&self, surface: &str) -> Result<Vec<WorldObject>, OrchestratorError> {
        let surface = self.surfaces.get(surface).ok_or_else(|| {
            OrchestratorError::DestinationUnresolved(format!("unknown surface '{surface}'"))
        })?;
        let mut objects: Vec<WorldObject> = self
            .backend()
            .list_objects()
            .await?
            .into_iter()
            .filter(|o| surface.supports(o))
            .collect();
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    /// 从 source 到其他每个物体的欧氏距离，由近到远
    pub async fn object_distances(&self, source: &str) -> Result<Vec<ObjectDistance>, OrchestratorError> {
        let objects = self.backend().list_objects().await?;
        let origin = self.resolver.resolve(&objects, source)?.object;
        let mut distances: Vec<ObjectDistance> = objects
            .iter()
            .filter(|o| o.name != origin.name && !is_structural(&o.name))
            .map(|o| ObjectDistance {
                name: o.name.clone(),
                distance: origin.pose.position.distance(&o.pose.position),
            })
            .collect();
        distances.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(distances)
    }

    fn ground_pose(&self, point: Point, orientation: Quaternion) -> Result<Pose, OrchestratorError> {
        let position = Point::new(point.x, point.y, 0.0);
        if !self.bounds.contains(&position) {
            return Err(OrchestratorError::DestinationUnresolved(format!(
                "point ({:.3}, {:.3}) is outside the world bounds",
                point.x, point.y
            )));
        }
        Ok(Pose { position, orientation })
    }

    async fn navigate(&self, goal: &Pose) -> Result<(), OrchestratorError> {
        self.actuator.navigate(goal).await.map_err(|e| match e {
            BackendError::ExecutionFailed(msg) => OrchestratorError::NavigationFailed(msg),
            other => other.into(),
        })
    }
}

fn is_structural(name: &str) -> bool {
    let name = name.to_lowercase();
    STRUCTURAL.iter().any(|s| name.contains(s))
}

fn perception_error(object: &str, err: BackendError) -> OrchestratorError {
    match err {
        BackendError::ExecutionFailed(msg) => {
            OrchestratorError::PerceptionFailed(format!("'{object}': {msg}"))
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FaultPlan, SimulatedBackend};
    use crate::core::ErrorKind;
    use crate::world::WorldSnapshot;

    fn kitchen(faults: FaultPlan) -> (Arc<SimulatedBackend>, RobotCommands) {
        let cfg = AppConfig::default();
        let backend = Arc::new(
            SimulatedBackend::kitchen(SurfaceCatalog::from_config(&cfg.surfaces))
                .with_object(WorldObject::new("kitchen_floor", "Floor", Pose::default()))
                .with_faults(faults),
        );
        let commands = RobotCommands::new(backend.clone(), &cfg);
        (backend, commands)
    }

    #[tokio::test]
    async fn test_look_at_retries_once() {
        let (backend, commands) = kitchen(FaultPlan { look_at_failures: 1, ..Default::default() });
        let report = commands.look_at("Cereal").await.unwrap();
        assert_eq!(report.command, "look_at");
        assert_eq!(backend.calls().look_at, 2);
    }

    #[tokio::test]
    async fn test_detect_fails_after_retries() {
        let (backend, commands) = kitchen(FaultPlan { detect_failures: 5, ..Default::default() });
        let err = commands.detect("milk", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PerceptionFailed);
        assert_eq!(backend.calls().detect, 2);
    }

    #[tokio::test]
    async fn test_detect_on_wrong_surface() {
        let (_, commands) = kitchen(FaultPlan::default());
        assert!(commands.detect("cereal", Some("kitchen_island_surface")).await.is_ok());
        let err = commands.detect("cereal", Some("kitchen_island_stove")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PerceptionFailed);
        let err = commands.detect("cereal", Some("attic")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DestinationUnresolved);
    }

    #[tokio::test]
    async fn test_move_robot_keeps_orientation() {
        let (backend, commands) = kitchen(FaultPlan::default());
        commands.move_and_rotate(None, Some(90.0)).await.unwrap();
        commands.move_robot(Point::new(1.0, -0.5, 0.0)).await.unwrap();
        let pose = backend.robot_pose().await.unwrap();
        assert!((pose.position.x - 1.0).abs() < 1e-9);
        assert!((pose.yaw() - std::f64::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_move_outside_world_is_rejected() {
        let (backend, commands) = kitchen(FaultPlan::default());
        let err = commands.move_robot(Point::new(50.0, 0.0, 0.0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DestinationUnresolved);
        assert_eq!(backend.calls().navigate, 0);
    }

    #[tokio::test]
    async fn test_move_torso_levels() {
        let (backend, commands) = kitchen(FaultPlan::default());
        commands.move_torso(TorsoLevel::High).await.unwrap();
        assert!((backend.torso_height().await - 0.3).abs() < 1e-9);
        commands.move_torso(TorsoLevel::Low).await.unwrap();
        assert!(backend.torso_height().await.abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_queries() {
        let (_, commands) = kitchen(FaultPlan::default());
        assert!(commands.object_exists("MILK").await.unwrap());
        assert!(!commands.object_exists("plate").await.unwrap());

        let cereals = commands.objects_of_type("cereal").await.unwrap();
        assert_eq!(cereals.len(), 1);

        let on_island: Vec<String> = commands
            .objects_on_surface("kitchen_island_surface")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(on_island, vec!["cereal".to_string(), "milk".to_string()]);
    }

    #[tokio::test]
    async fn test_distances_skip_structural_objects() {
        let (_, commands) = kitchen(FaultPlan::default());
        let distances = commands.object_distances("cereal").await.unwrap();
        let names: Vec<&str> = distances.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert_eq!(names[0], "milk");
        assert!(!names.contains(&"kitchen_floor"));
        assert!(!names.contains(&"cereal"));
        assert!(distances.windows(2).all(|w| w[0].distance <= w[1].distance));
    }
}
