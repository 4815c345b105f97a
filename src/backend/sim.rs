//! 仿真后端（用于演示与测试，无需真实机器人）
//!
//! 内存中的世界：导航直接把底盘移到目标位姿，抓取/放置改变物体归属与位置；
//! FaultPlan 注入失败，CallCounts 记录每种调用的次数。

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::backend::{ActuationBackend, ArmGroup, ArmIdentity, BackendError};
use crate::planning::pose_search::fallback_pose;
use crate::world::{ObjectHandle, Point, Pose, SurfaceCatalog, WorldObject, WorldSnapshot};

/// 采样器停在目标前方的距离
const SIM_STANDOFF: f64 = 0.55;

/// 接近位姿采样的行为
#[derive(Debug, Clone, Default)]
pub enum SearchBehavior {
    #[default]
    Immediate,
    /// 延迟后返回；期间响应取消
    Delay(Duration),
    /// 永不返回，也不理会取消令牌
    Hang,
    Fail,
}

/// 注入的失败
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    pub fail_navigate: bool,
    pub fail_grasp: bool,
    pub fail_place: bool,
    pub unavailable_on_grasp: bool,
    /// 前 N 次注视失败
    pub look_at_failures: u32,
    /// 前 N 次检测失败
    pub detect_failures: u32,
    /// 前 N 次快照读取成功，之后均失败
    pub fail_list_objects_after: Option<usize>,
    pub search: SearchBehavior,
}

/// 调用计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub navigate: usize,
    pub grasp: usize,
    pub place: usize,
    pub park_arms: usize,
    pub adjust_torso: usize,
    pub look_at: usize,
    pub detect: usize,
    pub search: usize,
    pub list_objects: usize,
}

#[derive(Default)]
struct Counters {
    navigate: AtomicUsize,
    grasp: AtomicUsize,
    place: AtomicUsize,
    park_arms: AtomicUsize,
    adjust_torso: AtomicUsize,
    look_at: AtomicUsize,
    detect: AtomicUsize,
    search: AtomicUsize,
    list_objects: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

struct SimState {
    robot: Pose,
    objects: Vec<WorldObject>,
    held: Option<(String, ArmIdentity)>,
    torso: f64,
}

pub struct SimulatedBackend {
    state: Mutex<SimState>,
    faults: FaultPlan,
    look_at_failures_left: AtomicU32,
    detect_failures_left: AtomicU32,
    surfaces: Option<SurfaceCatalog>,
    counters: Counters,
}

impl SimulatedBackend {
    pub fn new(robot: Pose) -> Self {
        Self {
            state: Mutex::new(SimState { robot, objects: Vec::new(), held: None, torso: 0.0 }),
            faults: FaultPlan::default(),
            look_at_failures_left: AtomicU32::new(0),
            detect_failures_left: AtomicU32::new(0),
            surfaces: None,
            counters: Counters::default(),
        }
    }

    /// 厨房场景：机器人在原点，早餐物品分布在台面上
    pub fn kitchen(surfaces: SurfaceCatalog) -> Self {
        let mut sim = Self::new(Pose::planar(0.0, 0.0, 0.0));
        let on = |surface: &str, dx: f64, dy: f64| -> Pose {
            let p = surfaces
                .get(surface)
                .map(|s| s.reference)
                .unwrap_or_default();
            Pose::at(Point::new(p.x + dx, p.y + dy, p.z + 0.05))
        };
        let objects = [
            WorldObject::new("cereal", "Cereal", on("kitchen_island_surface", 0.1, -0.3)),
            WorldObject::new("milk", "Milk", on("kitchen_island_surface", 0.1, 0.2)),
            WorldObject::new("bowl", "Bowl", on("table_area_main", 0.0, 0.1)),
            WorldObject::new("spoon", "Spoon", on("sink_area_surface", -0.1, 0.0)),
        ];
        for object in objects {
            sim = sim.with_object(object);
        }
        sim.with_surfaces(surfaces)
    }

    pub fn with_object(mut self, object: WorldObject) -> Self {
        self.state.get_mut().objects.push(object);
        self
    }

    pub fn with_surfaces(mut self, surfaces: SurfaceCatalog) -> Self {
        self.surfaces = Some(surfaces);
        self
    }

    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.look_at_failures_left = AtomicU32::new(faults.look_at_failures);
        self.detect_failures_left = AtomicU32::new(faults.detect_failures);
        self.faults = faults;
        self
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            navigate: c.navigate.load(Ordering::SeqCst),
            grasp: c.grasp.load(Ordering::SeqCst),
            place: c.place.load(Ordering::SeqCst),
            park_arms: c.park_arms.load(Ordering::SeqCst),
            adjust_torso: c.adjust_torso.load(Ordering::SeqCst),
            look_at: c.look_at.load(Ordering::SeqCst),
            detect: c.detect.load(Ordering::SeqCst),
            search: c.search.load(Ordering::SeqCst),
            list_objects: c.list_objects.load(Ordering::SeqCst),
        }
    }

    pub async fn torso_height(&self) -> f64 {
        self.state.lock().await.torso
    }

    pub async fn held_object(&self) -> Option<(String, ArmIdentity)> {
        self.state.lock().await.held.clone()
    }

    async fn approach_for(&self, target: Point) -> Pose {
        let robot = self.state.lock().await.robot;
        fallback_pose(&target, Some(&robot), SIM_STANDOFF)
    }
}

/// 剩余失败次数大于 0 时消耗一次并返回 true
fn consume_failure(left: &AtomicU32) -> bool {
    left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

#[async_trait]
impl WorldSnapshot for SimulatedBackend {
    async fn list_objects(&self) -> Result<Vec<WorldObject>, BackendError> {
        let n = self.counters.list_objects.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_list_objects_after.is_some_and(|limit| n >= limit) {
            return Err(BackendError::ExecutionFailed("world snapshot unavailable".into()));
        }
        Ok(self.state.lock().await.objects.clone())
    }

    async fn robot_pose(&self) -> Result<Pose, BackendError> {
        Ok(self.state.lock().await.robot)
    }
}

#[async_trait]
impl ActuationBackend for SimulatedBackend {
    async fn navigate(&self, pose: &Pose) -> Result<(), BackendError> {
        bump(&self.counters.navigate);
        if self.faults.fail_navigate {
            return Err(BackendError::ExecutionFailed("navigation goal not reached".into()));
        }
        self.state.lock().await.robot = *pose;
        Ok(())
    }

    async fn grasp(&self, object: &ObjectHandle, arm: ArmIdentity) -> Result<(), BackendError> {
        bump(&self.counters.grasp);
        if self.faults.unavailable_on_grasp {
            return Err(BackendError::Unavailable("simulation stopped responding".into()));
        }
        if self.faults.fail_grasp {
            return Err(BackendError::ExecutionFailed(format!("object '{object}' not grasped")));
        }
        let mut state = self.state.lock().await;
        if !state.objects.iter().any(|o| o.name == object.name()) {
            return Err(BackendError::ExecutionFailed(format!("object '{object}' does not exist")));
        }
        state.held = Some((object.name().to_string(), arm));
        Ok(())
    }

    async fn place(
        &self,
        object: &ObjectHandle,
        arm: ArmIdentity,
        pose: &Pose,
    ) -> Result<(), BackendError> {
        bump(&self.counters.place);
        if self.faults.fail_place {
            return Err(BackendError::ExecutionFailed("place pose unreachable".into()));
        }
        let mut state = self.state.lock().await;
        match &state.held {
            Some((name, held_arm)) if name == object.name() && *held_arm == arm => {}
            _ => {
                return Err(BackendError::ExecutionFailed(format!(
                    "'{object}' is not held by the {arm} arm"
                )))
            }
        }
        state.held = None;
        if let Some(o) = state.objects.iter_mut().find(|o| o.name == object.name()) {
            o.pose = *pose;
        }
        Ok(())
    }

    async fn park_arms(&self, _arms: ArmGroup) -> Result<(), BackendError> {
        bump(&self.counters.park_arms);
        Ok(())
    }

    async fn adjust_torso(&self, height: f64) -> Result<(), BackendError> {
        bump(&self.counters.adjust_torso);
        self.state.lock().await.torso = height;
        Ok(())
    }

    async fn look_at(&self, object: &ObjectHandle) -> Result<(), BackendError> {
        bump(&self.counters.look_at);
        if consume_failure(&self.look_at_failures_left) {
            return Err(BackendError::ExecutionFailed(format!("look-at goal '{object}' not reached")));
        }
        Ok(())
    }

    async fn detect(&self, object: &ObjectHandle, region: Option<&str>) -> Result<(), BackendError> {
        bump(&self.counters.detect);
        if consume_failure(&self.detect_failures_left) {
            return Err(BackendError::ExecutionFailed(format!("'{object}' not perceived")));
        }
        let state = self.state.lock().await;
        let found = state.objects.iter().find(|o| o.name == object.name());
        let visible = match (found, region, &self.surfaces) {
            (None, _, _) => false,
            (Some(o), Some(region), Some(surfaces)) => {
                surfaces.get(region).map(|s| s.supports(o)).unwrap_or(false)
            }
            (Some(_), _, _) => true,
        };
        if visible {
            Ok(())
        } else {
            Err(BackendError::ExecutionFailed(format!("'{object}' not perceived")))
        }
    }

    async fn search_approach_pose(
        &self,
        target: Point,
        cancel: CancellationToken,
    ) -> Result<Pose, BackendError> {
        bump(&self.counters.search);
        match &self.faults.search {
            SearchBehavior::Immediate => Ok(self.approach_for(target).await),
            SearchBehavior::Delay(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(*delay) => Ok(self.approach_for(target).await),
                    _ = cancel.cancelled() => Err(BackendError::Cancelled),
                }
            }
            SearchBehavior::Hang => std::future::pending().await,
            SearchBehavior::Fail => {
                Err(BackendError::ExecutionFailed("costmap has no valid samples".into()))
            }
        }
    }
}
