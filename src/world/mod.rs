//! 世界模型：位姿、物体与只读世界快照
//!
//! 物体由后端创建与销毁，编排器只在单条命令期间借用快照中的物体；
//! 快照可能在任意阻塞调用之间被物理仿真改变，因此每个阶段都重新读取。

pub mod resolver;
pub mod surfaces;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::BackendError;

pub use resolver::{ObjectResolver, Resolution};
pub use surfaces::{Destination, NamedSurface, PlanarOffset, SurfaceCatalog};

/// 三维点（米）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    /// 水平面（XY）距离
    pub fn planar_distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<[f64; 3]> for Point {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// 四元数 [x, y, z, w]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// 仅绕 Z 轴旋转（弧度）
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw / 2.0;
        Self { x: 0.0, y: 0.0, z: half.sin(), w: half.cos() }
    }

    /// 欧拉角（xyz 外旋，角度制）转四元数；与底盘旋转命令的约定一致
    pub fn from_euler_degrees(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (r, p, y) = (roll.to_radians() / 2.0, pitch.to_radians() / 2.0, yaw.to_radians() / 2.0);
        let (sr, cr) = r.sin_cos();
        let (sp, cp) = p.sin_cos();
        let (sy, cy) = y.sin_cos();
        Self {
            x: sr * cp * cy - cr * sp * sy,
            y: cr * sp * cy + sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
            w: cr * cp * cy + sr * sp * sy,
        }
    }

    /// 航向角（弧度，范围 [-π, π]）
    pub fn yaw(&self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }
}

/// 位姿：位置 + 朝向；值类型，构造后不可变
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

impl Pose {
    pub const fn new(position: Point, orientation: Quaternion) -> Self {
        Self { position, orientation }
    }

    pub fn at(position: Point) -> Self {
        Self { position, orientation: Quaternion::IDENTITY }
    }

    /// 底盘位姿：位于 (x, y) 地面，朝向 yaw
    pub fn planar(x: f64, y: f64, yaw: f64) -> Self {
        Self { position: Point::new(x, y, 0.0), orientation: Quaternion::from_yaw(yaw) }
    }

    pub fn yaw(&self) -> f64 {
        self.orientation.yaw()
    }

    /// 将世界坐标点变换到本位姿的局部坐标系：返回 (前向, 左向, 高度)
    pub fn to_local(&self, point: &Point) -> (f64, f64, f64) {
        let dx = point.x - self.position.x;
        let dy = point.y - self.position.y;
        let (s, c) = self.yaw().sin_cos();
        (c * dx + s * dy, -s * dx + c * dy, point.z - self.position.z)
    }
}

/// 物体句柄：向后端发命令时引用物体的名字（世界内唯一）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub String);

impl ObjectHandle {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 快照中的一个物体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldObject {
    pub name: String,
    /// 语义类型（Cereal、Milk、Bowl 等，由后端本体定义）
    pub object_type: String,
    pub pose: Pose,
}

impl WorldObject {
    pub fn new(name: impl Into<String>, object_type: impl Into<String>, pose: Pose) -> Self {
        Self { name: name.into(), object_type: object_type.into(), pose }
    }

    pub fn handle(&self) -> ObjectHandle {
        ObjectHandle(self.name.clone())
    }
}

/// 世界的轴对齐边界；落在其外的目标点在结构上无效
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub min: Point,
    pub max: Point,
}

impl WorldBounds {
    pub fn contains(&self, p: &Point) -> bool {
        (self.min.x..=self.max.x).contains(&p.x)
            && (self.min.y..=self.max.y).contains(&p.y)
            && (self.min.z..=self.max.z).contains(&p.z)
    }
}

/// 世界快照访问器（由外部后端提供，只读）
#[async_trait]
pub trait WorldSnapshot: Send + Sync {
    async fn list_objects(&self) -> Result<Vec<WorldObject>, BackendError>;

    async fn robot_pose(&self) -> Result<Pose, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_yaw_roundtrip_through_quaternion() {
        for yaw in [0.0, 0.5, std::f64::consts::FRAC_PI_2, -2.0, 3.0] {
            assert!((Quaternion::from_yaw(yaw).yaw() - yaw).abs() < EPS);
        }
    }

    #[test]
    fn test_euler_yaw_90_degrees() {
        let q = Quaternion::from_euler_degrees(0.0, 0.0, 90.0);
        assert!((q.z - std::f64::consts::FRAC_1_SQRT_2).abs() < EPS);
        assert!((q.w - std::f64::consts::FRAC_1_SQRT_2).abs() < EPS);
        assert!(q.x.abs() < EPS && q.y.abs() < EPS);
    }

    #[test]
    fn test_to_local_left_is_positive() {
        // 机器人朝向 +Y，世界 -X 方向在其左侧
        let robot = Pose::planar(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let (forward, left, up) = robot.to_local(&Point::new(-1.0, 0.0, 0.8));
        assert!(forward.abs() < EPS);
        assert!((left - 1.0).abs() < EPS);
        assert!((up - 0.8).abs() < EPS);
    }

    #[test]
    fn test_bounds_contains() {
        let bounds = WorldBounds { min: Point::new(-1.0, -1.0, 0.0), max: Point::new(1.0, 1.0, 2.0) };
        assert!(bounds.contains(&Point::new(0.5, -0.5, 1.0)));
        assert!(!bounds.contains(&Point::new(1.5, 0.0, 1.0)));
        assert!(!bounds.contains(&Point::new(0.0, 0.0, -0.1)));
    }
}
