//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ROBO__*` 覆盖（双下划线表示嵌套，如 `ROBO__POSE_SEARCH__BUDGET_MS=8000`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::world::{NamedSurface, Point, WorldBounds};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub orchestrator: OrchestratorSection,
    pub pose_search: PoseSearchSection,
    pub perception: PerceptionSection,
    pub arms: ArmsSection,
    pub world: WorldSection,
    pub surfaces: SurfacesSection,
    pub queue: QueueSection,
}

/// [orchestrator] 段：状态机的准备/收尾参数
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    /// 准备阶段躯干升到的工作高度（米）
    #[serde(default = "default_torso_working_height")]
    pub torso_working_height: f64,
    #[serde(default = "default_torso_rest_height")]
    pub torso_rest_height: f64,
    /// 收臂后是否把躯干降回休息高度
    #[serde(default = "default_true")]
    pub lower_torso_on_finish: bool,
    /// 抓取前是否先注视物体重新确认
    #[serde(default = "default_true")]
    pub reacquire_before_grasp: bool,
    /// 抓取后等待仿真状态刷新（毫秒）
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_torso_working_height() -> f64 {
    0.3
}

fn default_torso_rest_height() -> f64 {
    0.0
}

fn default_true() -> bool {
    true
}

fn default_settle_delay_ms() -> u64 {
    500
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            torso_working_height: default_torso_working_height(),
            torso_rest_height: default_torso_rest_height(),
            lower_torso_on_finish: true,
            reacquire_before_grasp: true,
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl OrchestratorSection {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// [pose_search] 段：接近位姿搜索的时间预算与回退位姿
#[derive(Debug, Clone, Deserialize)]
pub struct PoseSearchSection {
    /// 搜索预算（毫秒）；场景越杂乱搜索越慢
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,
    /// 回退位姿与目标点的水平距离（米）
    #[serde(default = "default_fallback_standoff_m")]
    pub fallback_standoff_m: f64,
}

fn default_budget_ms() -> u64 {
    5000
}

fn default_fallback_standoff_m() -> f64 {
    0.65
}

impl Default for PoseSearchSection {
    fn default() -> Self {
        Self {
            budget_ms: default_budget_ms(),
            fallback_standoff_m: default_fallback_standoff_m(),
        }
    }
}

impl PoseSearchSection {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }
}

/// [perception] 段
#[derive(Debug, Clone, Deserialize)]
pub struct PerceptionSection {
    /// 注视/检测的总尝试次数（含首次）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    2
}

impl Default for PerceptionSection {
    fn default() -> Self {
        Self { max_attempts: default_max_attempts() }
    }
}

/// [arms] 段：手臂可达包络（相对底盘）
#[derive(Debug, Clone, Deserialize)]
pub struct ArmsSection {
    /// 肩部到底盘中心线的横向距离
    #[serde(default = "default_shoulder_offset_m")]
    pub shoulder_offset_m: f64,
    /// 肩部水平可达半径
    #[serde(default = "default_reach_m")]
    pub reach_m: f64,
    #[serde(default = "default_min_height_m")]
    pub min_height_m: f64,
    #[serde(default = "default_max_height_m")]
    pub max_height_m: f64,
    /// 允许物体位于底盘后方的最大距离
    #[serde(default = "default_max_behind_m")]
    pub max_behind_m: f64,
    /// 「近似可达」时包络放大的比例
    #[serde(default = "default_slack")]
    pub slack: f64,
    /// 横向偏移小于此值时不偏向任何一侧
    #[serde(default = "default_side_deadband_m")]
    pub side_deadband_m: f64,
}

fn default_shoulder_offset_m() -> f64 {
    0.188
}

fn default_reach_m() -> f64 {
    0.85
}

fn default_min_height_m() -> f64 {
    0.3
}

fn default_max_height_m() -> f64 {
    1.9
}

fn default_max_behind_m() -> f64 {
    0.1
}

fn default_slack() -> f64 {
    0.25
}

fn default_side_deadband_m() -> f64 {
    0.02
}

impl Default for ArmsSection {
    fn default() -> Self {
        Self {
            shoulder_offset_m: default_shoulder_offset_m(),
            reach_m: default_reach_m(),
            min_height_m: default_min_height_m(),
            max_height_m: default_max_height_m(),
            max_behind_m: default_max_behind_m(),
            slack: default_slack(),
            side_deadband_m: default_side_deadband_m(),
        }
    }
}

/// [world] 段：世界边界
#[derive(Debug, Clone, Deserialize)]
pub struct WorldSection {
    #[serde(default = "default_min_xy")]
    pub min_x: f64,
    #[serde(default = "default_max_xy")]
    pub max_x: f64,
    #[serde(default = "default_min_xy")]
    pub min_y: f64,
    #[serde(default = "default_max_xy")]
    pub max_y: f64,
    #[serde(default)]
    pub min_z: f64,
    #[serde(default = "default_max_z")]
    pub max_z: f64,
}

fn default_min_xy() -> f64 {
    -5.0
}

fn default_max_xy() -> f64 {
    5.0
}

fn default_max_z() -> f64 {
    3.0
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            min_x: default_min_xy(),
            max_x: default_max_xy(),
            min_y: default_min_xy(),
            max_y: default_max_xy(),
            min_z: 0.0,
            max_z: default_max_z(),
        }
    }
}

impl WorldSection {
    pub fn bounds(&self) -> WorldBounds {
        WorldBounds {
            min: Point::new(self.min_x, self.min_y, self.min_z),
            max: Point::new(self.max_x, self.max_y, self.max_z),
        }
    }
}

/// [surfaces] 段：放置面目录与放置高度余量
#[derive(Debug, Clone, Deserialize)]
pub struct SurfacesSection {
    /// 放置点高出台面的距离（米）
    #[serde(default = "default_clearance_m")]
    pub clearance_m: f64,
    #[serde(default = "default_catalog")]
    pub catalog: Vec<NamedSurface>,
}

fn default_clearance_m() -> f64 {
    0.05
}

fn surface(name: &str, description: &str, position: [f64; 3], width: f64, depth: f64) -> NamedSurface {
    NamedSurface {
        name: name.into(),
        description: description.into(),
        reference: position.into(),
        width,
        depth,
    }
}

/// 厨房环境的放置面（位置取自 URDF，z 为台面高度）
fn default_catalog() -> Vec<NamedSurface> {
    vec![
        surface("sink_area_surface", "Countertop around the sink", [2.115, 2.35, 0.95], 0.6, 2.0),
        surface("kitchen_island_surface", "Kitchen island's main countertop", [-1.0675, 1.7192, 0.95], 0.9, 2.0),
        surface("kitchen_island_stove", "Cooking surface on the island", [-1.0675, 2.485, 0.97], 0.6, 0.5),
        surface("table_area_main", "Dining table surface", [-1.4, -1.05, 0.74], 1.2, 0.8),
        surface("oven_area_area", "Countertop in the oven area", [2.095, 3.12, 0.95], 0.6, 1.2),
        surface("sink_area_sink", "Inside the sink", [2.12, 2.82, 0.90], 0.4, 0.5),
        surface("oven_area_oven_door", "Top of the closed oven door", [2.3687, 3.12, 0.85], 0.1, 0.6),
        surface("fridge_area", "Top of the refrigerator", [2.115, -0.44, 1.75], 0.6, 0.6),
    ]
}

impl Default for SurfacesSection {
    fn default() -> Self {
        Self { clearance_m: default_clearance_m(), catalog: default_catalog() }
    }
}

/// [queue] 段
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSection {
    /// 排队意图上限；满时新意图被拒绝
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    8
}

impl Default for QueueSection {
    fn default() -> Self {
        Self { capacity: default_capacity() }
    }
}

/// 从 config 目录加载配置，环境变量 ROBO__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ROBO__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ROBO")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.pose_search.budget(), Duration::from_secs(5));
        assert_eq!(cfg.perception.max_attempts, 2);
        assert_eq!(cfg.surfaces.catalog.len(), 8);
        assert_eq!(cfg.queue.capacity, 8);
        assert!(cfg.world.bounds().contains(&Point::new(1.0, 1.0, 0.8)));
    }

    #[test]
    fn test_load_from_file_overrides_and_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[pose_search]
budget_ms = 1200

[surfaces]
clearance_m = 0.1

[[surfaces.catalog]]
name = "shelf"
reference = {{ x = 0.5, y = 0.5, z = 1.2 }}
width = 0.4
depth = 0.3
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.pose_search.budget_ms, 1200);
        assert_eq!(cfg.pose_search.fallback_standoff_m, 0.65);
        assert_eq!(cfg.surfaces.clearance_m, 0.1);
        assert_eq!(cfg.surfaces.catalog.len(), 1);
        assert_eq!(cfg.surfaces.catalog[0].name, "shelf");
        assert_eq!(cfg.perception.max_attempts, 2);
    }

    #[test]
    fn test_reload_without_files_gives_defaults() {
        // crate 根目录下不提供 config/default.toml
        let cfg = reload_config().unwrap();
        assert_eq!(cfg.surfaces.catalog.len(), 8);
        assert_eq!(cfg.arms.reach_m, 0.85);
    }
}
