//! Robo Pilot - 移动双臂机器人的抓取-放置任务编排
//!
//! 模块划分：
//! - **actions**: 直接命令（注视、检测、移动、躯干、收臂）与只读世界查询
//! - **backend**: 执行后端 trait、手臂/躯干类型与仿真后端
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 状态机编排、错误与恢复、后端调用审计、意图队列
//! - **observability**: 日志初始化
//! - **perception**: 感知调用的重试包装
//! - **planning**: 可达手臂选择与有时限的接近位姿搜索
//! - **world**: 几何类型、世界快照、物体解析与命名放置面

pub mod actions;
pub mod backend;
pub mod config;
pub mod core;
pub mod observability;
pub mod perception;
pub mod planning;
pub mod world;

pub use crate::core::{IntentQueue, ManipulationIntent, ManipulationOutcome, Orchestrator};
