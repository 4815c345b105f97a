//! Robo Pilot - 仿真厨房中的抓取-放置演示
//!
//! 入口：初始化日志、加载配置、构建仿真后端与意图队列，执行一次抓取-放置并输出 JSON 结果。
//! 用法：robo-pilot [object] [surface] [left|right]

use std::sync::Arc;

use anyhow::Context;
use robo_pilot::{
    actions::RobotCommands,
    backend::{ArmIdentity, SimulatedBackend},
    config::{load_config, AppConfig},
    core::{IntentQueue, ManipulationIntent, Orchestrator},
    observability,
    world::{Destination, SurfaceCatalog},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    observability::init();

    let mut args = std::env::args().skip(1);
    let object = args.next().unwrap_or_else(|| "cereal".to_string());
    let surface = args.next().unwrap_or_else(|| "kitchen_island_surface".to_string());
    let arm = match args.next() {
        Some(s) => Some(ArmIdentity::parse(&s).with_context(|| format!("Unknown arm '{s}'"))?),
        None => None,
    };

    let cfg = match load_config(None) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        }
    };

    let backend = Arc::new(SimulatedBackend::kitchen(SurfaceCatalog::from_config(&cfg.surfaces)));
    let orchestrator = Arc::new(Orchestrator::new(backend.clone(), &cfg));
    let commands = RobotCommands::new(backend, &cfg);
    let queue = IntentQueue::start(orchestrator, commands, cfg.queue.capacity);

    let mut intent = ManipulationIntent::new(object, Destination::surface(surface));
    if let Some(arm) = arm {
        intent = intent.with_arm(arm);
    }
    let ticket = queue.submit(intent).context("Failed to submit intent")?;

    let reply = tokio::select! {
        reply = ticket.outcome() => Some(reply.context("Intent was dropped")?),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down");
            None
        }
    };
    queue.shutdown().await;

    if let Some(outcome) = reply.and_then(|r| r.manipulation()) {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to encode outcome")?;
        println!("{json}");
        if !outcome.is_success() {
            std::process::exit(1);
        }
    }
    Ok(())
}
