//! 意图队列集成测试：串行执行、拒绝与关闭

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use robo_pilot::actions::RobotCommands;
use robo_pilot::backend::{ArmGroup, FaultPlan, SearchBehavior, SimulatedBackend, TorsoLevel};
use robo_pilot::config::AppConfig;
use robo_pilot::core::{ErrorKind, Intent, IntentQueue, ManipulationIntent, Orchestrator, QueueError};
use robo_pilot::world::{Destination, Point, SurfaceCatalog};

fn kitchen_queue(faults: FaultPlan, capacity: usize) -> (Arc<SimulatedBackend>, IntentQueue) {
    let mut cfg = AppConfig::default();
    cfg.orchestrator.settle_delay_ms = 0;
    cfg.pose_search.budget_ms = 1_000;
    let backend = Arc::new(
        SimulatedBackend::kitchen(SurfaceCatalog::from_config(&cfg.surfaces)).with_faults(faults),
    );
    let orchestrator = Arc::new(Orchestrator::new(backend.clone(), &cfg));
    let commands = RobotCommands::new(backend.clone(), &cfg);
    (backend, IntentQueue::start(orchestrator, commands, capacity))
}

#[tokio::test]
async fn test_intents_run_one_at_a_time_in_order() {
    let faults = FaultPlan { search: SearchBehavior::Delay(Duration::from_millis(30)), ..Default::default() };
    let (backend, queue) = kitchen_queue(faults, 8);

    let tickets = vec![
        queue.submit(ManipulationIntent::new("cereal", Destination::surface("table_area_main"))).unwrap(),
        queue.submit(ManipulationIntent::new("milk", Destination::surface("table_area_main"))).unwrap(),
        queue.submit(ManipulationIntent::new("spoon", Destination::surface("kitchen_island_surface"))).unwrap(),
    ];
    let outcomes: Vec<_> = join_all(tickets.into_iter().map(|t| t.outcome()))
        .await
        .into_iter()
        .map(|r| r.unwrap().manipulation().unwrap())
        .collect();

    assert!(outcomes.iter().all(|o| o.is_success()));
    assert_eq!(
        outcomes.iter().map(|o| o.object.as_str()).collect::<Vec<_>>(),
        vec!["cereal", "milk", "spoon"]
    );
    // 后一个意图在前一个结束之后才开始
    for pair in outcomes.windows(2) {
        assert!(pair[0].finished_at <= pair[1].started_at);
    }
    assert_eq!(backend.calls().grasp, 3);
    assert!(backend.held_object().await.is_none());
    queue.shutdown().await;
}

#[tokio::test]
async fn test_commands_share_the_queue() {
    let (backend, queue) = kitchen_queue(FaultPlan::default(), 8);

    let tickets = vec![
        queue.submit(Intent::MoveAndRotate { point: Some(Point::new(-0.4, 1.4, 0.0)), yaw_degrees: Some(180.0) }).unwrap(),
        queue.submit(Intent::LookAt { object: "cereal".into() }).unwrap(),
        queue.submit(Intent::Detect { object: "milk".into(), surface: Some("kitchen_island_surface".into()) }).unwrap(),
        queue.submit(Intent::MoveTorso { level: TorsoLevel::High }).unwrap(),
        queue.submit(Intent::ParkArms { arms: ArmGroup::Both }).unwrap(),
    ];
    for ticket in tickets {
        let report = ticket.outcome().await.unwrap().command().unwrap();
        assert!(report.is_ok(), "command failed: {report:?}");
    }

    let calls = backend.calls();
    assert_eq!(calls.navigate, 1);
    assert_eq!(calls.look_at, 1);
    assert_eq!(calls.detect, 1);
    assert_eq!(calls.adjust_torso, 1);
    assert_eq!(calls.park_arms, 1);
    queue.shutdown().await;
}

#[tokio::test]
async fn test_failed_command_reports_error() {
    let (_, queue) = kitchen_queue(FaultPlan::default(), 8);

    let ticket = queue.submit(Intent::Detect { object: "plate".into(), surface: None }).unwrap();
    let err = ticket.outcome().await.unwrap().command().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ObjectNotFound);
    queue.shutdown().await;
}

#[tokio::test]
async fn test_busy_queue_rejects_without_blocking() {
    let faults = FaultPlan { search: SearchBehavior::Delay(Duration::from_millis(200)), ..Default::default() };
    let (_, queue) = kitchen_queue(faults, 2);

    let running = queue.submit(ManipulationIntent::new("cereal", [0.0, 1.0, 0.9])).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _a = queue.submit(Intent::MoveTorso { level: TorsoLevel::Low }).unwrap();
    let _b = queue.submit(Intent::MoveTorso { level: TorsoLevel::High }).unwrap();
    assert_eq!(
        queue.submit(Intent::ParkArms { arms: ArmGroup::Both }).err(),
        Some(QueueError::Busy)
    );

    running.cancel();
    let outcome = running.outcome().await.unwrap().manipulation().unwrap();
    assert_eq!(outcome.error_kind(), Some(ErrorKind::Cancelled));
    queue.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_cancels_queued_intents() {
    let faults = FaultPlan { search: SearchBehavior::Delay(Duration::from_millis(200)), ..Default::default() };
    let (backend, queue) = kitchen_queue(faults, 4);

    let running = queue.submit(ManipulationIntent::new("cereal", [0.0, 1.0, 0.9])).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let waiting = queue.submit(ManipulationIntent::new("milk", [0.0, 1.0, 0.9])).unwrap();

    queue.shutdown().await;

    let outcome = running.outcome().await.unwrap().manipulation().unwrap();
    assert_eq!(outcome.error_kind(), Some(ErrorKind::Cancelled));
    assert!(outcome.cleanup_parked);
    assert_eq!(waiting.outcome().await.err(), Some(QueueError::Closed));
    assert_eq!(backend.calls().grasp, 0);
}
