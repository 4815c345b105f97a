//! 意图队列：所有驱动机器人的请求在这里串行执行
//!
//! 有界 mpsc 通道 + 单个 worker；每个意图带 oneshot 回复通道与根令牌派生的子 CancellationToken。
//! 队列满时立即拒绝（Busy），关闭后拒绝（Closed）。取消在下一个阶段边界生效。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::actions::{CommandReport, RobotCommands};
use crate::backend::{ArmGroup, TorsoLevel};
use crate::core::orchestrator::Orchestrator;
use crate::core::state::{ManipulationIntent, ManipulationOutcome};
use crate::core::OrchestratorError;
use crate::world::Point;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Intent queue is full")]
    Busy,
    #[error("Intent queue is closed")]
    Closed,
}

/// 排队执行的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    Manipulate(ManipulationIntent),
    LookAt { object: String },
    Detect {
        object: String,
        #[serde(default)]
        surface: Option<String>,
    },
    MoveRobot { point: Point },
    MoveAndRotate {
        #[serde(default)]
        point: Option<Point>,
        #[serde(default)]
        yaw_degrees: Option<f64>,
    },
    MoveTorso { level: TorsoLevel },
    ParkArms { arms: ArmGroup },
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Manipulate(_) => "manipulate",
            Intent::LookAt { .. } => "look_at",
            Intent::Detect { .. } => "detect",
            Intent::MoveRobot { .. } => "move_robot",
            Intent::MoveAndRotate { .. } => "move_and_rotate",
            Intent::MoveTorso { .. } => "move_torso",
            Intent::ParkArms { .. } => "park_arms",
        }
    }
}

impl From<ManipulationIntent> for Intent {
    fn from(intent: ManipulationIntent) -> Self {
        Intent::Manipulate(intent)
    }
}

#[derive(Debug, Clone)]
pub enum IntentReply {
    Manipulation(ManipulationOutcome),
    Command(Result<CommandReport, OrchestratorError>),
}

impl IntentReply {
    pub fn manipulation(self) -> Option<ManipulationOutcome> {
        match self {
            IntentReply::Manipulation(outcome) => Some(outcome),
            IntentReply::Command(_) => None,
        }
    }

    pub fn command(self) -> Option<Result<CommandReport, OrchestratorError>> {
        match self {
            IntentReply::Command(result) => Some(result),
            IntentReply::Manipulation(_) => None,
        }
    }
}

struct Job {
    intent: Intent,
    cancel: CancellationToken,
    reply: oneshot::Sender<IntentReply>,
}

/// 已受理意图的句柄
pub struct IntentTicket {
    cancel: CancellationToken,
    reply: oneshot::Receiver<IntentReply>,
}

impl IntentTicket {
    /// 请求取消；排队中的意图不会开始物理动作，执行中的在下一阶段边界停止
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 等待执行结果；worker 退出前未执行的意图返回 Closed
    pub async fn outcome(self) -> Result<IntentReply, QueueError> {
        self.reply.await.map_err(|_| QueueError::Closed)
    }
}

pub struct IntentQueue {
    tx: mpsc::Sender<Job>,
    root: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl IntentQueue {
    /// 启动 worker；capacity 为可排队（不含执行中）的意图数
    pub fn start(orchestrator: Arc<Orchestrator>, commands: RobotCommands, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));
        let root = CancellationToken::new();
        let stop = root.clone();

        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    job = rx.recv() => match job {
                        Some(job) => run_job(&orchestrator, &commands, job).await,
                        None => break,
                    },
                }
            }
            // 剩余未执行的意图随回复通道一起丢弃
            rx.close();
            tracing::info!("Intent worker stopped");
        });

        Self { tx, root, worker: Mutex::new(Some(worker)) }
    }

    pub fn submit(&self, intent: impl Into<Intent>) -> Result<IntentTicket, QueueError> {
        if self.root.is_cancelled() {
            return Err(QueueError::Closed);
        }
        let intent = intent.into();
        let label = intent.label();
        let cancel = self.root.child_token();
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job { intent, cancel: cancel.clone(), reply: reply_tx };

        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                tracing::warn!(intent = label, "Intent rejected, queue is full");
                QueueError::Busy
            }
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })?;
        tracing::debug!(intent = label, "Intent queued");
        Ok(IntentTicket { cancel, reply: reply_rx })
    }

    pub fn is_closed(&self) -> bool {
        self.root.is_cancelled()
    }

    /// 取消全部意图并等待 worker 退出：执行中的意图在阶段边界停止并收臂
    pub async fn shutdown(&self) {
        self.root.cancel();
        let worker = self.worker.lock().await.take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Intent worker panicked");
            }
        }
    }
}

async fn run_job(orchestrator: &Orchestrator, commands: &RobotCommands, job: Job) {
    let Job { intent, cancel, reply } = job;
    let label = intent.label();
    tracing::info!(intent = label, "Intent started");

    let result = match intent {
        Intent::Manipulate(intent) => {
            IntentReply::Manipulation(orchestrator.execute_with_cancel(intent, cancel).await)
        }
        _ if cancel.is_cancelled() => IntentReply::Command(Err(OrchestratorError::Cancelled)),
        Intent::LookAt { object } => IntentReply::Command(commands.look_at(&object).await),
        Intent::Detect { object, surface } => {
            IntentReply::Command(commands.detect(&object, surface.as_deref()).await)
        }
        Intent::MoveRobot { point } => IntentReply::Command(commands.move_robot(point).await),
        Intent::MoveAndRotate { point, yaw_degrees } => {
            IntentReply::Command(commands.move_and_rotate(point, yaw_degrees).await)
        }
        Intent::MoveTorso { level } => IntentReply::Command(commands.move_torso(level).await),
        Intent::ParkArms { arms } => IntentReply::Command(commands.park_arms(arms).await),
    };

    if reply.send(result).is_err() {
        tracing::debug!(intent = label, "Intent result dropped, ticket no longer waiting");
    }
}
