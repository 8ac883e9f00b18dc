//! 백그라운드 워커 — 업데이트 확인 및 다운로드/압축 해제를 백그라운드에서 처리
//!
//! ## 아키텍처
//! - `BackgroundWorker`: 독립적인 tokio 태스크로 실행
//! - CLI/GUI는 이벤트 구독을 통해 결과를 수신하고 사용자에게 묻는다
//! - 핸드오프(업데이터 실행 + 종료)는 이벤트를 받은 쪽에서 명시적으로 수행

use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::{AvailableUpdate, SelfUpdater, UpdateCheck, UpdateManager, UpdaterError};

/// 백그라운드 작업 타입
#[derive(Debug, Clone)]
pub enum BackgroundTask {
    /// 업데이트 확인
    Check,
    /// 다운로드 + 압축 해제 + 업데이터 위치 확인
    Download { update: AvailableUpdate },
    /// 워커 종료
    Shutdown,
}

/// 워커에서 발생하는 이벤트
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    CheckStarted,
    CheckCompleted(UpdateCheck),
    DownloadStarted { latest_tag: String },
    /// 업데이트 트리 준비 완료. 받은 쪽에서 `UpdateManager::hand_off` 호출
    ReadyForHandoff(SelfUpdater),
    DownloadFailed { error: String, user_message: String },
    /// 다운로드/압축 해제가 취소되어 스테이징이 정리됨
    Cancelled,
    WorkerShutdown,
}

/// 백그라운드 워커
pub struct BackgroundWorker {
    task_tx: mpsc::Sender<BackgroundTask>,
    event_tx: broadcast::Sender<WorkerEvent>,
    /// 진행 중인 다운로드의 취소 토큰. 취소된 토큰은 다운로드가 끝난 뒤 교체된다.
    cancel: Arc<Mutex<CancellationToken>>,
}

impl BackgroundWorker {
    /// 새 백그라운드 워커 생성 및 시작
    pub fn spawn(manager: Arc<RwLock<UpdateManager>>) -> Self {
        let (task_tx, task_rx) = mpsc::channel::<BackgroundTask>(32);
        let (event_tx, _) = broadcast::channel::<WorkerEvent>(64);
        let cancel = Arc::new(Mutex::new(CancellationToken::new()));

        let ctx = WorkerContext {
            manager,
            event_tx: event_tx.clone(),
            cancel: cancel.clone(),
        };
        tokio::spawn(async move {
            worker_loop(ctx, task_rx).await;
        });

        Self {
            task_tx,
            event_tx,
            cancel,
        }
    }

    /// 태스크 제출
    pub async fn submit(&self, task: BackgroundTask) -> Result<(), String> {
        self.task_tx
            .send(task)
            .await
            .map_err(|e| format!("Failed to submit task: {}", e))
    }

    pub async fn check_now(&self) -> Result<(), String> {
        self.submit(BackgroundTask::Check).await
    }

    pub async fn download(&self, update: AvailableUpdate) -> Result<(), String> {
        self.submit(BackgroundTask::Download { update }).await
    }

    /// 진행 중(또는 곧 시작될) 다운로드 취소
    pub fn cancel(&self) {
        if let Ok(token) = self.cancel.lock() {
            tracing::info!("[Worker] Cancellation requested");
            token.cancel();
        }
    }

    /// 이벤트 구독
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// 워커 종료
    pub async fn shutdown(&self) -> Result<(), String> {
        self.submit(BackgroundTask::Shutdown).await
    }
}

struct WorkerContext {
    manager: Arc<RwLock<UpdateManager>>,
    event_tx: broadcast::Sender<WorkerEvent>,
    cancel: Arc<Mutex<CancellationToken>>,
}

impl WorkerContext {
    fn emit(&self, event: WorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    fn current_token(&self) -> CancellationToken {
        match self.cancel.lock() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn reset_token_if_cancelled(&self) {
        if let Ok(mut token) = self.cancel.lock() {
            if token.is_cancelled() {
                *token = CancellationToken::new();
            }
        }
    }
}

/// 워커 메인 루프
async fn worker_loop(ctx: WorkerContext, mut task_rx: mpsc::Receiver<BackgroundTask>) {
    tracing::info!("[Worker] Background worker started");

    while let Some(task) = task_rx.recv().await {
        match task {
            BackgroundTask::Shutdown => {
                tracing::info!("[Worker] Shutdown requested");
                ctx.emit(WorkerEvent::WorkerShutdown);
                break;
            }
            BackgroundTask::Check => handle_check(&ctx).await,
            BackgroundTask::Download { update } => handle_download(&ctx, &update).await,
        }
    }

    tracing::info!("[Worker] Background worker stopped");
}

async fn handle_check(ctx: &WorkerContext) {
    ctx.emit(WorkerEvent::CheckStarted);

    let check = {
        let mut mgr = ctx.manager.write().await;
        mgr.check_for_update().await
    };
    tracing::info!("[Worker] Check completed: {:?}", check);
    ctx.emit(WorkerEvent::CheckCompleted(check));
}

async fn handle_download(ctx: &WorkerContext, update: &AvailableUpdate) {
    ctx.emit(WorkerEvent::DownloadStarted {
        latest_tag: update.latest_tag.clone(),
    });
    tracing::info!("[Worker] Starting download: {}", update.latest_tag);

    let token = ctx.current_token();
    let result = {
        let mut mgr = ctx.manager.write().await;
        match mgr.download_and_extract(update, &token).await {
            Ok(unpacked) => mgr.prepare_handoff(&unpacked),
            Err(e) => Err(e),
        }
    };
    ctx.reset_token_if_cancelled();

    match result {
        Ok(updater) => {
            tracing::info!("[Worker] Update ready: {}", updater.staged_dir.display());
            ctx.emit(WorkerEvent::ReadyForHandoff(updater));
        }
        Err(UpdaterError::Cancelled) => ctx.emit(WorkerEvent::Cancelled),
        Err(e) => {
            tracing::error!("[Worker] Download failed: {}", e);
            ctx.emit(WorkerEvent::DownloadFailed {
                error: e.to_string(),
                user_message: e.user_message(),
            });
        }
    }
}
