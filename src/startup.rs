//! 시작 시 업데이트 흐름
//!
//! 잔여 파일 정리 → 백그라운드 확인 → 사용자 확인 → 다운로드/압축 해제 → 핸드오프.
//! 어떤 실패도 애플리케이션 시작을 막지 않는다.

use std::future::Future;
use std::sync::Arc;

use retro_launcher_updater_lib::{
    AvailableUpdate, BackgroundWorker, NoUpdateReason, UpdateCheck, UpdateManager, WorkerEvent,
};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::AppContext;

/// 사용자 상호작용 지점 (터미널, GUI 대화상자, 테스트 스텁)
pub trait UpdatePrompt {
    /// 업데이트를 설치할지 묻는다. 응답을 기다리는 동안 런타임을 막지 않아야 한다.
    fn confirm_update(&mut self, update: &AvailableUpdate) -> impl Future<Output = bool> + Send;

    /// 업데이트 실패를 알린다
    fn notify_failure(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    NoUpdate(NoUpdateReason),
    Declined,
    Cancelled,
    Failed(String),
    /// 업데이터가 실행됨. 호출자는 즉시 종료해야 한다.
    HandedOff { pid: u32 },
}

/// `cancel`은 사용자가 다운로드를 수락한 뒤에만 감시된다.
pub async fn run_startup_update<P: UpdatePrompt>(
    ctx: &AppContext,
    prompt: &mut P,
    cancel: CancellationToken,
) -> anyhow::Result<StartupOutcome> {
    let manager = UpdateManager::new(ctx.update_config().clone(), ctx.platform())?;
    manager.cleanup_leftovers();

    let manager = Arc::new(RwLock::new(manager));
    let worker = Arc::new(BackgroundWorker::spawn(manager.clone()));
    let mut events = worker.subscribe();

    let outcome = drive(&manager, &worker, &mut events, prompt, cancel).await;

    if let Err(e) = worker.shutdown().await {
        tracing::debug!("[Startup] Worker already stopped: {}", e);
    }
    outcome
}

async fn drive<P: UpdatePrompt>(
    manager: &Arc<RwLock<UpdateManager>>,
    worker: &Arc<BackgroundWorker>,
    events: &mut broadcast::Receiver<WorkerEvent>,
    prompt: &mut P,
    cancel: CancellationToken,
) -> anyhow::Result<StartupOutcome> {
    worker.check_now().await.map_err(anyhow::Error::msg)?;

    let update = loop {
        match next_event(events).await? {
            WorkerEvent::CheckCompleted(UpdateCheck::NoUpdate { reason }) => {
                return Ok(StartupOutcome::NoUpdate(reason));
            }
            WorkerEvent::CheckCompleted(UpdateCheck::Available(update)) => break update,
            _ => {}
        }
    };

    if !prompt.confirm_update(&update).await {
        manager.write().await.decline();
        return Ok(StartupOutcome::Declined);
    }

    let cancel_forwarder = {
        let worker = worker.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            worker.cancel();
        })
    };
    let outcome = await_download(manager, worker, events, prompt, update).await;
    cancel_forwarder.abort();
    outcome
}

async fn await_download<P: UpdatePrompt>(
    manager: &Arc<RwLock<UpdateManager>>,
    worker: &BackgroundWorker,
    events: &mut broadcast::Receiver<WorkerEvent>,
    prompt: &mut P,
    update: AvailableUpdate,
) -> anyhow::Result<StartupOutcome> {
    worker.download(update).await.map_err(anyhow::Error::msg)?;

    loop {
        match next_event(events).await? {
            WorkerEvent::ReadyForHandoff(updater) => {
                let result = manager.write().await.hand_off(&updater);
                return Ok(match result {
                    Ok(pid) => StartupOutcome::HandedOff { pid },
                    Err(e) => {
                        prompt.notify_failure(&e.user_message());
                        StartupOutcome::Failed(e.to_string())
                    }
                });
            }
            WorkerEvent::DownloadFailed { error, user_message } => {
                prompt.notify_failure(&user_message);
                return Ok(StartupOutcome::Failed(error));
            }
            WorkerEvent::Cancelled => return Ok(StartupOutcome::Cancelled),
            _ => {}
        }
    }
}

async fn next_event(events: &mut broadcast::Receiver<WorkerEvent>) -> anyhow::Result<WorkerEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("[Startup] Missed {} worker events", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                anyhow::bail!("update worker stopped unexpectedly")
            }
        }
    }
}
