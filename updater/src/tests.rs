//! 업데이터 통합 테스트
//!
//! ## 테스트 시나리오
//! 1. 확인: 비활성화 / 서버 연결 실패 시 조용히 "업데이트 없음"
//! 2. 다운로드: 취소 시 스테이징 정리, 단계 복귀
//! 3. 핸드오프: 업데이터 누락 시 실패, 설치 루트 미변경
//! 4. 워커: 이벤트 전달, 취소, 종료

use crate::{
    AvailableUpdate, BackgroundWorker, LocalVersion, NoUpdateReason, Platform, UpdateCheck,
    UpdateConfig, UpdateManager, UpdatePhase, UpdaterError, WorkerEvent,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// 테스트용 설정 생성. 포트 1은 항상 연결 거부된다.
fn test_config(root: &Path) -> UpdateConfig {
    UpdateConfig {
        enabled: true,
        github_owner: "test-owner".to_string(),
        github_repo: "RetroLauncher".to_string(),
        api_base_url: Some("http://127.0.0.1:1".to_string()),
        install_root: Some(root.join("install").to_string_lossy().to_string()),
        staging_dir: Some(root.join("staging").to_string_lossy().to_string()),
        request_timeout_secs: 5,
        download_timeout_secs: 5,
    }
}

fn sample_update() -> AvailableUpdate {
    AvailableUpdate {
        latest_tag: "v2.0.0".to_string(),
        current: LocalVersion::Known("v1.0.0".to_string()),
        download_url: "http://127.0.0.1:1/download/RetroLauncher-ubuntu.zip".to_string(),
    }
}

async fn next_matching<F>(rx: &mut tokio::sync::broadcast::Receiver<WorkerEvent>, pred: F) -> WorkerEvent
where
    F: Fn(&WorkerEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for worker event")
}

// ═══════════════════════════════════════════════════════
// 1. 설정 / 확인
// ═══════════════════════════════════════════════════════

#[test]
fn default_config_points_at_upstream_repository() {
    let config = UpdateConfig::default();
    assert!(config.enabled);
    assert_eq!(config.github_owner, "KarandaevRuslan");
    assert_eq!(config.github_repo, "RetroLauncher");
    assert_eq!(config.request_timeout_secs, 30);
    assert_eq!(config.download_timeout_secs, 600);
}

#[test]
fn partial_config_fills_defaults() {
    let config: UpdateConfig = serde_json::from_str(r#"{"enabled": false}"#).unwrap();
    assert!(!config.enabled);
    assert_eq!(config.github_repo, "RetroLauncher");
    assert_eq!(config.download_timeout_secs, 600);
}

#[tokio::test]
async fn disabled_updates_skip_network() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    config.enabled = false;
    let mut manager = UpdateManager::new(config, Some(Platform::Linux)).unwrap();

    let check = manager.check_for_update().await;
    assert_eq!(check, UpdateCheck::NoUpdate { reason: NoUpdateReason::Disabled });
    assert_eq!(manager.phase(), &UpdatePhase::NoUpdate);
}

#[tokio::test]
async fn unreachable_server_is_no_update() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = UpdateManager::new(test_config(tmp.path()), Some(Platform::Linux)).unwrap();

    let check = manager.check_for_update().await;
    assert_eq!(check, UpdateCheck::NoUpdate { reason: NoUpdateReason::FetchFailed });
    assert_eq!(manager.phase(), &UpdatePhase::NoUpdate);
}

#[test]
fn install_root_and_staging_follow_config() {
    let tmp = tempfile::tempdir().unwrap();
    let manager = UpdateManager::new(test_config(tmp.path()), None).unwrap();
    assert_eq!(manager.install_root(), tmp.path().join("install"));
    assert_eq!(manager.staging().root(), tmp.path().join("staging"));
    assert!(manager.local_version().is_unknown());
}

#[test]
fn decline_returns_to_idle() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = UpdateManager::new(test_config(tmp.path()), Some(Platform::Linux)).unwrap();
    manager.decline();
    assert_eq!(manager.phase(), &UpdatePhase::Idle);
}

// ═══════════════════════════════════════════════════════
// 2. 다운로드 실패 / 취소
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn cancelled_download_purges_staging_and_goes_idle() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = UpdateManager::new(test_config(tmp.path()), Some(Platform::Linux)).unwrap();
    manager.staging().prepare().unwrap();
    std::fs::write(manager.staging().archive_path(), b"stale").unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = manager.download_and_extract(&sample_update(), &cancel).await.unwrap_err();

    assert!(matches!(err, UpdaterError::Cancelled));
    assert_eq!(manager.phase(), &UpdatePhase::Idle);
    assert!(!manager.staging().archive_path().exists());
    assert!(!manager.staging().unpack_dir().exists());
}

#[tokio::test]
async fn failed_download_sets_failed_phase() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = UpdateManager::new(test_config(tmp.path()), Some(Platform::Linux)).unwrap();

    let err = manager
        .download_and_extract(&sample_update(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, UpdaterError::Network(_) | UpdaterError::Timeout { .. }), "got {err}");
    assert!(matches!(manager.phase(), UpdatePhase::Failed(_)));
    assert!(!manager.staging().archive_path().exists());
    assert!(!crate::github::partial_path(&manager.staging().archive_path()).exists());
}

// ═══════════════════════════════════════════════════════
// 3. 핸드오프
// ═══════════════════════════════════════════════════════

#[test]
fn missing_updater_fails_and_purges() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = UpdateManager::new(test_config(tmp.path()), Some(Platform::Linux)).unwrap();
    let unpacked = manager.staging().reset_unpack_dir().unwrap();
    std::fs::write(unpacked.join("retro-launcher"), b"bin").unwrap();

    let err = manager.prepare_handoff(&unpacked).unwrap_err();
    assert!(matches!(err, UpdaterError::UpdaterMissing(_)));
    assert!(matches!(manager.phase(), UpdatePhase::Failed(_)));
    assert!(!unpacked.exists());
    assert!(!tmp.path().join("install").exists());
}

#[test]
fn handoff_targets_install_root() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = UpdateManager::new(test_config(tmp.path()), Some(Platform::Windows)).unwrap();
    let unpacked = manager.staging().reset_unpack_dir().unwrap();
    std::fs::write(unpacked.join("retro-launcher-updater.exe"), b"bin").unwrap();

    let updater = manager.prepare_handoff(&unpacked).unwrap();
    assert_eq!(manager.phase(), &UpdatePhase::HandoffPending);
    assert_eq!(updater.updater_exe, unpacked.join("retro-launcher-updater.exe"));
    let [tree, root] = updater.args();
    assert_eq!(tree, unpacked.as_path());
    assert_eq!(root, tmp.path().join("install").as_path());
}

#[test]
fn failed_spawn_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = UpdateManager::new(test_config(tmp.path()), Some(Platform::Linux)).unwrap();
    let updater = crate::SelfUpdater::new(
        tmp.path().join("does-not-exist"),
        tmp.path().to_path_buf(),
        tmp.path().join("install"),
    );

    assert!(manager.hand_off(&updater).is_err());
    assert!(matches!(manager.phase(), UpdatePhase::Failed(_)));
}

// ═══════════════════════════════════════════════════════
// 4. 워커
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn worker_reports_check_result() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    config.enabled = false;
    let manager = Arc::new(RwLock::new(UpdateManager::new(config, Some(Platform::Linux)).unwrap()));
    let worker = BackgroundWorker::spawn(manager);
    let mut rx = worker.subscribe();

    worker.check_now().await.unwrap();
    let event = next_matching(&mut rx, |e| matches!(e, WorkerEvent::CheckCompleted(_))).await;
    match event {
        WorkerEvent::CheckCompleted(check) => {
            assert_eq!(check, UpdateCheck::NoUpdate { reason: NoUpdateReason::Disabled })
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn worker_cancel_before_download() {
    let tmp = tempfile::tempdir().unwrap();
    let manager = Arc::new(RwLock::new(
        UpdateManager::new(test_config(tmp.path()), Some(Platform::Linux)).unwrap(),
    ));
    let worker = BackgroundWorker::spawn(manager.clone());
    let mut rx = worker.subscribe();

    worker.cancel();
    worker.download(sample_update()).await.unwrap();
    next_matching(&mut rx, |e| matches!(e, WorkerEvent::Cancelled)).await;
    assert_eq!(manager.read().await.phase(), &UpdatePhase::Idle);

    // 취소 토큰은 교체되어 다음 다운로드는 실제로 시도된다
    worker.download(sample_update()).await.unwrap();
    let event = next_matching(&mut rx, |e| {
        matches!(e, WorkerEvent::DownloadFailed { .. } | WorkerEvent::Cancelled)
    })
    .await;
    assert!(matches!(event, WorkerEvent::DownloadFailed { .. }));
}

#[tokio::test]
async fn worker_shutdown_emits_event() {
    let tmp = tempfile::tempdir().unwrap();
    let manager = Arc::new(RwLock::new(
        UpdateManager::new(test_config(tmp.path()), None).unwrap(),
    ));
    let worker = BackgroundWorker::spawn(manager);
    let mut rx = worker.subscribe();

    worker.shutdown().await.unwrap();
    next_matching(&mut rx, |e| matches!(e, WorkerEvent::WorkerShutdown)).await;
}
