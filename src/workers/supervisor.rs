// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::SupervisorSettings;
use crate::utils::errors::WorkerError;
use crate::workers::halt::HaltAction;
use crate::workers::worker::Worker;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 代理监督器
///
/// 持有代理任务的句柄：收到关闭信号时通知代理停止，并在宽限期内
/// 等待它确认最后一个条目后退出，超时才强制终止。运行时间达到上限时
/// 让代理正常退出并在等待后重新创建，致命错误交给停机动作处理。
pub struct AgentSupervisor<F, W, H>
where
    F: FnMut() -> Result<W, WorkerError>,
    W: Worker + 'static,
    H: HaltAction,
{
    factory: F,
    halt: H,
    max_runtime: Option<Duration>,
    restart_delay: Duration,
    shutdown_grace: Duration,
    handle: Option<JoinHandle<Result<(), WorkerError>>>,
    restarts: u32,
}

/// 单次运行的结束原因
enum RunEnd {
    Shutdown,
    Restart,
    Finished(Result<(), WorkerError>),
}

impl<F, W, H> AgentSupervisor<F, W, H>
where
    F: FnMut() -> Result<W, WorkerError>,
    W: Worker + 'static,
    H: HaltAction,
{
    /// 创建新的监督器
    ///
    /// # 参数
    ///
    /// * `factory` - 每次（重新）启动时创建新的工作器
    /// * `halt` - 致命错误时的停机动作
    /// * `settings` - 监督配置
    pub fn new(factory: F, halt: H, settings: &SupervisorSettings) -> Self {
        Self {
            factory,
            halt,
            max_runtime: settings.max_runtime_secs.map(Duration::from_secs),
            restart_delay: Duration::from_secs(settings.restart_delay_secs),
            shutdown_grace: Duration::from_secs(settings.shutdown_grace_secs),
            handle: None,
            restarts: 0,
        }
    }

    /// 因运行时间到期而重启的次数
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// 运行代理直到关闭信号或致命错误
    ///
    /// # 返回值
    ///
    /// 进程退出码：正常关闭为0，致命错误由停机动作决定
    pub async fn run<S>(&mut self, shutdown: S) -> u8
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let worker = match (self.factory)() {
                Ok(worker) => worker,
                Err(e) => return self.halt.halt(&e).await,
            };
            let name = worker.name().to_string();
            let (stop_tx, stop_rx) = watch::channel(false);

            info!(worker = %name, "Starting agent");
            self.handle = Some(tokio::spawn(async move { worker.run(stop_rx).await }));

            let end = self.wait(&mut shutdown, &stop_tx).await;
            self.handle = None;

            match end {
                RunEnd::Shutdown => {
                    info!(worker = %name, "Agent stopped by shutdown signal");
                    return 0;
                }
                RunEnd::Finished(Ok(())) => {
                    info!(worker = %name, "Agent finished");
                    return 0;
                }
                RunEnd::Finished(Err(e)) => {
                    error!(worker = %name, "Agent failed: {}", e);
                    return self.halt.halt(&e).await;
                }
                RunEnd::Restart => {
                    self.restarts += 1;
                    info!(
                        worker = %name,
                        restarts = self.restarts,
                        "Restarting agent in {:?}",
                        self.restart_delay
                    );
                    tokio::select! {
                        _ = &mut shutdown => return 0,
                        _ = tokio::time::sleep(self.restart_delay) => {}
                    }
                }
            }
        }
    }

    async fn wait<S>(
        &mut self,
        shutdown: &mut std::pin::Pin<&mut S>,
        stop_tx: &watch::Sender<bool>,
    ) -> RunEnd
    where
        S: Future<Output = ()>,
    {
        let max_runtime = self.max_runtime;
        let grace = self.shutdown_grace;
        let Some(handle) = self.handle.as_mut() else {
            return RunEnd::Finished(Ok(()));
        };

        let runtime_limit = async move {
            match max_runtime {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            joined = &mut *handle => RunEnd::Finished(flatten(joined)),
            _ = shutdown.as_mut() => {
                let _ = stop_tx.send(true);
                stop_within(handle, grace).await
            }
            _ = runtime_limit => {
                info!("Maximum runtime reached, asking agent to stop");
                let _ = stop_tx.send(true);
                tokio::select! {
                    joined = &mut *handle => match flatten(joined) {
                        Ok(()) => RunEnd::Restart,
                        Err(e) => RunEnd::Finished(Err(e)),
                    },
                    _ = shutdown.as_mut() => stop_within(handle, grace).await,
                }
            }
        }
    }
}

/// 等待已收到停止通知的代理退出，超过宽限期则终止任务
async fn stop_within(
    handle: &mut JoinHandle<Result<(), WorkerError>>,
    grace: Duration,
) -> RunEnd {
    match tokio::time::timeout(grace, &mut *handle).await {
        Ok(joined) => match flatten(joined) {
            Ok(()) => RunEnd::Shutdown,
            Err(e) => RunEnd::Finished(Err(e)),
        },
        Err(_) => {
            warn!("Agent did not stop within {:?}, aborting", grace);
            handle.abort();
            RunEnd::Shutdown
        }
    }
}

fn flatten(
    joined: Result<Result<(), WorkerError>, tokio::task::JoinError>,
) -> Result<(), WorkerError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => {
            warn!("Agent task was cancelled");
            Ok(())
        }
        Err(e) => Err(WorkerError::Panicked(e.to_string())),
    }
}

/// 等待 Ctrl-C 信号
pub async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(test)]
#[path = "supervisor_test.rs"]
mod tests;
