// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, Subcommand};
use matchq::config::settings::Settings;
use matchq::domain::models::queue_entry::parse_identifier_list;
use matchq::domain::repositories::match_queue_repository::MatchQueueRepository;
use matchq::engines::opendota::OpenDotaProcessor;
use matchq::infrastructure::database::connection;
use matchq::infrastructure::repositories::match_queue_repo_impl::MatchQueueRepositoryImpl;
use matchq::infrastructure::repositories::match_repo_impl::MatchRepositoryImpl;
use matchq::queue::lease_manager::LeaseManager;
use matchq::queue::prefetch_buffer::PrefetchBuffer;
use matchq::utils::agent::resolve_agent_id;
use matchq::utils::errors::WorkerError;
use matchq::utils::retry_policy::RetryPolicy;
use matchq::utils::telemetry;
use matchq::workers::halt::OperatorHalt;
use matchq::workers::match_worker::MatchWorker;
use matchq::workers::supervisor::{self, AgentSupervisor};
use migration::{Migrator, MigratorTrait};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "matchq", version, about = "Leased match work queue for scraping agents")]
struct Cli {
    /// Apply pending database migrations before running the command
    #[arg(long, global = true)]
    migrate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scraping agent under the supervisor
    Run {
        /// Proxy server address, becomes part of the agent identity
        #[arg(long)]
        proxy_server: Option<String>,
        /// Agent name to use instead of the host name
        #[arg(long)]
        agent_name: Option<String>,
    },
    /// Add match identifiers to the queue, skipping known ones
    Enqueue {
        identifiers: Vec<String>,
        /// File with one identifier per line
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Return expired leases to the queue
    Reclaim {
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Print queue counters
    Stats,
}

/// 主函数
///
/// 应用程序入口点，负责初始化组件并执行子命令
#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // 1. Load configuration
    let mut settings = Settings::new()?;

    // 2. Initialize logging
    telemetry::init_telemetry(&settings.logging)?;
    if let Command::Run {
        proxy_server,
        agent_name,
    } = &cli.command
    {
        if proxy_server.is_some() {
            settings.agent.proxy_server = proxy_server.clone();
        }
        if agent_name.is_some() {
            settings.agent.name = agent_name.clone();
        }
    }
    info!("Configuration loaded");

    // 3. Connect to database
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Database connection established");

    if cli.migrate {
        info!("Running database migrations...");
        Migrator::up(db.as_ref(), None).await?;
        info!("Database migrations applied");
    }

    // Repositories and workers hold connection handles until this block ends
    let code = {
        let queue_repo = Arc::new(MatchQueueRepositoryImpl::new(
            db.clone(),
            settings.queue.lease_ttl(),
        ));
        let agent = resolve_agent_id(&settings.agent);

        match cli.command {
            Command::Run { .. } => {
                info!(agent = %agent, "Starting matchq agent");
                let match_repo = Arc::new(MatchRepositoryImpl::new(db.clone()));
                let retry = RetryPolicy::from_settings(&settings.retry);
                let worker_settings = settings.clone();

                let factory = move || -> Result<_, WorkerError> {
                    let processor = OpenDotaProcessor::new(
                        &worker_settings.provider,
                        worker_settings.agent.proxy_server.as_deref(),
                        match_repo.clone(),
                        agent.clone(),
                    )?;
                    let buffer = PrefetchBuffer::new(
                        queue_repo.clone(),
                        agent.clone(),
                        worker_settings.queue.clone(),
                        retry.clone(),
                    );
                    Ok(MatchWorker::new(buffer, Arc::new(processor)))
                };

                let mut agent_supervisor =
                    AgentSupervisor::new(factory, OperatorHalt, &settings.supervisor);
                ExitCode::from(agent_supervisor.run(supervisor::ctrl_c()).await)
            }
            Command::Enqueue { identifiers, file } => {
                let mut candidates = identifiers;
                if let Some(path) = file {
                    let text = tokio::fs::read_to_string(&path).await?;
                    candidates.extend(parse_identifier_list(&text));
                }

                let report = queue_repo.enqueue_unique(&candidates).await?;
                info!(
                    inserted = report.inserted,
                    skipped = report.skipped.len(),
                    "Enqueued match identifiers"
                );
                ExitCode::SUCCESS
            }
            Command::Reclaim { limit } => {
                let limit = limit.unwrap_or(settings.queue.replenish_limit);
                let leases = LeaseManager::new(
                    queue_repo,
                    agent,
                    RetryPolicy::from_settings(&settings.retry),
                );
                let promoted = leases.promote_stale(limit).await?;
                info!(promoted, "Reclaim finished");
                ExitCode::SUCCESS
            }
            Command::Stats => {
                let stats = queue_repo.stats().await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
                ExitCode::SUCCESS
            }
        }
    };

    connection::close_pool(db).await?;
    info!("Database connection closed");
    Ok(code)
}
