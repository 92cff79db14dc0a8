mod cli;

use std::process::Stdio;
use std::sync::Arc;

use clap::Parser;
use cli::Cli;
use ports::Planner;
use types::PlannerMode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    common::logger::init_tracing("agent", cli.json_logs);

    let mut config = types::AgentConfig::from_env()?;
    if let Some(state_path) = &cli.state_path {
        config.state_path = state_path.clone();
    }
    if let Some(queue_root) = &cli.queue_root {
        config.queue_root = queue_root.clone();
    }
    if matches!(config.planner_mode, PlannerMode::Llm | PlannerMode::Hybrid) {
        if let Some(endpoint) = &cli.llm_endpoint {
            config.llm_transport = Some(types::LlmTransport::HttpChatCompletions {
                endpoint: endpoint.clone(),
                model: cli.llm_model.clone(),
            });
        }
    }

    let price_feed: Arc<dyn ports::PriceFeed> =
        Arc::new(adapters::HttpPriceFeed::new(cli.price_feed_url.clone()));

    let mut wallet_child = tokio::process::Command::new(&cli.wallet_command)
        .args(&cli.wallet_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;
    let wallet_stdin = wallet_child.stdin.take().expect("wallet child stdin was piped");
    let wallet_stdout = wallet_child.stdout.take().expect("wallet child stdout was piped");
    let wallet_client = adapters::WalletRpcClient::new(wallet_stdout, wallet_stdin);
    wallet_client.initialize().await?;
    let wallet_executor: Arc<dyn ports::WalletExecutor> = Arc::new(wallet_client);

    let rule_backend = Arc::new(adapters::RuleBasedPlanner::new(config.policy.clone()));
    let (backend, fallback): (Arc<dyn Planner>, Option<Arc<dyn Planner>>) = match config.planner_mode {
        PlannerMode::Rule => (rule_backend, None),
        PlannerMode::Llm | PlannerMode::Hybrid => {
            let llm: Arc<dyn Planner> = match &config.llm_transport {
                Some(types::LlmTransport::HttpChatCompletions { endpoint, model }) => {
                    Arc::new(adapters::HttpLlmPlanner::new(
                        endpoint.clone(),
                        model.clone(),
                        std::env::var("AGENT_LLM_API_KEY").ok(),
                    ))
                }
                Some(types::LlmTransport::Subprocess { command, args }) => {
                    Arc::new(adapters::SubprocessLlmPlanner::new(command.clone(), args.clone()))
                }
                None => {
                    tracing::warn!(
                        "planner_mode is llm/hybrid but no llm transport was configured; using the rule backend only"
                    );
                    rule_backend.clone()
                }
            };
            let fallback = if matches!(config.planner_mode, PlannerMode::Hybrid) {
                Some(rule_backend.clone() as Arc<dyn Planner>)
            } else {
                None
            };
            (llm, fallback)
        }
    };
    let planner_adapter = planner::PlannerAdapter::new(backend, fallback);

    let state_store = state::StateStore::new(config.state_path.clone(), config.history_keep_points);
    let queue = queue::IntentQueue::new(config.queue_root.clone());

    let cycle_engine = Arc::new(
        engine::CycleEngine::new(config.clone(), state_store, queue, price_feed, wallet_executor, planner_adapter)
            .await?,
    );

    if cli.once {
        cycle_engine.run_cycle().await?;
        return Ok(());
    }

    let cancel = clockrt::CancelToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received, finishing the in-flight cycle before exit");
        shutdown_cancel.cancel();
    });

    let interval_ms = config.interval_seconds * 1_000;
    let loop_engine = cycle_engine.clone();
    clockrt::run_loop(
        move || {
            let cycle_engine = loop_engine.clone();
            async move { cycle_engine.run_cycle().await }
        },
        interval_ms,
        cancel,
    )
    .await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
