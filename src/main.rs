//! Jarvis - 本地桌面语音助手
//!
//! 入口：解析命令行、初始化日志、加载配置、组装编排器并运行主循环，直到退出指令或 Ctrl+C。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use jarvis::config::load_config_or_default;
use jarvis::core::{AssistantBuilder, RunExit, ShutdownManager};
use jarvis::io::{InputSource, LineInput};

#[derive(Parser)]
#[command(name = "jarvis", about = "Local desktop assistant: voice or console in, tools and a local model out")]
struct Cli {
    /// Path to config file (merged over config/default.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read utterances from the speech-to-text command and speak replies
    #[arg(long)]
    voice: bool,

    /// Dry-run desktop actions, fixed screen text and a mock language backend
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    jarvis::observability::init();

    let cfg = load_config_or_default(cli.config.clone()).context("Failed to load config file")?;
    let voice = cli.voice || cfg.app.use_voice_loop;
    let name = cfg.app.name.clone();
    let audio = cfg.audio.clone();

    let builder = AssistantBuilder::new(cfg).mock(cli.mock).voice(voice);
    let mut session = builder.new_session();
    let orchestrator = builder.build().context("Failed to build assistant")?;

    let mut input: Box<dyn InputSource> = if voice {
        Box::new(LineInput::voice(&audio).context("Failed to start speech recognizer")?)
    } else {
        Box::new(LineInput::console())
    };

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    orchestrator.say(&format!("{name} online. Say 'help' to see what I can do."));
    let exit = orchestrator
        .run(&mut session, input.as_mut(), shutdown.token())
        .await;

    let stats = orchestrator.memory().stats();
    tracing::info!(
        ?exit,
        turns = session.turns_handled(),
        memory_backend = stats.backend,
        memory_entries = stats.entries,
        "assistant stopped"
    );
    if exit == RunExit::Cancelled {
        orchestrator.say("Shutting down.");
    }
    Ok(())
}
