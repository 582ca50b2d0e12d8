//! 输入通道：控制台 stdin 或外部语音识别命令的 stdout，逐行产生文本
//!
//! 读取在后台任务里进行，经 mpsc 交给主循环；recv 可安全取消，确认超时不会吞掉后续输入。

use std::collections::VecDeque;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::config::AudioSection;
use crate::core::AssistantError;
use crate::intent::Channel;
use crate::tools::command::render_command;

#[async_trait]
pub trait InputSource: Send {
    fn channel(&self) -> Channel;

    /// 下一行输入；None 表示输入已关闭
    async fn next_line(&mut self) -> Option<String>;
}

/// 后台任务逐行读取，经 mpsc 送达
pub struct LineInput {
    channel: Channel,
    rx: mpsc::Receiver<String>,
    _child: Option<Child>,
}

impl LineInput {
    pub fn from_receiver(channel: Channel, rx: mpsc::Receiver<String>) -> Self {
        Self {
            channel,
            rx,
            _child: None,
        }
    }

    /// 控制台：读取 stdin
    pub fn console() -> Self {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(pump_lines(BufReader::new(tokio::io::stdin()), tx, "stdin"));
        Self::from_receiver(Channel::Console, rx)
    }

    /// 语音：启动 [audio] stt_command，每行 stdout 为一条识别结果
    pub fn voice(cfg: &AudioSection) -> Result<Self, AssistantError> {
        let (program, args) = render_command(&cfg.stt_command, &[])
            .map_err(|e| AssistantError::Config(format!("audio.stt_command: {e}")))?;
        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AssistantError::Config(format!("{program}: stdout unavailable")))?;
        tracing::info!(program = %program, "speech recognizer started");

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(pump_lines(BufReader::new(stdout), tx, "stt"));
        Ok(Self {
            channel: Channel::Voice,
            rx,
            _child: Some(child),
        })
    }
}

async fn pump_lines<R>(reader: R, tx: mpsc::Sender<String>, source: &'static str)
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!(source, "input closed");
                break;
            }
            Err(e) => {
                tracing::warn!(source, "input read error: {}", e);
                break;
            }
        }
    }
}

#[async_trait]
impl InputSource for LineInput {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// 预置输入（测试用）；hang_when_empty 时用尽后永远等待，用于模拟无人应答
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
    hang_when_empty: bool,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            hang_when_empty: false,
        }
    }

    pub fn hang_when_empty(mut self) -> Self {
        self.hang_when_empty = true;
        self
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    fn channel(&self) -> Channel {
        Channel::Console
    }

    async fn next_line(&mut self) -> Option<String> {
        match self.lines.pop_front() {
            Some(line) => Some(line),
            None if self.hang_when_empty => std::future::pending().await,
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receiver_input() {
        let (tx, rx) = mpsc::channel(4);
        let mut input = LineInput::from_receiver(Channel::Voice, rx);
        tx.send("hello".to_string()).await.unwrap();
        drop(tx);
        assert_eq!(input.channel(), Channel::Voice);
        assert_eq!(input.next_line().await.as_deref(), Some("hello"));
        assert_eq!(input.next_line().await, None);
    }

    #[tokio::test]
    async fn test_pump_lines_reads_all() {
        let (tx, mut rx) = mpsc::channel(4);
        pump_lines(BufReader::new(&b"one\ntwo\n"[..]), tx, "test").await;
        assert_eq!(rx.recv().await.as_deref(), Some("one"));
        assert_eq!(rx.recv().await.as_deref(), Some("two"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_scripted_hangs_when_asked() {
        let mut input = ScriptedInput::new(["a"]).hang_when_empty();
        assert_eq!(input.next_line().await.as_deref(), Some("a"));
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(20), input.next_line()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_voice_requires_command() {
        let err = LineInput::voice(&AudioSection::default()).err().unwrap();
        assert!(matches!(err, AssistantError::Config(_)));
    }
}
