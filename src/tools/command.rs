//! 外部命令执行：屏幕截图、OCR、xdotool、ffmpeg、TTS 等都通过命令模板调用
//!
//! 模板第一项为程序名，其余为参数；`{name}` 形式的占位符按 vars 替换。直接 exec，不经过 shell。
//! 替换是单趟的：填入的值不会再被当作模板解析。

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// 用 vars 替换模板中的占位符；模板为空时报错
pub fn render_command(template: &[String], vars: &[(&str, &str)]) -> Result<(String, Vec<String>), String> {
    let mut parts = template.iter().map(|part| fill_placeholders(part, vars));
    let program = parts
        .next()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| "Empty command template".to_string())?;
    Ok((program, parts.collect()))
}

fn fill_placeholders(part: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(part.len());
    let mut rest = part;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let hit = after.find('}').and_then(|end| {
            let key = &after[..end];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (end, *value))
        });
        match hit {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            // 未知占位符原样保留
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// 执行命令并等待结束，返回 stdout；非零退出码或超时都视为失败
pub async fn run_command(
    template: &[String],
    vars: &[(&str, &str)],
    timeout: Duration,
) -> Result<String, String> {
    let (program, args) = render_command(template, vars)?;
    tracing::debug!(program = %program, ?args, "run external command");

    let mut cmd = Command::new(&program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| format!("{program} timed out after {}s", timeout.as_secs()))?
        .map_err(|e| format!("Failed to run {program}: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// 启动命令后不等待（TTS 播报用），失败只记日志
pub fn spawn_detached(template: &[String], vars: &[(&str, &str)]) {
    let (program, args) = match render_command(template, vars) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("{}", e);
            return;
        }
    };
    let mut cmd = Command::new(&program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    match cmd.spawn() {
        Ok(mut child) => {
            tokio::spawn(async move {
                if let Err(e) = child.wait().await {
                    tracing::warn!(program = %program, "detached command failed: {}", e);
                }
            });
        }
        Err(e) => tracing::warn!(program = %program, "failed to spawn: {}", e),
    }
}
