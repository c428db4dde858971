use std::io::{self, BufRead, Write};

use geomkit_engine::command::{CommandBus, CommandContext, CommandRequest, CommandResponse};
use geomkit_engine::session::Session;
use tracing::debug;

/// 按空白切分一行命令，支持用单/双引号包住含空格的参数。
pub fn split_args(line: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut pending = false;

    for ch in line.chars() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                pending = true;
            }
            None if ch.is_whitespace() => {
                if pending {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            None => {
                current.push(ch);
                pending = true;
            }
        }
    }
    if let Some(open) = quote {
        return Err(format!("引号 {open} 未闭合"));
    }
    if pending {
        args.push(current);
    }
    Ok(args)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStats {
    pub executed: usize,
    pub failed: usize,
}

/// 逐行执行命令脚本；空行与 `#` 开头的注释行跳过。每条命令的结果写入 `out`。
pub fn run_script<R: BufRead, W: Write>(
    reader: R,
    out: &mut W,
    bus: &CommandBus,
    session: &mut Session,
) -> io::Result<ScriptStats> {
    let mut stats = ScriptStats::default();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let response = match split_args(trimmed) {
            Ok(parts) if parts.is_empty() => continue,
            Ok(mut parts) => {
                let name = parts.remove(0);
                debug!(line = number + 1, command = %name, "执行命令");
                if name == "help" {
                    CommandResponse::ok(help_text(bus))
                } else {
                    let request = CommandRequest { name, args: parts };
                    let mut context = CommandContext {
                        session: &mut *session,
                    };
                    bus.dispatch(&request, &mut context)
                }
            }
            Err(message) => CommandResponse::err(message),
        };

        stats.executed += 1;
        if !response.success {
            stats.failed += 1;
        }
        let marker = if response.success { "ok" } else { "error" };
        writeln!(
            out,
            "[{}] {marker}: {}",
            number + 1,
            response.message.as_deref().unwrap_or_default()
        )?;
    }
    Ok(stats)
}

fn help_text(bus: &CommandBus) -> String {
    let lines: Vec<String> = bus
        .available_commands()
        .into_iter()
        .map(|name| format!("  {name} {}", bus.usage(name).unwrap_or_default()))
        .collect();
    format!("可用命令:\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handles_quotes() {
        assert_eq!(
            split_args("add_point P \"1 + 2\" '3'").unwrap(),
            vec!["add_point", "P", "1 + 2", "3"]
        );
        assert_eq!(split_args("  status  ").unwrap(), vec!["status"]);
        assert_eq!(split_args("x \"\"").unwrap(), vec!["x", ""]);
        assert!(split_args("add_point \"P").is_err());
    }

    #[test]
    fn script_reports_each_command() {
        let script = "\
# 直角
add_point O 0 0
add_point A 3 0
add_point B 0 3

add_segment O A
add_segment O B
add_segment O Z
analyze
";
        let bus = CommandBus::new();
        let mut session = Session::new();
        let mut out = Vec::new();
        let stats = run_script(script.as_bytes(), &mut out, &bus, &mut session).unwrap();
        assert_eq!(stats, ScriptStats { executed: 7, failed: 1 });

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("[8] error: point 'Z' does not exist"));
        assert!(output.contains("OA ⊥ OB"));
        assert_eq!(session.store().segment_count(), 2);
    }

    #[test]
    fn help_lists_commands() {
        let bus = CommandBus::new();
        let mut session = Session::new();
        let mut out = Vec::new();
        run_script("help\n".as_bytes(), &mut out, &bus, &mut session).unwrap();
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("add_point NAME X Y [Z]"));
        assert!(output.contains("vector OP V1 V2"));
    }
}
