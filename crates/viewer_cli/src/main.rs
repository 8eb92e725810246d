use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use viewer_cli::{run, CommandKind, CommonOptions};

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }

    let mut options = CommonOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        let flag = args[index].as_str();
        if !flag.starts_with("--") {
            break;
        }
        let value = args
            .get(index + 1)
            .ok_or_else(|| format!("missing value for {flag}"))?;
        match flag {
            "--host" => options.host = value.clone(),
            "--port" => options.port = parse_flag(flag, value, "u16")?,
            "--timeout-ms" => options.timeout_ms = parse_flag(flag, value, "u64")?,
            "--retry-ms" => options.retry_ms = parse_flag(flag, value, "u64")?,
            "--width" => options.width = parse_flag(flag, value, "u32")?,
            "--height" => options.height = parse_flag(flag, value, "u32")?,
            "--out-dir" => options.out_dir = Some(PathBuf::from(value)),
            other => return Err(format!("unknown option '{other}'")),
        }
        index += 2;
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];

    let kind = match command {
        "watch" => {
            if !command_args.is_empty() {
                return Err("watch takes no arguments".to_string());
            }
            CommandKind::Watch
        }
        "click" => {
            let [x, y] = command_args else {
                return Err("click requires <x> <y>".to_string());
            };
            CommandKind::Click {
                x: parse_flag("click x", x, "i32")?,
                y: parse_flag("click y", y, "i32")?,
            }
        }
        "text" => {
            if command_args.is_empty() {
                return Err("text requires a value".to_string());
            }
            CommandKind::Text {
                value: command_args.join(" "),
            }
        }
        "script" => {
            let [path] = command_args else {
                return Err("script requires exactly one file path".to_string());
            };
            CommandKind::Script { path: path.clone() }
        }
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    run(kind, options, &mut io::stdout())
}

fn parse_flag<T: std::str::FromStr>(flag: &str, value: &str, expected: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("invalid {flag} value '{value}' (expected {expected})"))
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "viewer_cli - headless board host viewer",
        "",
        "Usage:",
        "  viewer_cli [options] watch",
        "  viewer_cli [options] click <x> <y>",
        "  viewer_cli [options] text <value...>",
        "  viewer_cli [options] script <file>",
        "",
        "Options:",
        "  --host <addr>       default 127.0.0.1",
        "  --port <u16>        default 46100",
        "  --timeout-ms <u64>  default 5000",
        "  --retry-ms <u64>    default 100",
        "  --width <u32>       default 1000",
        "  --height <u32>      default 800",
        "  --out-dir <dir>     save received frames as frame_NNNN.png",
        "",
        "Script lines: click X Y | text VALUE | resize W H | wait MS | quit",
    ]
    .join("\n")
}
