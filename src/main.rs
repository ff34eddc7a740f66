use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use esp_header::{PluginFile, SUPPORTED_EXTENSIONS};
use esp_header::utils::create_backup;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "esp_header")]
#[command(about = "读取和修改ESP/ESM/ESL文件的TES4头部记录")]
#[command(version)]
struct Cli {
    /// 日志详细程度（可重复：-v info, -vv debug, -vvv trace）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// 静默模式(仅输出错误)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 显示插件头部信息
    Info {
        /// 输入ESP/ESM/ESL文件路径
        input: PathBuf,

        /// 以JSON格式输出
        #[arg(long)]
        json: bool,
    },
    /// 设置或清除轻量插件(ESL)标志
    SetLight {
        /// 输入ESP/ESM/ESL文件路径
        input: PathBuf,

        /// 清除标志而不是设置
        #[arg(long)]
        disable: bool,

        /// 输出文件路径（默认原地修改）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 原地修改时不创建备份
        #[arg(long)]
        no_backup: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match &cli.command {
        Command::Info { input, json } => {
            validate_input(input)?;
            handle_info(input, *json)
        }
        Command::SetLight { input, disable, output, no_backup } => {
            validate_input(input)?;
            handle_set_light(&cli, input, !*disable, output.as_deref(), *no_backup)
        }
    }
}

/// 初始化日志输出（只看命令行参数，不读取环境变量）
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("esp_header={}", level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// 验证输入文件
fn validate_input(input: &Path) -> anyhow::Result<()> {
    if !input.exists() {
        bail!("输入文件不存在: {:?}", input);
    }

    let extension = input.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    if !SUPPORTED_EXTENSIONS.iter().any(|&ext| Some(ext) == extension.as_deref()) {
        bail!("输入文件必须是ESP、ESM或ESL文件");
    }

    Ok(())
}

/// 处理信息显示
fn handle_info(input: &Path, json: bool) -> anyhow::Result<()> {
    let plugin = PluginFile::open(input)
        .with_context(|| format!("无法解析插件: {:?}", input))?;
    let summary = plugin.summary();

    if json {
        println!("{}", summary.to_json()?);
    } else {
        print!("{}", summary);
    }
    Ok(())
}

/// 处理轻量插件标志修改
fn handle_set_light(
    cli: &Cli,
    input: &Path,
    enable: bool,
    output: Option<&Path>,
    no_backup: bool,
) -> anyhow::Result<()> {
    let mut plugin = PluginFile::open(input)
        .with_context(|| format!("无法解析插件: {:?}", input))?;

    if output.is_none() && plugin.is_light() == enable {
        if !cli.quiet {
            println!("轻量插件标志已经是 {}，无需修改", enable);
        }
        return Ok(());
    }

    plugin.set_light(enable);

    let written = match output {
        Some(output) => {
            plugin.write(output)
                .with_context(|| format!("写入失败: {:?}", output))?;
            output.to_path_buf()
        }
        None => {
            if !no_backup {
                let backup_path = create_backup(input)?;
                if !cli.quiet {
                    println!("已创建备份文件: {:?}", backup_path);
                }
            }
            write_in_place(plugin, input)?;
            input.to_path_buf()
        }
    };

    if !cli.quiet {
        println!(
            "已{}轻量插件标志: {:?}",
            if enable { "设置" } else { "清除" },
            written
        );
    }
    Ok(())
}

/// 先写入临时文件，成功后替换原文件
fn write_in_place(mut plugin: PluginFile, input: &Path) -> anyhow::Result<()> {
    let file_name = input.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .context("无法获取插件名称")?;
    let temp_path = input.with_file_name(format!("{}.tmp", file_name));

    if let Err(e) = plugin.write(&temp_path) {
        if let Err(cleanup) = std::fs::remove_file(&temp_path) {
            tracing::warn!(path = %temp_path.display(), error = %cleanup, "failed to remove temporary file");
        }
        return Err(e).with_context(|| format!("写入临时文件失败: {:?}", temp_path));
    }

    // 替换前先关闭源文件句柄
    drop(plugin);
    std::fs::rename(&temp_path, input)
        .with_context(|| format!("替换原文件失败: {:?}", input))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use esp_header::{Record, RecordFlags, RecordStyle, Subrecord};
    use tempfile::TempDir;

    fn write_test_plugin(path: &Path) {
        let mut data = Vec::new();
        Subrecord::new(*b"CNAM", b"Orcax\0".to_vec()).write_to(&mut data).unwrap();
        let style = RecordStyle::Modern { version_marker: [0x2C, 0, 0, 0] };
        let record = Record::new(*b"TES4", RecordFlags::empty(), 0, 1, style, data);

        let mut bytes = Vec::new();
        record.write_to(&mut bytes).unwrap();
        bytes.extend_from_slice(b"GRUP rest of file");
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_write_in_place_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Mod.esp");
        write_test_plugin(&path);

        let mut plugin = PluginFile::open(&path).unwrap();
        plugin.set_light(true);
        write_in_place(plugin, &path).unwrap();

        assert!(PluginFile::open(&path).unwrap().is_light());
        assert!(!dir.path().join("Mod.esp.tmp").exists());
    }

    #[test]
    fn test_write_in_place_failure_keeps_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Mod.esp");
        write_test_plugin(&path);
        let original = std::fs::read(&path).unwrap();

        // 临时路径被目录占用：写入失败，清理也失败（只记录警告）
        let temp_path = dir.path().join("Mod.esp.tmp");
        std::fs::create_dir(&temp_path).unwrap();

        let mut plugin = PluginFile::open(&path).unwrap();
        plugin.set_light(true);
        assert!(write_in_place(plugin, &path).is_err());

        assert_eq!(std::fs::read(&path).unwrap(), original);
        assert!(temp_path.is_dir());
    }
}
