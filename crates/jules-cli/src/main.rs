mod command;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use jules_client::HttpBackend;
use jules_config::{Config, ConfigManager};
use jules_observability::{new_request_id, request_span, session_span, LogManager};
use jules_session::{
    BannerKind, ChatSession, Rejection, SessionEvent, SessionOptions, StatusBanner,
    SubmitOutcome, UploadFile, UploadOutcome,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::Instrument;

use command::{ChatCommand, HELP};

#[derive(Parser)]
#[command(name = "jules")]
#[command(about = "Command line client for Jules")]
#[command(version)]
struct Cli {
    /// Backend origin, overrides the config file and JULES_API_URL
    #[arg(long)]
    server_url: Option<String>,

    /// Enable debug mode
    #[arg(long, short, default_value = "false")]
    debug: bool,

    /// Config file path
    #[arg(long, env = "JULES_CONFIG", default_value = "~/.jules/config.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动交互式聊天
    Chat,
    /// 发送单条消息
    Send {
        /// 消息内容
        message: String,
    },
    /// 上传文件到知识库
    Upload {
        /// .txt 或 .pdf 文件
        path: PathBuf,
    },
    /// 配置管理命令
    Config(ConfigArgs),
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// 获取配置值
    Get {
        /// 配置键 (如: api.base_url, chat.locale)
        key: String,
    },
    /// 设置配置值
    Set {
        /// 配置键 (如: api.base_url, chat.locale)
        key: String,
        /// 配置值，空字符串清除可选项
        value: String,
    },
    /// 初始化默认配置
    Init {
        /// 强制覆盖已有配置
        #[arg(long, default_value = "false")]
        force: bool,
    },
    /// 显示当前配置
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // 展开配置文件路径
    let config_path =
        jules_config::expand_tilde(&cli.config).unwrap_or_else(|| PathBuf::from(&cli.config));

    if cli.debug {
        eprintln!("{}", "[DEBUG] Debug mode enabled".dimmed());
        eprintln!("{}", format!("[DEBUG] Config path: {:?}", config_path).dimmed());
    }

    if let Commands::Config(args) = cli.command {
        handle_config(args, &config_path).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let manager = ConfigManager::load(&config_path).await?;
    let config = manager.snapshot().await;
    let mut log_manager = LogManager::new(&observability_config(&config, cli.debug)).await?;

    let session = build_session(&config, cli.server_url.as_deref(), cli.debug)?;
    let span = session_span(session.session_id());

    let result = match cli.command {
        Commands::Chat => run_interactive_chat(&session, &mut log_manager, cli.debug)
            .instrument(span)
            .await
            .map(|()| true),
        Commands::Send { message } => send_message(&session, message, cli.debug).instrument(span).await,
        Commands::Upload { path } => upload_path(&session, &path).instrument(span).await,
        Commands::Config(_) => Ok(true),
    };

    // flush the file appender before reporting failure
    log_manager.shutdown();
    Ok(if result? { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// stderr stays quiet unless debugging; a log file gets the configured level
fn observability_config(config: &Config, debug: bool) -> jules_observability::Config {
    let observability = jules_observability::Config::from(config);
    if debug {
        observability.with_log_level("debug")
    } else if observability.logging.file_path.is_none() {
        observability.with_log_level("warn")
    } else {
        observability
    }
}

fn build_session(config: &Config, server_url: Option<&str>, debug: bool) -> anyhow::Result<ChatSession> {
    let base = config.api.resolve_base(server_url);
    if debug {
        eprintln!("{}", format!("[DEBUG] Server URL: {}", base).dimmed());
    }

    let backend = HttpBackend::from_api_base(&base, config.api.request_timeout())?;
    let options = SessionOptions::default()
        .with_locale(config.chat.locale)
        .with_upload_policy(config.upload.policy());

    Ok(ChatSession::new(Arc::new(backend), options))
}

async fn handle_config(args: ConfigArgs, config_path: &Path) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Get { key } => {
            let manager = ConfigManager::load(config_path).await?;
            let config = manager.snapshot().await;

            match config.get_value(&key) {
                Some(value) => {
                    println!("{}", format!("{} = {}", key, value).green());
                }
                None if Config::keys().contains(&key.as_str()) => {
                    println!("{}", format!("{} is not set", key).yellow());
                }
                None => {
                    println!("{}", format!("❌ Key not found: {}", key).red());
                    std::process::exit(1);
                }
            }
        }
        ConfigCommands::Set { key, value } => {
            let manager = ConfigManager::load(config_path).await?;

            if let Err(e) = manager.update(|config| config.set_value(&key, &value)).await {
                eprintln!("{}", format!("❌ Failed to set value: {}", e).red());
                std::process::exit(1);
            }

            println!("{}", format!("✅ Set {} = {}", key, value).green());
        }
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                println!("{}", format!("⚠️  Config already exists at {:?}", config_path).yellow());
                println!("{}", "Use --force to overwrite".dimmed());
                return Ok(());
            }

            jules_config::init_jules_dirs().await?;

            let manager = ConfigManager::new(Config::default(), config_path.to_path_buf());
            manager.save().await?;

            println!("{}", format!("✅ Config initialized at {:?}", config_path).green());
            println!("{}", "You can edit this file to customize your settings".dimmed());
        }
        ConfigCommands::Show => {
            let manager = ConfigManager::load(config_path).await?;
            let config = manager.snapshot().await;

            println!("{}", "📋 Current Configuration:".cyan().bold());
            println!();
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!();
            println!(
                "{}",
                format!(
                    "Resolved API base: {} ({})",
                    config.api.resolve_base(None),
                    config.api.effective_environment()
                )
                .dimmed()
            );
        }
    }

    Ok(())
}

/// Returns whether the reply completed
async fn send_message(session: &ChatSession, message: String, debug: bool) -> anyhow::Result<bool> {
    println!("{}", format!("🚀 Sending message: {}", message).cyan());
    println!("{}", "─".repeat(50).dimmed());

    let completed = stream_reply(session, message, debug).await?;

    println!("{}", "─".repeat(50).dimmed());
    Ok(completed)
}

/// Submit and print reply text as it streams in. Returns whether the
/// exchange completed.
async fn stream_reply(session: &ChatSession, prompt: String, debug: bool) -> anyhow::Result<bool> {
    let mut events = session.subscribe();
    let printer_session = session.clone();
    let printer = tokio::spawn(async move {
        let mut printed = 0;
        loop {
            match events.recv().await {
                Ok(SessionEvent::TextAppended { index, .. }) => {
                    printed = print_new_text(&printer_session, index, printed);
                }
                Ok(SessionEvent::RequestFinished) | Err(RecvError::Closed) => break,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
            }
        }
    });

    let request_id = new_request_id();
    let outcome = session.submit(prompt).instrument(request_span(&request_id)).await;
    if matches!(outcome, SubmitOutcome::Rejected(_)) {
        printer.abort();
    } else {
        printer.await?;
    }
    println!();

    match outcome {
        SubmitOutcome::Completed { user, model } => {
            if debug {
                eprintln!("{}", format!("[DEBUG] Message ids: user={} model={}", user, model).dimmed());
            }
            Ok(true)
        }
        SubmitOutcome::Failed(e) => {
            if let Some(notice) = session.last_message() {
                println!("{}", notice.parts.red());
            }
            if debug {
                eprintln!("{}", format!("[DEBUG] Error: {:?}", e).dimmed());
            }
            Ok(false)
        }
        SubmitOutcome::Rejected(rejection) => {
            println!("{}", describe_rejection(rejection).yellow());
            Ok(false)
        }
    }
}

/// Print whatever the message at `index` gained since the last call
fn print_new_text(session: &ChatSession, index: usize, printed: usize) -> usize {
    let Some(message) = session.messages().into_iter().nth(index) else {
        return printed;
    };
    if let Some(new_text) = message.parts.get(printed..) {
        print!("{}", new_text.green());
        let _ = io::stdout().flush();
    }
    message.parts.len()
}

fn describe_rejection(rejection: Rejection) -> &'static str {
    match rejection {
        Rejection::EmptyPrompt => "⚠️  Nothing to send",
        Rejection::RequestInFlight => "⚠️  A reply is still streaming",
        Rejection::UploadInFlight => "⚠️  An upload is in progress",
    }
}

fn print_banner(banner: &StatusBanner) {
    match banner.kind {
        BannerKind::Progress => println!("{}", banner.text.cyan()),
        BannerKind::Success => println!("{}", banner.text.green()),
        BannerKind::Error => println!("{}", banner.text.red()),
    }
}

async fn upload_path(session: &ChatSession, path: &Path) -> anyhow::Result<bool> {
    let file = UploadFile::from_path(path).await?;
    println!("{}", session.options().locale.uploading(&file.file_name).cyan());

    let outcome = session.upload(file).await;
    if let Some(banner) = session.upload_status() {
        print_banner(&banner);
    }

    Ok(match outcome {
        UploadOutcome::Uploaded => true,
        UploadOutcome::Rejected(rejection) => {
            println!("{}", describe_rejection(rejection).yellow());
            false
        }
        UploadOutcome::Invalid(_) | UploadOutcome::Failed(_) => false,
    })
}

fn print_history(session: &ChatSession) {
    let branch_point = session.branch_point();
    let messages = session.messages();
    if messages.is_empty() {
        println!("{}", "(no messages yet)".dimmed());
        return;
    }

    for (index, message) in messages.iter().enumerate() {
        let marker = if branch_point.as_ref() == Some(&message.id) { "⎇" } else { " " };
        let preview: String = message.parts.chars().take(60).collect();
        let id = if message.is_branchable() {
            message.id.to_string().normal()
        } else {
            message.id.to_string().dimmed()
        };
        println!(
            "{} {:>3}  {:<5}  {}  {}",
            marker,
            index,
            message.role.to_string(),
            id,
            preview.replace('\n', " ")
        );
    }
}

async fn run_interactive_chat(
    session: &ChatSession,
    log_manager: &mut LogManager,
    debug: bool,
) -> anyhow::Result<()> {
    println!("{}", "🤖 Jules Interactive Chat".cyan().bold());
    println!("{}", format!("Session ID: {}", session.session_id()).dimmed());
    println!("{}", "Type /help for commands, /quit to leave".dimmed());
    println!();

    loop {
        let prompt = if session.is_branching() { "You (branch):" } else { "You:" };
        print!("{} ", prompt.cyan().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        match ChatCommand::parse(&input) {
            ChatCommand::Empty => continue,
            ChatCommand::Quit => break,
            ChatCommand::Help => println!("{}", HELP.dimmed()),
            ChatCommand::History => print_history(session),
            ChatCommand::Prompt(text) => {
                println!("{}", "Jules:".green().bold());
                stream_reply(session, text, debug).await?;
            }
            ChatCommand::Send => {
                println!("{}", "Jules:".green().bold());
                stream_reply(session, session.draft(), debug).await?;
            }
            ChatCommand::Branch(index) => match session.begin_branch_at(index) {
                Ok(id) => {
                    println!("{}", format!("⎇ Branching from {}", id).yellow());
                    println!("{}", format!("Draft: {}", session.draft()).dimmed());
                    println!("{}", "/send to submit, /edit <text> to change it, /cancel to stop".dimmed());
                }
                Err(e) => println!("{}", format!("❌ {}", e).red()),
            },
            ChatCommand::Edit(text) => {
                session.set_draft(text);
                println!("{}", format!("Draft: {}", session.draft()).dimmed());
            }
            ChatCommand::Cancel => {
                session.cancel_branch();
                println!("{}", "Branch cancelled".dimmed());
            }
            ChatCommand::Upload(path) => {
                if let Err(e) = upload_path(session, &path).await {
                    println!("{}", format!("❌ {}", e).red());
                }
            }
            ChatCommand::LogLevel(None) => {
                println!("{}", format!("Log filter: {}", log_manager.config().level).dimmed());
            }
            ChatCommand::LogLevel(Some(level)) => match log_manager.update_level(&level) {
                Ok(()) => println!("{}", format!("Log filter set to {}", level).green()),
                Err(e) => println!("{}", format!("❌ {}", e).red()),
            },
            ChatCommand::Invalid(message) => println!("{}", format!("❌ {}", message).red()),
        }
        println!();
    }

    println!("{}", "👋 Goodbye!".cyan());
    Ok(())
}
