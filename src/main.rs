use slog::o;
use sloggers::terminal::TerminalLoggerConfig;
use sloggers::{Config, LoggerConfig};

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_config: LoggerConfig = sooro::figment()
        .extract_inner("logger")
        .unwrap_or_else(|_| LoggerConfig::Terminal(TerminalLoggerConfig::default()));
    let logger = log_config.build_logger()?;
    let _guard = slog_scope::set_global_logger(logger.new(o!("app" => "sooro")));

    slog_scope::info!("starting");
    let _ = sooro::rocket().launch().await?;
    Ok(())
}
