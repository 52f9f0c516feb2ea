//! cb-gateway: Appointment Booking Assistant
//!
//! Usage:
//!   cb-gateway                 - Start the interactive chat
//!   cb-gateway -e "<message>"  - Answer one message and exit
//!   cb-gateway --help          - Show help

mod cli;

use std::sync::Arc;

use cb_agent::{
    register_booking_tools, Assistant, BookingWorkflow, GuidedAssistant, IntentValidator,
    LlmAssistant, WorkflowPolicy,
};
use cb_calendar::{CalendarClient, CalendarContext, GoogleCalendarClient, InMemoryCalendar};
use cb_core::{CalendarBackend, Config, LlmClient, ToolManager};
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Interactive chat
    Chat,
    /// Answer one message and exit
    Execute(String),
    Help,
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args()?;

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("cb-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Logs go to stderr so they never interleave with replies
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting cb-gateway...");
    tracing::info!(
        "Calendar backend: {:?}, time zone: {}",
        config.calendar.backend,
        config.booking.timezone
    );

    let mut assistant = build_assistant(&config)?;

    match mode {
        RunMode::Execute(message) => cli::run_execute(assistant.as_mut(), &message).await,
        _ => cli::run_cli(assistant.as_mut()).await,
    }
}

/// Parse command line arguments
fn parse_args() -> anyhow::Result<RunMode> {
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--execute" | "-e" => {
                let message = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("{} needs a message", arg))?;
                return Ok(RunMode::Execute(message));
            }
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(RunMode::Chat)
}

fn print_help() {
    println!("cb-gateway - Appointment Booking Assistant");
    println!();
    println!("Usage:");
    println!("  cb-gateway                  Start the interactive chat");
    println!("  cb-gateway -e \"<message>\"   Answer one message and exit");
    println!("  cb-gateway --help           Show this help message");
    println!("  cb-gateway --version        Show version");
    println!();
    println!("Configuration is read from ./cb-gateway.toml when present, then from");
    println!("the environment (a .env file is loaded first).");
    println!();
    println!("Environment Variables:");
    println!("  LLM_API_KEY                  API key (without it the rule-based assistant is used)");
    println!("  LLM_MODEL                    Model name (default: claude-sonnet-4-20250514)");
    println!("  LLM_PROVIDER                 Provider: claude or openai (default: claude)");
    println!("  LLM_BASE_URL                 Custom API endpoint");
    println!("  CALENDAR_BACKEND             google or memory (default: google)");
    println!("  GOOGLE_CALENDAR_ID           Calendar to book into (google backend)");
    println!("  GOOGLE_CALENDAR_ACCESS_TOKEN OAuth bearer token (google backend)");
    println!("  BOOKING_TIMEZONE             IANA time zone of the user (default: UTC)");
    println!("  BOOKING_SEARCH_WINDOW_DAYS   Days searched around a busy slot (default: 7)");
    println!("  BOOKING_MAX_SUGGESTIONS      Alternatives offered on conflict (default: 5)");
    println!("  BOOKING_WORKING_HOURS        Local hours alternatives are offered in (default: 09:00-17:00)");
    println!("  RUST_LOG                     Log filter (default: info)");
}

fn build_calendar(config: &Config) -> anyhow::Result<Arc<dyn CalendarClient>> {
    match config.calendar.backend {
        CalendarBackend::Google => {
            let context = CalendarContext::from_config(&config.calendar)
                .map_err(|e| anyhow::anyhow!("Failed to set up the calendar: {}", e))?;
            tracing::info!("Using Google calendar {}", context.calendar_id());
            Ok(Arc::new(GoogleCalendarClient::new(context)))
        }
        CalendarBackend::Memory => {
            tracing::warn!("Using the in-memory calendar; bookings are lost on exit");
            Ok(Arc::new(InMemoryCalendar::new()))
        }
    }
}

fn build_assistant(config: &Config) -> anyhow::Result<Box<dyn Assistant>> {
    let calendar = build_calendar(config)?;
    let policy = WorkflowPolicy::from_config(&config.booking)
        .map_err(|e| anyhow::anyhow!("Invalid booking settings: {}", e))?;
    let workflow = Arc::new(BookingWorkflow::new(calendar, policy));
    let validator = Arc::new(
        IntentValidator::from_config(&config.booking)
            .map_err(|e| anyhow::anyhow!("Invalid booking settings: {}", e))?,
    );

    if !config.llm.is_configured() {
        tracing::info!("No LLM_API_KEY set; using the rule-based assistant");
        let assistant = GuidedAssistant::new(workflow, validator)
            .map_err(|e| anyhow::anyhow!("Failed to start the assistant: {}", e))?;
        return Ok(Box::new(assistant));
    }

    let client = LlmClient::new(&config.llm)
        .map_err(|e| anyhow::anyhow!("Failed to create LLM client: {}", e))?;
    tracing::info!("Model: {}", config.llm.model);

    let mut tools = ToolManager::new();
    register_booking_tools(&mut tools, workflow, validator.clone());
    tracing::info!("Registered tools: {:?}", tools.tool_names());

    let assistant = LlmAssistant::new(Arc::new(client), tools, validator.tz())
        .with_max_iterations(config.llm.max_iterations);
    Ok(Box::new(assistant))
}
