//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. cb-gateway.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "cb-gateway.toml";

/// LLM Provider type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic Claude API
    #[default]
    Claude,
    /// OpenAI-compatible API (GLM, Gemini, etc.)
    OpenAi,
}

impl LlmProvider {
    /// Parse a provider name; anything unknown falls back to Claude
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "openai" | "glm" | "zai" | "gemini" | "google" => Self::OpenAi,
            _ => Self::Claude,
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key (empty = no LLM, the guided assistant is used)
    pub api_key: String,

    /// Model to use
    pub model: String,

    /// API provider
    pub provider: LlmProvider,

    /// Base URL (optional, for custom endpoints)
    pub base_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum model round-trips per user turn
    pub max_iterations: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            provider: LlmProvider::Claude,
            base_url: None,
            timeout_secs: 120,
            max_iterations: 10,
        }
    }
}

impl LlmConfig {
    /// Whether an LLM endpoint can be used at all
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

/// Which calendar implementation backs the booking workflow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CalendarBackend {
    /// Google Calendar v3 REST API
    #[default]
    Google,
    /// Process-local calendar, nothing leaves the machine
    Memory,
}

impl CalendarBackend {
    fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(Error::Config(format!("Unknown calendar backend: {}", other))),
        }
    }
}

/// Calendar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub backend: CalendarBackend,

    /// Google calendar ID (e.g. "primary" or "xxx@group.calendar.google.com")
    pub calendar_id: Option<String>,

    /// Pre-provisioned OAuth bearer token for the calendar API
    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    /// API base URL
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            backend: CalendarBackend::Google,
            calendar_id: None,
            access_token: None,
            base_url: default_calendar_base_url(),
            timeout_secs: 30,
        }
    }
}

fn default_calendar_base_url() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

/// Booking policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// IANA time zone used to read naive times and to render replies
    pub timezone: String,

    /// Days searched on each side of the requested slot
    pub search_window_days: u32,

    /// Maximum alternatives offered on conflict
    pub max_suggestions: usize,

    /// How far in the future a booking may start
    pub horizon_days: u32,

    /// Longest bookable slot
    pub max_duration_minutes: u32,

    /// Title used when the user gives none
    pub default_title: String,

    /// Local `HH:MM-HH:MM` range alternatives are offered in
    pub working_hours: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            search_window_days: 7,
            max_suggestions: 5,
            horizon_days: 365,
            max_duration_minutes: 480,
            default_title: "Appointment".to_string(),
            working_hours: "09:00-17:00".to_string(),
        }
    }
}

impl BookingConfig {
    /// Parsed time zone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| Error::Config(format!("Invalid time zone '{}': {}", self.timezone, e)))
    }

    /// Parsed working day as (start, end), start before end
    pub fn working_hours(&self) -> Result<(NaiveTime, NaiveTime)> {
        let invalid = || {
            Error::Config(format!(
                "Invalid working hours '{}': expected HH:MM-HH:MM with start before end",
                self.working_hours
            ))
        };

        let (start, end) = self.working_hours.split_once('-').ok_or_else(invalid)?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").map_err(|_| invalid())?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").map_err(|_| invalid())?;
        if start >= end {
            return Err(invalid());
        }
        Ok((start, end))
    }
}

/// Main configuration for cb-gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub calendar: CalendarConfig,
    pub booking: BookingConfig,
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 設定ファイル内の `${VAR_NAME}` は環境変数の値に置換され、
    /// その後で環境変数による上書きが適用されます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&toml_content)?;
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// Parse TOML content without consulting environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded_content = Self::expand_env_vars(content);

        let config: TomlConfig = toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        Self::from_toml_config(config)
    }

    /// デフォルトパスから設定を読み込む
    ///
    /// `./cb-gateway.toml` があればそれを使い、なければ環境変数のみで構成します。
    pub fn load() -> Result<Self> {
        let cfg = if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_toml_file(DEFAULT_CONFIG_FILE)?
        } else {
            Self::from_env()?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// TOML 構造から Config を構築
    fn from_toml_config(toml: TomlConfig) -> Result<Self> {
        let defaults = Config::default();

        let llm = toml.llm.unwrap_or_default();
        let llm_config = LlmConfig {
            api_key: llm.api_key.unwrap_or_default(),
            model: llm.model.unwrap_or(defaults.llm.model),
            provider: llm
                .provider
                .as_deref()
                .map(LlmProvider::from_name)
                .unwrap_or_default(),
            base_url: llm.base_url.filter(|u| !u.is_empty()),
            timeout_secs: llm.timeout_secs.unwrap_or(defaults.llm.timeout_secs),
            max_iterations: llm.max_iterations.unwrap_or(defaults.llm.max_iterations),
        };

        let calendar = toml.calendar.unwrap_or_default();
        let calendar_config = CalendarConfig {
            backend: match calendar.backend.as_deref() {
                Some(name) => CalendarBackend::from_name(name)?,
                None => CalendarBackend::default(),
            },
            calendar_id: calendar.calendar_id.filter(|id| !id.is_empty()),
            access_token: calendar.access_token.filter(|t| !t.is_empty()),
            base_url: calendar.base_url.unwrap_or(defaults.calendar.base_url),
            timeout_secs: calendar.timeout_secs.unwrap_or(defaults.calendar.timeout_secs),
        };

        let booking = toml.booking.unwrap_or_default();
        let booking_config = BookingConfig {
            timezone: booking.timezone.unwrap_or(defaults.booking.timezone),
            search_window_days: booking
                .search_window_days
                .unwrap_or(defaults.booking.search_window_days),
            max_suggestions: booking
                .max_suggestions
                .unwrap_or(defaults.booking.max_suggestions),
            horizon_days: booking.horizon_days.unwrap_or(defaults.booking.horizon_days),
            max_duration_minutes: booking
                .max_duration_minutes
                .unwrap_or(defaults.booking.max_duration_minutes),
            default_title: booking
                .default_title
                .unwrap_or(defaults.booking.default_title),
            working_hours: booking
                .working_hours
                .unwrap_or(defaults.booking.working_hours),
        };

        Ok(Config {
            llm: llm_config,
            calendar: calendar_config,
            booking: booking_config,
        })
    }

    /// 環境変数で設定を上書きする
    fn apply_env_overrides(&mut self) -> Result<()> {
        // LLM 設定の上書き
        if let Some(api_key) = env_non_empty("LLM_API_KEY") {
            self.llm.api_key = api_key;
        }
        if let Some(model) = env_non_empty("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(provider) = env_non_empty("LLM_PROVIDER") {
            self.llm.provider = LlmProvider::from_name(&provider);
        }
        if let Some(base_url) = env_non_empty("LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }
        if let Some(secs) = env_parsed("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = secs;
        }

        // Calendar 設定の上書き
        if let Some(backend) = env_non_empty("CALENDAR_BACKEND") {
            self.calendar.backend = CalendarBackend::from_name(&backend)?;
        }
        if let Some(id) = env_non_empty("GOOGLE_CALENDAR_ID") {
            self.calendar.calendar_id = Some(id);
        }
        if let Some(token) = env_non_empty("GOOGLE_CALENDAR_ACCESS_TOKEN") {
            self.calendar.access_token = Some(token);
        }
        if let Some(base_url) = env_non_empty("GOOGLE_CALENDAR_BASE_URL") {
            self.calendar.base_url = base_url;
        }
        if let Some(secs) = env_parsed("CALENDAR_TIMEOUT_SECS") {
            self.calendar.timeout_secs = secs;
        }

        // Booking 設定の上書き
        if let Some(tz) = env_non_empty("BOOKING_TIMEZONE") {
            self.booking.timezone = tz;
        }
        if let Some(days) = env_parsed("BOOKING_SEARCH_WINDOW_DAYS") {
            self.booking.search_window_days = days;
        }
        if let Some(max) = env_parsed("BOOKING_MAX_SUGGESTIONS") {
            self.booking.max_suggestions = max;
        }
        if let Some(days) = env_parsed("BOOKING_HORIZON_DAYS") {
            self.booking.horizon_days = days;
        }
        if let Some(hours) = env_non_empty("BOOKING_WORKING_HOURS") {
            self.booking.working_hours = hours;
        }

        Ok(())
    }

    /// Reject configurations that cannot work at runtime
    pub fn validate(&self) -> Result<()> {
        self.booking.tz()?;
        self.booking.working_hours()?;

        if self.booking.search_window_days == 0 {
            return Err(Error::Config("booking.search_window_days must be at least 1".to_string()));
        }
        if self.booking.max_duration_minutes == 0 {
            return Err(Error::Config("booking.max_duration_minutes must be at least 1".to_string()));
        }

        if self.calendar.backend == CalendarBackend::Google {
            if self.calendar.calendar_id.is_none() {
                return Err(Error::Config(
                    "GOOGLE_CALENDAR_ID is required for the google backend".to_string(),
                ));
            }
            if self.calendar.access_token.is_none() {
                return Err(Error::Config(
                    "GOOGLE_CALENDAR_ACCESS_TOKEN is required for the google backend".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_non_empty(name).and_then(|v| v.trim().parse().ok())
}

// ============================================================================
// TOML 構造体定義（ファイル解析用）
// ============================================================================

/// TOML ファイル用のトップレベル構造
#[derive(Debug, Deserialize)]
struct TomlConfig {
    /// LLM 設定
    llm: Option<TomlLlmConfig>,
    /// カレンダー設定
    calendar: Option<TomlCalendarConfig>,
    /// 予約ポリシー設定
    booking: Option<TomlBookingConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlLlmConfig {
    /// API プロバイダー ("claude" または "openai")
    #[serde(default)]
    provider: Option<String>,
    /// モデル名
    #[serde(default)]
    model: Option<String>,
    /// API キー
    #[serde(default)]
    api_key: Option<String>,
    /// ベース URL (オプション)
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    max_iterations: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlCalendarConfig {
    /// "google" または "memory"
    #[serde(default)]
    backend: Option<String>,
    #[serde(default)]
    calendar_id: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlBookingConfig {
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    search_window_days: Option<u32>,
    #[serde(default)]
    max_suggestions: Option<usize>,
    #[serde(default)]
    horizon_days: Option<u32>,
    #[serde(default)]
    max_duration_minutes: Option<u32>,
    #[serde(default)]
    default_title: Option<String>,
    #[serde(default)]
    working_hours: Option<String>,
}
