//! Command line and environment configuration

use crate::agent::{AgentError, Credentials, PollConfig};
use crate::assistants::DEFAULT_BASE_URL;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const ASSISTANT_ID_ENV: &str = "OPENAI_ASSISTANT_ID";

#[derive(Parser, Debug)]
#[command(
    name = "thread-agent",
    version,
    about = "Relay chat turns to a remote assistant over its thread/run API"
)]
pub struct Cli {
    #[command(flatten)]
    pub agent: AgentArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the chat endpoint and the web UI
    Serve {
        #[arg(long, env = "AGENT_PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Interactive menu on the terminal
    Console,
}

/// Settings shared by both front ends
#[derive(Args, Debug, Clone)]
pub struct AgentArgs {
    /// API token; the console asks for it when missing
    #[arg(long, global = true, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Assistant to talk to; the console asks for it when missing
    #[arg(long, global = true, env = ASSISTANT_ID_ENV)]
    pub assistant_id: Option<String>,

    #[arg(long, global = true, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Delay between run status checks
    #[arg(long, global = true, env = "AGENT_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Give up on a run after this long; 0 waits forever
    #[arg(long, global = true, env = "AGENT_MAX_WAIT_SECS", default_value_t = 120)]
    pub max_wait_secs: u64,

    /// Give up on a run after this many status checks
    #[arg(long, global = true, env = "AGENT_MAX_POLL_ATTEMPTS")]
    pub max_poll_attempts: Option<u32>,

    /// Timeout of each HTTP request to the API
    #[arg(long, global = true, env = "AGENT_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,
}

impl AgentArgs {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            max_wait: (self.max_wait_secs > 0).then(|| Duration::from_secs(self.max_wait_secs)),
            max_attempts: self.max_poll_attempts.filter(|n| *n > 0),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Credentials for non-interactive use: both values must be present
    pub fn require_credentials(&self) -> Result<Credentials, AgentError> {
        let api_key = present(self.api_key.as_deref())
            .ok_or_else(|| AgentError::Configuration(format!("{API_KEY_ENV} is not set")))?;
        let assistant_id = present(self.assistant_id.as_deref())
            .ok_or_else(|| AgentError::Configuration(format!("{ASSISTANT_ID_ENV} is not set")))?;
        Credentials::new(api_key, Some(assistant_id.to_string()))
    }
}

/// Treat blank values like missing ones
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
