//! Command-line argument parsing for the two `meshc2` binaries.
//!
//! Defines the CLI structure using clap derive macros, following the same
//! shape as a single-binary tool's `Cli`/`Commands` split: one top-level
//! struct per binary, global flags marked `global = true`.

use std::time::Duration;

use clap::Parser;

/// `meshc2-agent`: waits for commands over the mesh transport and executes
/// them locally.
#[derive(Parser, Debug)]
#[command(name = "meshc2-agent")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"Examples:
  meshc2-agent                          # auto-discover the serial device
  meshc2-agent --port /dev/ttyUSB0      # pin a specific device
  meshc2-agent --max-payload 230 -v     # wider frames, verbose logging
"#)]
pub struct AgentArgs {
    /// Serial device path. Falls back to `MESHC2_PORT`, then auto-discovery.
    #[arg(long, env = "MESHC2_PORT")]
    pub port: Option<String>,

    /// Mesh channel index to listen on.
    #[arg(long, env = "MESHC2_CHANNEL")]
    pub channel_index: Option<u32>,

    /// Per-command execution ceiling, in seconds.
    #[arg(long, env = "MESHC2_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Wire-frame size bound, in bytes.
    #[arg(long, env = "MESHC2_MAX_PAYLOAD")]
    pub max_payload: Option<usize>,

    /// Seconds to wait for a serial device before giving up.
    #[arg(long, env = "MESHC2_PORT_WAIT")]
    pub port_wait: Option<u64>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl AgentArgs {
    #[must_use]
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    #[must_use]
    pub fn port_wait_duration(&self) -> Option<Duration> {
        self.port_wait.map(Duration::from_secs)
    }
}

/// `meshc2-controller`: sends a single command and assembles its reply.
#[derive(Parser, Debug)]
#[command(name = "meshc2-controller")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"Examples:
  meshc2-controller --command "whoami"
  meshc2-controller --command "ls -la" --port /dev/ttyUSB0 --timeout 30
  meshc2-controller --command "cd /tmp && pwd" --format json
"#)]
pub struct ControllerArgs {
    /// The command to run on the remote agent.
    #[arg(long)]
    pub command: String,

    /// Serial device path. Falls back to `MESHC2_PORT`, then auto-discovery.
    #[arg(long, env = "MESHC2_PORT")]
    pub port: Option<String>,

    /// Mesh channel index to send/listen on.
    #[arg(long, env = "MESHC2_CHANNEL")]
    pub channel: Option<u32>,

    /// Maximum time to wait for the full reply, in seconds.
    #[arg(long, env = "MESHC2_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Initial paging-retry interval, in seconds.
    #[arg(long, env = "MESHC2_MORE_DELAY")]
    pub more_delay: Option<u64>,

    /// Seconds to wait for a serial device before giving up.
    #[arg(long, env = "MESHC2_PORT_WAIT")]
    pub port_wait: Option<u64>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl ControllerArgs {
    #[must_use]
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    #[must_use]
    pub fn more_delay_duration(&self) -> Option<Duration> {
        self.more_delay.map(Duration::from_secs)
    }

    #[must_use]
    pub fn port_wait_duration(&self) -> Option<Duration> {
        self.port_wait.map(Duration::from_secs)
    }
}

/// Result rendering format shared by the controller's `--format` flag.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text: the assembled output, or a timeout summary.
    Text,
    /// A single-line JSON object.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn agent_args_parse_with_no_flags() {
        let args = AgentArgs::parse_from(["meshc2-agent"]);
        assert!(args.port.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn controller_args_require_command() {
        let result = ControllerArgs::try_parse_from(["meshc2-controller"]);
        assert!(result.is_err());
    }

    #[test]
    fn controller_args_parse_with_command() {
        let args = ControllerArgs::parse_from(["meshc2-controller", "--command", "whoami"]);
        assert_eq!(args.command, "whoami");
        assert_eq!(args.format, OutputFormat::Text);
    }

    #[test]
    fn agent_args_command_is_well_formed() {
        AgentArgs::command().debug_assert();
    }

    #[test]
    fn controller_args_command_is_well_formed() {
        ControllerArgs::command().debug_assert();
    }
}
