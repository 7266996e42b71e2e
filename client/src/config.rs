//! Client settings, parsed from the command line by the binary.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ClientArgs {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    pub server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    pub fake_ping: u64,

    /// Movement script, e.g. "R R U UL . D" (random walk when absent)
    #[arg(long)]
    pub script: Option<String>,

    /// Ask to trade places with other help-intent entities
    #[arg(long)]
    pub help_intent: bool,

    /// Frames an unacknowledged action may wait before the queue is dropped
    #[arg(long, default_value = "120")]
    pub ack_timeout_frames: u64,

    /// Frames between two movement steps
    #[arg(long, default_value = "10")]
    pub step_frames: u64,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub fake_ping_ms: u64,
    pub script: Option<String>,
    pub help_intent: bool,
    pub ack_timeout_frames: u64,
    pub step_frames: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:8080".to_string(),
            fake_ping_ms: 0,
            script: None,
            help_intent: false,
            ack_timeout_frames: 120,
            step_frames: 10,
        }
    }
}

impl From<ClientArgs> for ClientConfig {
    fn from(args: ClientArgs) -> Self {
        Self {
            server: args.server,
            fake_ping_ms: args.fake_ping,
            script: args.script,
            help_intent: args.help_intent,
            ack_timeout_frames: args.ack_timeout_frames.max(1),
            step_frames: args.step_frames.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let config = ClientConfig::from(ClientArgs::parse_from(["client"]));
        let default = ClientConfig::default();

        assert_eq!(config.server, default.server);
        assert_eq!(config.fake_ping_ms, default.fake_ping_ms);
        assert_eq!(config.ack_timeout_frames, default.ack_timeout_frames);
        assert_eq!(config.step_frames, default.step_frames);
        assert!(!config.help_intent);
        assert!(config.script.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let args = ClientArgs::parse_from([
            "client",
            "-s",
            "10.0.0.2:9000",
            "-l",
            "80",
            "--script",
            "R R UL",
            "--help-intent",
            "--ack-timeout-frames",
            "0",
        ]);
        let config = ClientConfig::from(args);

        assert_eq!(config.server, "10.0.0.2:9000");
        assert_eq!(config.fake_ping_ms, 80);
        assert_eq!(config.script.as_deref(), Some("R R UL"));
        assert!(config.help_intent);
        assert_eq!(config.ack_timeout_frames, 1);
    }
}
