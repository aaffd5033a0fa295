//! CLI argument parsing for tempo

use clap::Parser;
use std::path::PathBuf;
use tempo_node::SimConfig;

/// Simulated chained HotStuff cluster
#[derive(Parser, Debug, Clone)]
#[command(name = "tempo")]
#[command(about = "Simulated chained HotStuff cluster")]
#[command(version)]
pub struct Cli {
    /// Simulation config file (JSON); defaults are used when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of replicas
    #[arg(long)]
    pub peers: Option<u32>,

    /// Tolerated Byzantine replicas
    #[arg(long)]
    pub fault_bound: Option<u32>,

    /// Number of replicas simulating Byzantine behavior
    #[arg(long)]
    pub byzantine: Option<u32>,

    /// Safety rule family
    #[arg(long)]
    pub algorithm: Option<String>,

    /// Length of the run in seconds
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Override the fields given on the command line
    pub fn apply(&self, config: &mut SimConfig) {
        if let Some(peers) = self.peers {
            config.peers = peers;
        }
        if let Some(fault_bound) = self.fault_bound {
            config.fault_bound = fault_bound;
        }
        if let Some(byzantine) = self.byzantine {
            config.byzantine_count = byzantine;
        }
        if let Some(algorithm) = &self.algorithm {
            config.algorithm = algorithm.clone();
        }
        if let Some(duration) = self.duration_secs {
            config.duration_secs = duration;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["tempo"]);
        assert!(cli.config.is_none());
        assert!(cli.peers.is_none());
        assert_eq!(cli.log_level, "info");
        assert!(!cli.log_json);

        let mut config = SimConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_cli_custom_values() {
        let cli = Cli::parse_from([
            "tempo",
            "--config", "/path/to/sim.json",
            "--peers", "7",
            "--fault-bound", "2",
            "--byzantine", "2",
            "--algorithm", "default",
            "--duration-secs", "30",
            "--log-level", "debug",
            "--log-json",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/sim.json")));
        assert_eq!(cli.log_level, "debug");
        assert!(cli.log_json);

        let mut config = SimConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.peers, 7);
        assert_eq!(config.fault_bound, 2);
        assert_eq!(config.byzantine_count, 2);
        assert_eq!(config.algorithm, "default");
        assert_eq!(config.duration_secs, 30);
        assert_eq!(config.batch_size, 100);
    }
}
