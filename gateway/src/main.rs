use clap::Parser;
use gateway::config::{Config, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "switchboard",
    about = "Authenticated proxy gateway for the CRM telephony platform"
)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("could not load config: {error}");
            process::exit(1);
        }
    };
    if let Err(error) = config.validate() {
        eprintln!("invalid config: {error}");
        process::exit(1);
    }

    if let Some(metrics_config) = &config.metrics {
        init_metrics(metrics_config);
    }

    if let Err(error) = gateway::run(config).await {
        tracing::error!(error = %error, "gateway exited");
        process::exit(1);
    }
}

fn init_metrics(config: &MetricsConfig) {
    let recorder = match StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some("switchboard"))
    {
        Ok(recorder) => recorder,
        Err(error) => {
            eprintln!("could not build statsd recorder: {error}");
            return;
        }
    };

    if let Err(error) = metrics::set_global_recorder(recorder) {
        eprintln!("could not install statsd recorder: {error}");
    }
}
