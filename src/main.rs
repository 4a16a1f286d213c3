use std::process;
use std::time::Duration;

use anyhow::Context;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use validate_manifests::cli::Cli;
use validate_manifests::output::Output;
use validate_manifests::registry::{self, Registry};
use validate_manifests::{pipeline, DEFAULT_SCHEMA_LOCATION};

fn build_registries(cli: &Cli) -> anyhow::Result<Vec<Box<dyn Registry>>> {
    let timeout = Duration::from_secs(cli.timeout);
    let locations: Vec<&str> = if cli.schema_locations.is_empty() {
        vec![DEFAULT_SCHEMA_LOCATION]
    } else {
        cli.schema_locations.iter().map(String::as_str).collect()
    };

    locations
        .iter()
        .map(|location| {
            registry::new_registry(location, cli.strict, timeout)
                .with_context(|| format!("invalid schema location: {}", location))
        })
        .collect()
}

async fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse_args();
    if let Err(message) = cli.validate() {
        anyhow::bail!(message);
    }

    let registries = build_registries(&cli)?;
    debug!(
        registries = registries.len(),
        k8s_version = %cli.kubernetes_version,
        "configured schema sources"
    );

    let format = cli.output_format().map_err(anyhow::Error::msg)?;
    let output = Output::new(format, cli.verbosity(), cli.summary);

    pipeline::run(cli.run_config(), registries, output)
        .await
        .context("validation pipeline failed")
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
