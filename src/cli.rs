use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;

use crate::output::OutputFormat;
use crate::pipeline::RunConfig;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum VerbosityLevel {
    /// Only the summary and exit code
    Quiet,
    /// Report invalid resources and errors
    #[default]
    Normal,
    /// Report every resource, with violation detail
    Verbose,
}

/// Validate Kubernetes manifests against their published JSON schemas
#[derive(Parser, Debug, Clone)]
#[command(name = "validate-manifests")]
#[command(about = "Validate Kubernetes manifests against their schemas, concurrently")]
#[command(version)]
pub struct Cli {
    /// Manifest files or directories to validate; "-" reads from stdin
    #[arg(required = true, help = "Files or directories to validate ('-' for stdin)")]
    pub files: Vec<PathBuf>,

    /// Number of concurrent validation workers
    #[arg(short = 'n', long = "workers", help = "Number of concurrent workers")]
    pub workers: Option<usize>,

    /// Schema location template, repeatable; earlier locations win.
    /// Supports {kind}, {version}, {k8sversion} style placeholders.
    #[arg(long = "schema-location", action = clap::ArgAction::Append)]
    pub schema_locations: Vec<String>,

    /// Kubernetes version the schemas are resolved for
    #[arg(short = 'k', long = "kubernetes-version", default_value = "master")]
    pub kubernetes_version: String,

    /// Kinds to skip, comma-separated (e.g. 'Secret,CustomResourceDefinition')
    #[arg(long = "skip", default_value = "")]
    pub skip: String,

    /// Treat resources whose schema cannot be found as skipped, not errors
    #[arg(long = "ignore-missing-schemas")]
    pub ignore_missing_schemas: bool,

    /// Disable the in-memory schema cache
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// Resolve strict schemas, which reject unknown fields
    #[arg(long = "strict")]
    pub strict: bool,

    /// Output format
    #[arg(short = 'o', long = "output", default_value = "text")]
    pub output: String,

    /// Print a summary block after all results
    #[arg(long = "summary")]
    pub summary: bool,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout", default_value = "30")]
    pub timeout: u64,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Enable quiet mode (summary and exit code only)
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(workers) = self.workers {
            if workers == 0 {
                return Err("Number of workers must be greater than 0".to_string());
            }
        }
        if self.use_stdin() && self.files.len() > 1 {
            return Err("'-' cannot be combined with other inputs".to_string());
        }
        self.output_format().map(|_| ())
    }

    pub fn use_stdin(&self) -> bool {
        self.files.iter().any(|f| f.as_os_str() == "-")
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }

    pub fn skip_kinds(&self) -> HashSet<String> {
        self.skip
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn output_format(&self) -> Result<OutputFormat, String> {
        match self.output.as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            files: self
                .files
                .iter()
                .filter(|f| f.as_os_str() != "-")
                .cloned()
                .collect(),
            use_stdin: self.use_stdin(),
            workers: self.worker_count(),
            k8s_version: self.kubernetes_version.clone(),
            skip_kinds: self.skip_kinds(),
            ignore_missing_schemas: self.ignore_missing_schemas,
            cache_enabled: !self.no_cache,
        }
    }
}
