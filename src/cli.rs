use clap::{Parser, ValueEnum};

/// Country enrichment service for IP lookups, backed by GeoNames.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Log output format. Defaults to pretty in debug builds and JSON in release builds.
    #[arg(long, value_enum, default_value_t = TracingFormat::default())]
    pub tracing: TracingFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    Pretty,
    Json,
}

impl Default for TracingFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            TracingFormat::Pretty
        } else {
            TracingFormat::Json
        }
    }
}
