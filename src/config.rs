//! Configuration types for upload-spooler
//!
//! This module defines:
//! - Spooler definition parsing (`<driver>:<description>,<out>,<in>`)
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::DefinitionError;
use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// Default queue capacity used by the CLI
const DEFAULT_MAX_PENDING: usize = 1000;

/// Storage driver selected by a spooler definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverType {
    /// Local filesystem storage
    Local,
    /// Remote key-value store reached over HTTP
    RemoteKv,
}

impl DriverType {
    /// Driver tokens accepted in a definition string
    const NAMES: &'static [(&'static str, DriverType)] = &[
        ("local", DriverType::Local),
        ("riak", DriverType::RemoteKv),
        ("kv", DriverType::RemoteKv),
    ];

    /// Canonical name for display
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverType::Local => "local",
            DriverType::RemoteKv => "kv",
        }
    }
}

impl FromStr for DriverType {
    type Err = DefinitionError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(token, _)| *token == name)
            .map(|(_, driver)| *driver)
            .ok_or_else(|| DefinitionError::UnknownDriver {
                name: name.to_string(),
            })
    }
}

impl fmt::Display for DriverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed and validated spooler definition
///
/// A `SpoolerDefinition` can only be obtained through [`SpoolerDefinition::parse`],
/// so holding one means the definition string was well formed. This is what
/// keeps an invalid definition from ever reaching [`crate::Spooler::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolerDefinition {
    /// Storage driver
    pub driver_type: DriverType,

    /// Driver configuration (base path, store URL, ...)
    pub spooler_description: String,

    /// Endpoint that receives the paths of pushed content
    pub paths_out_pipe: String,

    /// Endpoint that delivers content digests back
    pub digests_in_pipe: String,

    /// Capacity of the bounded job queue
    pub max_pending_jobs: usize,

    /// Number of worker threads
    pub worker_count: usize,
}

impl SpoolerDefinition {
    /// Parse a definition string of the form
    /// `<driver>:<description>,<endpoint-out>,<endpoint-in>`
    ///
    /// Every rejection is logged before the error is returned.
    pub fn parse(definition: &str, max_pending_jobs: usize) -> Result<Self, DefinitionError> {
        Self::parse_inner(definition, max_pending_jobs).inspect_err(|e| {
            warn!(definition = definition, error = %e, "Rejected spooler definition");
        })
    }

    fn parse_inner(definition: &str, max_pending_jobs: usize) -> Result<Self, DefinitionError> {
        let components: Vec<&str> = definition.split(',').collect();
        if components.len() != 3 {
            return Err(DefinitionError::FieldCount {
                definition: definition.to_string(),
                found: components.len(),
            });
        }

        let (driver, description) =
            components[0]
                .split_once(':')
                .ok_or_else(|| DefinitionError::MalformedDriver {
                    field: components[0].to_string(),
                })?;

        let driver_type = driver.parse::<DriverType>()?;

        if max_pending_jobs == 0 {
            return Err(DefinitionError::InvalidCapacity {
                value: max_pending_jobs,
            });
        }

        Ok(Self {
            driver_type,
            spooler_description: description.to_string(),
            paths_out_pipe: components[1].to_string(),
            digests_in_pipe: components[2].to_string(),
            max_pending_jobs,
            worker_count: default_workers(),
        })
    }

    /// Override the number of worker threads
    pub fn with_workers(mut self, count: usize) -> Result<Self, DefinitionError> {
        if count == 0 || count > MAX_WORKERS {
            return Err(DefinitionError::InvalidWorkerCount {
                count,
                max: MAX_WORKERS,
            });
        }
        self.worker_count = count;
        Ok(self)
    }

    /// Validity flag of the definition
    ///
    /// Type-state marker only: a `SpoolerDefinition` exists solely as the
    /// `Ok` output of [`SpoolerDefinition::parse`], so this is always `true`.
    /// Rejected definitions surface as the `Err` of `parse`.
    pub fn is_valid(&self) -> bool {
        true
    }
}

fn default_workers() -> usize {
    num_cpus::get().clamp(1, MAX_WORKERS)
}

/// Concurrent content spooler
#[derive(Parser, Debug, Clone)]
#[command(
    name = "upload-spool",
    version,
    about = "Push files to a storage backend through a concurrent spooler",
    long_about = "Queues files for upload and lets a fixed pool of worker threads push them\n\
                  to the configured backend.\n\n\
                  In copy mode files are stored verbatim under the given remote path.\n\
                  In process mode (--process) files are compressed, hashed and stored\n\
                  under their content hash.",
    after_help = "EXAMPLES:\n    \
        upload-spool local:/srv/store,/tmp/out,/tmp/in a.txt b.txt\n    \
        find data -type f | upload-spool local:/srv/store,/tmp/out,/tmp/in --process --remote-dir data\n    \
        upload-spool kv:http://kv.local:8098/buckets/objects/keys,out,in --process -w 16"
)]
pub struct CliArgs {
    /// Spooler definition (<driver>:<description>,<endpoint-out>,<endpoint-in>)
    #[arg(value_name = "DEFINITION")]
    pub definition: String,

    /// Files to upload (read from stdin, one per line, when omitted)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Compress and hash files instead of copying them
    #[arg(long)]
    pub process: bool,

    /// Remote directory for processed files, or prefix for copied files
    #[arg(long, default_value = "data", value_name = "DIR")]
    pub remote_dir: String,

    /// Suffix appended to processed objects
    #[arg(long, default_value = "", value_name = "SUFFIX")]
    pub suffix: String,

    /// Maximum number of queued jobs
    #[arg(long, default_value_t = DEFAULT_MAX_PENDING, value_name = "NUM")]
    pub max_pending: usize,

    /// Number of worker threads
    #[arg(short = 'w', long, default_value_t = default_workers(), value_name = "NUM")]
    pub workers: usize,

    /// Remove source files after a successful push
    #[arg(long = "move")]
    pub move_files: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Validated runtime configuration for the CLI
#[derive(Debug, Clone)]
pub struct SpoolConfig {
    /// Parsed spooler definition
    pub definition: SpoolerDefinition,

    /// Files given on the command line
    pub files: Vec<PathBuf>,

    /// Process (compress + hash) instead of copy
    pub process: bool,

    /// Remote directory / prefix
    pub remote_dir: String,

    /// Suffix for processed objects
    pub suffix: String,

    /// Move instead of copy
    pub move_files: bool,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl SpoolConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, DefinitionError> {
        let definition =
            SpoolerDefinition::parse(&args.definition, args.max_pending)?.with_workers(args.workers)?;

        Ok(Self {
            definition,
            files: args.files,
            process: args.process,
            remote_dir: args.remote_dir,
            suffix: args.suffix,
            move_files: args.move_files,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }

    /// Remote path for a copied file
    pub fn remote_path_for(&self, local: &std::path::Path) -> String {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix = self.remote_dir.trim_end_matches('/');
        if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        }
    }
}
