//! CLI argument parsing using clap derive

use std::path::PathBuf;

use ckanny_api::{API_KEY_ENV, REMOTE_ENV, USER_AGENT_ENV};
use clap::{Args, Parser, Subcommand};

/// ckanny - Miscellaneous CKAN utility commands
#[derive(Parser, Debug)]
#[command(name = "ckanny")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The remote ckan url
    #[arg(short, long, global = true, env = REMOTE_ENV)]
    pub remote: Option<String>,

    /// The api key
    #[arg(short = 'k', long, global = true, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    /// The user agent
    #[arg(short = 'u', long = "ua", global = true, env = USER_AGENT_ENV)]
    pub user_agent: Option<String>,

    /// Settings file (default: $XDG_CONFIG_HOME/ckanny/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Datastore commands
    Ds {
        #[command(subcommand)]
        action: DsAction,
    },

    /// Filestore commands
    Fs {
        #[command(subcommand)]
        action: FsAction,
    },

    /// Show the version
    Ver,
}

/// Datastore subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DsAction {
    /// Update a datastore table from its filestore resource, if it changed
    ///
    /// The content hash of the file is compared with the one recorded in the
    /// hash table; the datastore is only rewritten when they differ.
    ///
    /// Examples:
    ///   ckanny ds update 5b1d2a...            # Update when the file changed
    ///   ckanny ds update 5b1d2a... --force    # Update regardless
    ///   ckanny ds update 5b1d2a... -p id      # Upsert rows by `id`
    Update {
        /// The resource id
        resource_id: String,

        #[command(flatten)]
        load: LoadArgs,

        #[command(flatten)]
        ledger: LedgerArgs,

        /// Number of bytes to read/write at a time
        #[arg(long)]
        chunksize_bytes: Option<usize>,
    },

    /// Upload a local file to a datastore table
    Upload {
        /// The file to upload
        source: PathBuf,

        /// The resource id (default: the file name up to the first `.`)
        #[arg(long)]
        resource_id: Option<String>,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Delete a datastore table
    Delete {
        /// The resource id
        resource_id: String,

        /// Only delete rows matching these filters, e.g. '{"name": "fred"}'
        #[arg(long)]
        filters: Option<String>,

        /// Delete even when the table is read only
        #[arg(short, long)]
        force: bool,
    },

    /// Read or write the hash table
    Hash {
        #[command(subcommand)]
        action: HashAction,
    },
}

/// Hash table subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HashAction {
    /// Print the recorded hash of a resource
    Get {
        /// The resource id
        resource_id: String,

        #[command(flatten)]
        ledger: LedgerArgs,
    },

    /// Record a hash for a resource
    Set {
        /// The resource id
        resource_id: String,

        /// The hash to record
        hash: String,

        #[command(flatten)]
        ledger: LedgerArgs,
    },
}

/// How rows are read and written
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadArgs {
    /// Update the datastore even if the file is unchanged
    #[arg(short, long)]
    pub force: bool,

    /// Comma separated field names forming the unique key
    #[arg(short, long)]
    pub primary_key: Option<String>,

    /// Number of rows to write at a time
    #[arg(short = 'c', long)]
    pub chunksize_rows: Option<usize>,

    /// Underscorify and lowercase field names
    #[arg(short, long)]
    pub sanitize: bool,

    /// Type cast values based on field type detection
    #[arg(short, long)]
    pub type_cast: bool,

    /// The file encoding
    #[arg(short, long)]
    pub encoding: Option<String>,

    /// Number of rows to skip before the header row
    #[arg(long, default_value_t = 0)]
    pub first_row: usize,

    /// Number of leading columns to drop
    #[arg(long, default_value_t = 0)]
    pub first_col: usize,

    /// Comma separated field names to index
    #[arg(long)]
    pub indexes: Option<String>,

    /// Comma separated aliases for the table
    #[arg(long)]
    pub aliases: Option<String>,
}

/// Where the hash table lives
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerArgs {
    /// The hash table package name (default: hash-table)
    #[arg(short = 'H', long)]
    pub hash_table: Option<String>,

    /// Display name of the organization that owns the hash table (default: HDX)
    #[arg(short = 'G', long)]
    pub hash_group: Option<String>,
}

/// Filestore subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum FsAction {
    /// Download a filestore resource
    Fetch {
        /// The resource id
        resource_id: String,

        /// The destination file or directory
        #[arg(short, long, default_value = ".")]
        destination: PathBuf,

        /// Name the file after the resource id
        #[arg(short, long)]
        name_from_id: bool,

        /// Number of bytes to read/write at a time
        #[arg(long)]
        chunksize_bytes: Option<usize>,
    },

    /// Update the file of an existing resource or create a new one
    Upload {
        /// A file path or url
        source: String,

        /// The resource to update (default: the file name without extension)
        #[arg(long, conflicts_with = "package_id")]
        resource_id: Option<String>,

        /// Create a new resource in this package instead
        #[arg(long)]
        package_id: Option<String>,

        /// The resource name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Copy a filestore resource from one ckan instance to another
    Migrate {
        /// The resource id
        resource_id: String,

        /// The source ckan url (default: --remote)
        #[arg(long)]
        src_remote: Option<String>,

        /// The destination ckan url (default: --remote)
        #[arg(long)]
        dest_remote: Option<String>,

        /// Number of bytes to read/write at a time
        #[arg(long)]
        chunksize_bytes: Option<usize>,
    },
}
