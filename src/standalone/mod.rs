use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::{EngineConfig, Layout, DEFAULT_PARTITIONS, DEFAULT_REDUCE_PARTITIONS};
use crate::record::{MalformedPolicy, DEFAULT_SITE_PATTERN};
use crate::table::DEFAULT_TABLE;

pub mod engine;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Base directory holding `raw/`, `dated/` and the outputs
    #[arg(short, long, default_value = ".", global = true)]
    pub dir: PathBuf,

    /// Worker threads (defaults to one per core)
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Output files written by `tag`
    #[arg(long, default_value_t = DEFAULT_PARTITIONS, global = true)]
    pub partitions: u32,

    /// Buckets used when grouping by key
    #[arg(long, default_value_t = DEFAULT_REDUCE_PARTITIONS, global = true)]
    pub reduce_partitions: u32,

    /// What to do with lines that do not parse
    #[arg(long, value_enum, default_value_t = MalformedPolicy::Drop, global = true)]
    pub malformed: MalformedPolicy,

    #[clap(subcommand)]
    pub command: Commands,
}

impl Args {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            threads: self.threads,
            partitions: self.partitions,
            reduce_partitions: self.reduce_partitions,
            malformed: self.malformed,
        }
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.dir)
    }
}

/// Row filter flags shared by `find` and `hits`.
#[derive(ClapArgs, Debug, Clone)]
pub struct FilterArgs {
    /// Pattern searched for in the site column
    #[arg(short, long, default_value = DEFAULT_SITE_PATTERN)]
    pub regex: String,

    /// Only keep rows in this language
    #[arg(short, long)]
    pub lang: Option<String>,
}

impl FilterArgs {
    /// The argv the `find` and `hits` workloads parse.
    pub fn to_argv(&self, malformed: MalformedPolicy) -> Vec<String> {
        let mut argv = vec![
            "--regex".to_string(),
            self.regex.clone(),
            "--malformed".to_string(),
            malformed.as_str().to_string(),
        ];
        if let Some(lang) = &self.lang {
            argv.push("--lang".to_string());
            argv.push(lang.clone());
        }
        argv
    }
}

/// Flags for the commands that build the tabular view.
#[derive(ClapArgs, Debug, Clone)]
pub struct TableArgs {
    /// Glob for the tagged files (defaults to `<dir>/dated/part-*`)
    #[arg(short, long)]
    pub input: Option<String>,

    /// Name the table is registered under
    #[arg(short, long, default_value = DEFAULT_TABLE)]
    pub table: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prefix every raw line with the date and hour from its filename
    Tag {
        /// Glob for the raw dumps (defaults to `<dir>/raw/*`)
        #[arg(short, long)]
        input: Option<String>,

        /// Output directory (defaults to `<dir>/dated`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Count the lines of a dataset
    Count {
        /// Glob for the files (defaults to `<dir>/dated/part-*`)
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Print the first lines of a dataset
    Take {
        #[arg(short, long)]
        input: Option<String>,

        #[arg(short, default_value_t = 10)]
        n: usize,
    },
    /// Print (or count) the lines matching the row filter
    Find {
        #[arg(short, long)]
        input: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Only print how many lines match
        #[arg(long)]
        count: bool,

        #[arg(short, default_value_t = 100)]
        n: usize,
    },
    /// Sum hits per date, hour and language for matching sites
    Hits {
        #[arg(short, long)]
        input: Option<String>,

        /// Output directory (defaults to `<dir>/obama-counts`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Median page size per language
    Median {
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Show the schema and a few relational operations on the table
    Frame {
        #[command(flatten)]
        table: TableArgs,

        /// Language kept by the filter example
        #[arg(short, long, default_value = "en")]
        lang: String,
    },
    /// Run a SQL query against the table
    Sql {
        #[command(flatten)]
        table: TableArgs,

        /// The query, e.g. "SELECT lang, count(*) AS n FROM wikiHits GROUP BY lang"
        query: String,
    },
    /// Write the table to a Parquet file
    Export {
        #[command(flatten)]
        table: TableArgs,

        #[arg(short, long)]
        output: PathBuf,
    },
}
