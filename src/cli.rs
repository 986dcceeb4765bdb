use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "unifix")]
#[command(about = "Proposes unit-consistency patches for C/C++ source")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Propose fixes for the unit errors reported on a token dump
    Fix {
        /// Token dump of the translation unit (XML)
        dump: String,

        /// Unit checker report (JSON)
        report: String,

        /// Write the change list to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Keep at most this many candidates per change
        #[arg(long)]
        max_fixes: Option<usize>,

        /// Depth bound for the unit search
        #[arg(long)]
        search_depth: Option<usize>,

        /// Pick the side/candidate to keep interactively
        #[arg(short, long)]
        interactive: bool,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Print an intermediate pipeline stage
    Inspect {
        /// Token dump of the translation unit (XML)
        dump: String,

        /// Which stage to print
        #[arg(long, value_enum, default_value = "cfg")]
        stage: Stage,

        /// Restrict to one function by name
        #[arg(long)]
        function: Option<String>,

        /// Render as indented text instead of JSON (ast stage only)
        #[arg(long)]
        text: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    /// Statement AST per function
    Ast,
    /// Control-flow graph per function
    Cfg,
    /// Data-dependency graph per function
    Deps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Console,
    Json,
}
