use clap::{
    Parser,
    Subcommand,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter PSMs and write alignment-ready tables.
    Run(RunArgs),
    /// Write a template configuration file.
    WriteTemplate(WriteTemplateArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PolicyArg {
    /// Keep flagged rows and mark them in the `exclude` column.
    Exclude,
    /// Drop flagged rows from the output.
    Remove,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Input files (will over-write the config file)
    #[arg(short, long, num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// Path to the output directory (will over-write the config file)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// What to do with flagged rows (will over-write the config file)
    #[arg(short, long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Skip filters with invalid parameters instead of aborting
    #[arg(long)]
    pub lenient: bool,
}

#[derive(Parser, Debug)]
pub struct WriteTemplateArgs {
    /// The directory to write the template to.
    #[arg(short, long)]
    pub output_path: PathBuf,
}
