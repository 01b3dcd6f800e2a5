//! CLI command definitions and argument parsing

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

use crate::models::Department;
use crate::rag::RetrievalMethod;

#[derive(Parser)]
#[command(name = "nexusrag")]
#[command(about = "Nexus internal knowledge assistant: department-scoped answers with web-search fallback")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: info level)
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a single question
    Ask {
        /// The question to answer
        question: String,
        /// Department of the person asking (key like `hr` or its label)
        #[arg(short, long, default_value = "general")]
        department: Department,
        /// Override the configured retrieval method
        #[arg(short, long, value_enum)]
        method: Option<MethodArg>,
        /// Show retrieved documents and the final pipeline state
        #[arg(long)]
        details: bool,
    },
    /// Interactive chat keeping recent conversation as context
    Chat {
        /// Department of the person chatting
        #[arg(short, long, default_value = "general")]
        department: Department,
        /// Override the configured retrieval method
        #[arg(short, long, value_enum)]
        method: Option<MethodArg>,
    },
    /// Rebuild the document embedding cache and report counts
    Index {
        /// Rebuild even if the cache looks fresh
        #[arg(short, long)]
        force: bool,
    },
    /// List documents visible to a department
    Docs {
        #[arg(short, long, default_value = "general")]
        department: Department,
    },
    /// Show current configuration
    Config,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MethodArg {
    Lexical,
    Vector,
    Auto,
}

impl From<MethodArg> for RetrievalMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Lexical => Self::Lexical,
            MethodArg::Vector => Self::Vector,
            MethodArg::Auto => Self::Auto,
        }
    }
}
