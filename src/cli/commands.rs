use clap::{Parser, Subcommand};

/// `toolweave` - Gemini function-calling exchanges against local tools.
#[derive(Parser, Debug)]
#[command(name = "toolweave")]
#[command(author = "theonlyhennygod")]
#[command(version)]
#[command(about = "Run Gemini function-calling exchanges against local tools.", long_about = None)]
pub struct Cli {
    /// Log request and response payloads
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one exchange until the model gives a final answer
    Run {
        /// Prompt to send (default: a random scenario payload)
        #[arg(short, long)]
        prompt: Option<String>,

        /// Only pick scenario files whose name contains this string
        #[arg(short, long, conflicts_with = "prompt")]
        filter: Option<String>,

        /// Model to use (overrides config)
        #[arg(long)]
        model: Option<String>,

        /// Model turns allowed before giving up
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Execute the calls of one turn one after another
        #[arg(long)]
        sequential: bool,
    },

    /// List models visible to the configured API key
    Models {
        /// Include models that cannot generate content
        #[arg(long)]
        all: bool,
    },

    /// List the tools offered to the model
    Tools,
}
