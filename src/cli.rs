use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "A movie assistant for your terminal", long_about = None)]
pub struct Args {
    /// Ask one question and exit. Without it, cinechat starts an interactive session
    pub query: Option<String>,

    /// AI provider to use [possible values: anthropic, openai, openrouter, fireworks]
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model to use (provider-specific)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Log turns, completions and function calls to stderr
    #[arg(short, long)]
    pub verbose: bool,
}
