use std::io;
use std::path::PathBuf;
use std::process;

use chatlens::commands::analyze::{self, ContactArgs, ConversationArgs, ReplyArgs};
use chatlens::commands::config::{self, ConfigArgs};
use chatlens::commands::{CommandError, Session};
use chatlens::logging;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use owo_colors::OwoColorize;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (git ",
    env!("CHATLENS_GIT_SHA"),
    ", built ",
    env!("CHATLENS_BUILD_TS"),
    ")"
);

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  chatlens conversation --input chat.json\n  cat chat.json | chatlens contact --note \"tech colleague\" --category work\n  chatlens reply --instruction \"I'm in a meeting, be polite\" --message \"are you free?\" --input chat.json\n  chatlens config check\n  chatlens completion bash > ~/.local/share/bash-completion/completions/chatlens";

#[derive(Debug, Parser)]
#[command(
    name = "chatlens",
    about = "Analyze chat histories with hosted LLMs",
    version = VERSION,
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    /// Config file (defaults to $CHATLENS_CONFIG or ~/.config/chatlens/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Suppress all logging; fatal errors are still printed
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Summarize a conversation: topics, keywords, next actions")]
    Conversation(ConversationArgs),
    #[command(about = "Build a contact profile from a conversation")]
    Contact(ContactArgs),
    #[command(about = "Draft one auto-reply following an instruction")]
    Reply(ReplyArgs),
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
        }
    }
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(Shell::from(shell), &mut cmd, bin_name, &mut io::stdout());
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Conversation(args) => {
            analyze::run_conversation(&Session::open(config_path)?, args).await
        }
        Commands::Contact(args) => analyze::run_contact(&Session::open(config_path)?, args).await,
        Commands::Reply(args) => analyze::run_reply(&Session::open(config_path)?, args).await,
        Commands::Config(args) => config::run(args, config_path),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    if let Err(err) = run(cli).await {
        eprintln!("{} {err}", "error:".red().bold());
        process::exit(1);
    }
}
