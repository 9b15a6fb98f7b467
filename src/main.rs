//! SmartGPT CLI
//!
//! Commands:
//!   ask    - Run one question through the full prompting pipeline
//!   chat   - Interactive loop keeping the conversation between questions
//!   config - Show or initialize the configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use futures::StreamExt;
use smartgpt::{
    AuditSink, Config, FanoutAudit, MemoryAudit, OpenAIClient, Pipeline, Stage, StageOutput,
    TracingAudit, Transcript,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "smartgpt")]
#[command(about = "Chain-of-thought, self-reflection and resolution over a chat model")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.smartgpt/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question
    Ask {
        /// Question, query or task
        input: String,

        /// Hint sent as the final message
        #[arg(long)]
        hint: String,

        /// Write a transcript of the run
        #[arg(short, long)]
        save: bool,
    },

    /// Interactive session; `/clear` resets the conversation, `/exit` quits
    Chat {
        /// Write a transcript of every run
        #[arg(short, long)]
        save: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let config = match path {
        Some(p) => Config::load_from(&expand_path(p))?,
        None => Config::load()?.unwrap_or_default(),
    };
    Ok(config.with_env())
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Pipeline wired to the OpenAI endpoint, with its trace captured in `memory`.
fn build_pipeline(config: &Config, memory: Arc<MemoryAudit>) -> Result<Pipeline> {
    config.validate()?;
    let timeout = config.request_timeout_secs.map(Duration::from_secs);
    let client = OpenAIClient::with_base_url(
        config.api_key()?.to_string(),
        &config.api_base,
        timeout,
    );
    let sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(TracingAudit), memory];
    let audit = FanoutAudit::new(sinks);

    Pipeline::from_config(config, Arc::new(client), Arc::new(audit))
        .context("Failed to start pipeline")
}

fn print_output(output: &StageOutput) {
    let label = format!("{}:", output.stage);
    let label = match output.stage {
        Stage::ChainOfThoughtPrompt => label.dimmed(),
        Stage::ChainOfThought(_) => label.cyan().bold(),
        Stage::SelfReflection => label.yellow().bold(),
        Stage::FinalSelection => label.green().bold(),
        Stage::Resolution => label.magenta().bold(),
    };
    let text = if output.degraded {
        output.text.red()
    } else {
        output.text.normal()
    };
    println!("{} {}\n", label, text);
}

/// Stream one run to stdout, optionally saving its transcript.
async fn run_once(
    pipeline: &mut Pipeline,
    memory: &MemoryAudit,
    input: &str,
    hint: &str,
    save_dir: Option<&PathBuf>,
) -> Result<()> {
    println!("{} {}\n", "You:".bold(), input);

    memory.clear();
    let mut transcript = Transcript::new(input, hint);
    let mut outputs = Box::pin(pipeline.process(input, hint).into_stream());
    while let Some(item) = outputs.next().await {
        let output = item?;
        print_output(&output);
        transcript.outputs.push(output);
    }

    if let Some(dir) = save_dir {
        transcript.log = memory.render();
        let path = transcript.save(dir)?;
        println!("{} {}", "Saved".green(), path.display());
    }
    Ok(())
}

fn prompt_line(label: &str) -> Result<Option<String>> {
    print!("{} ", label.green().bold());
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.log_level);

    match cli.command {
        Commands::Ask { input, hint, save } => {
            let memory = Arc::new(MemoryAudit::new());
            let mut pipeline = build_pipeline(&config, memory.clone())?;
            let runs_dir = if save { Some(config.runs_dir()?) } else { None };
            run_once(&mut pipeline, &memory, &input, &hint, runs_dir.as_ref()).await?;
        }

        Commands::Chat { save } => {
            let memory = Arc::new(MemoryAudit::new());
            let mut pipeline = build_pipeline(&config, memory.clone())?;
            let runs_dir = if save { Some(config.runs_dir()?) } else { None };

            println!(
                "{} {}  {}\n",
                "SmartGPT".green().bold(),
                config.model.cyan(),
                "(/clear to reset, /exit to quit)".dimmed()
            );

            loop {
                let Some(input) = prompt_line("question>")? else { break };
                match input.as_str() {
                    "" => continue,
                    "/exit" | "/quit" => break,
                    "/clear" => {
                        pipeline.reset(config.system_prompt.clone());
                        println!("{}\n", "Conversation cleared.".dimmed());
                        continue;
                    }
                    _ => {}
                }

                let Some(hint) = prompt_line("hint>")? else { break };
                run_once(&mut pipeline, &memory, &input, &hint, runs_dir.as_ref()).await?;
            }
        }

        Commands::Config { init } => {
            if init {
                let path = match cli.config.as_deref() {
                    Some(p) => expand_path(p),
                    None => Config::path()?,
                };
                if path.exists() {
                    println!("Config already exists at {}", path.display());
                } else {
                    Config::default().save_to(&path)?;
                    println!("{} {}", "Wrote".green(), path.display());
                }
            } else {
                let shown = toml::to_string_pretty(&config.redacted())
                    .context("Failed to serialize config")?;
                println!("{}", shown);
                if let Err(e) = config.validate() {
                    println!("{} {}", "Invalid:".red().bold(), e);
                }
            }
        }
    }

    Ok(())
}
