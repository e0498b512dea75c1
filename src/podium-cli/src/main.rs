//! Podium CLI - live AI debates over a local Ollama server.
//!
//! Streams a turn-based debate between two configured agents into the
//! terminal. Ctrl-C pauses the run; a paused debate can be resumed, reset,
//! or abandoned from a small menu.

use clap::{ArgAction, Parser};
use colored::Colorize;
use podium_core::{
    Config, DebateEvent, DebateSession, OllamaClient, RunOutcome, default_config,
};
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "podium",
    version,
    about = "Watch two AI agents debate a topic, streamed live from Ollama",
    long_about = "Runs a turn-based debate between two locally hosted models. \
Press Ctrl-C to pause; a paused debate can be resumed or reset."
)]
struct Cli {
    /// The topic to debate
    #[arg(value_name = "TOPIC")]
    topic: Option<String>,

    /// Model names for the two agents (specify twice: -m model1 -m model2)
    #[arg(short, long, action = ArgAction::Append, value_name = "MODEL")]
    model: Vec<String>,

    /// Display names for the agents (same order as models)
    #[arg(long, action = ArgAction::Append, value_name = "NAME")]
    name: Vec<String>,

    /// Personas for the agents (same order as models)
    #[arg(long, action = ArgAction::Append, value_name = "PROMPT")]
    persona: Vec<String>,

    /// Stage rules applied to every turn
    #[arg(long, value_name = "RULES")]
    rules: Option<String>,

    /// Sampling temperature for both agents
    #[arg(long, value_name = "TEMP")]
    temperature: Option<f32>,

    /// Sampling top-k for both agents
    #[arg(long, value_name = "K")]
    top_k: Option<u32>,

    /// History visible to each agent, in characters
    #[arg(long, value_name = "CHARS")]
    memory_chars: Option<usize>,

    /// Stop the debate after this many turns
    #[arg(long, value_name = "N")]
    max_turns: Option<u32>,

    /// Ollama server URL (defaults to $OLLAMA_HOST, then http://localhost:11434)
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Load agents and debate settings from a TOML file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// List the models installed on the server and exit
    #[arg(long)]
    list_models: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };
    apply_overrides(&mut config, &cli)?;

    let client = OllamaClient::new(&config.server.base_url)?;

    if cli.list_models {
        let models = client.list_models().await?;
        if models.is_empty() {
            println!("No models installed.");
        } else {
            for model in models {
                println!("{model}");
            }
        }
        return Ok(());
    }

    if let Err(err) = client.check_connection().await {
        eprintln!(
            "{} cannot reach Ollama at {}: {}",
            "Error:".red().bold(),
            client.base_url(),
            err
        );
        eprintln!("Start the server with `ollama serve` or pass --url.");
        std::process::exit(1);
    }

    fill_missing_models(&mut config, &client).await?;
    config.validate()?;

    print_banner(&config);

    let debate = config.debate.clone();
    let agents = config.agent_pair()?;
    let mut session = DebateSession::new(debate, agents, Arc::new(client))?
        .with_callback(create_console_callback());

    // Ctrl-C pauses the run; the session observes the flag at the next
    // fragment or turn boundary.
    let controls = session.controls();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{}", "Pausing at the next safe point...".yellow());
            controls.stop();
        }
    });

    loop {
        let outcome = session.run().await;
        println!();
        match outcome {
            RunOutcome::Stopped => println!("{}", "Debate paused.".yellow()),
            RunOutcome::TurnLimit => println!("{}", "Turn limit reached.".yellow()),
            RunOutcome::Faulted => println!("{}", "Debate halted on an error.".red()),
        }

        match read_choice()?.as_str() {
            "r" | "resume" => continue,
            "n" | "new" => {
                session.reset();
                println!("{}", "Transcript cleared.".green());
            }
            _ => break,
        }
    }

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Debate concluded.".bright_green().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.model.len() > 2 || cli.name.len() > 2 || cli.persona.len() > 2 {
        return Err("at most two agents are supported; pass each agent flag at most twice".into());
    }
    if let Some(url) = &cli.url {
        config.server.base_url = url.clone();
    } else if cli.config.is_none() {
        if let Ok(url) = env::var("OLLAMA_HOST") {
            if !url.trim().is_empty() {
                config.server.base_url = url;
            }
        }
    }
    if let Some(topic) = &cli.topic {
        config.debate.topic = topic.clone();
    }
    if let Some(rules) = &cli.rules {
        config.debate.stage_rules = rules.clone();
    }
    if let Some(max_turns) = cli.max_turns {
        config.debate.max_turns = max_turns;
    }
    for (i, agent) in config.agents.iter_mut().enumerate() {
        if let Some(model) = cli.model.get(i) {
            agent.model = model.clone();
        }
        if let Some(name) = cli.name.get(i) {
            agent.name = name.clone();
        }
        if let Some(persona) = cli.persona.get(i) {
            agent.system_prompt = persona.clone();
        }
        if let Some(temperature) = cli.temperature {
            agent.temperature = temperature;
        }
        if let Some(top_k) = cli.top_k {
            agent.top_k = top_k;
        }
        if let Some(memory_chars) = cli.memory_chars {
            agent.memory_chars = memory_chars;
        }
    }
    Ok(())
}

/// Agents configured without a model get the first one installed on the
/// server, the same choice a fresh UI dropdown would make.
async fn fill_missing_models(
    config: &mut Config,
    client: &OllamaClient,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.agents.iter().all(|a| !a.model.trim().is_empty()) {
        return Ok(());
    }
    let models = client.list_models().await?;
    let Some(first) = models.first() else {
        return Err("no models installed on the server; run `ollama pull <model>` first".into());
    };
    for agent in &mut config.agents {
        if agent.model.trim().is_empty() {
            agent.model = first.clone();
        }
    }
    Ok(())
}

fn speaker_color(name: &str, speaker: usize) -> colored::ColoredString {
    if speaker == 0 {
        name.bright_cyan()
    } else {
        name.bright_magenta()
    }
}

fn print_banner(config: &Config) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - streaming AI debate", "Podium".bold())
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), config.debate.topic.bright_white());
    println!("{} {}", "Rules:".bold(), config.debate.stage_rules);
    println!();
    println!("{}", "Agents:".bold());
    for (i, agent) in config.agents.iter().enumerate() {
        println!(
            "  {}. {} - using {}",
            i + 1,
            speaker_color(&agent.name, i),
            agent.model.dimmed()
        );
    }
    println!();
    println!("{}", "Press Ctrl-C to pause the debate.".dimmed());
    println!("{}", "─".repeat(70).dimmed());
}

/// Create a callback that renders debate events to the terminal.
fn create_console_callback() -> podium_core::DebateCallback {
    Box::new(move |event| match event {
        DebateEvent::TurnStart {
            speaker,
            speaker_name,
        } => {
            println!();
            print!("{}{} ", speaker_color(&speaker_name, speaker).bold(), ":");
            let _ = io::stdout().flush();
        }
        DebateEvent::TurnToken { text, .. } => {
            print!("{text}");
            let _ = io::stdout().flush();
        }
        DebateEvent::TurnComplete { .. } => {
            println!();
        }
        DebateEvent::TurnAborted { .. } => {
            println!("{}", " [interrupted]".yellow());
        }
        DebateEvent::RunError { message } => {
            println!();
            println!("{} {}", "Error:".red().bold(), message);
        }
        DebateEvent::RunEnded { .. } => {}
    })
}

fn read_choice() -> io::Result<String> {
    print!("{} ", "[r]esume  [n]ew debate  [q]uit:".bold());
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_lowercase())
}
