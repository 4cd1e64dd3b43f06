// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tokio::sync::mpsc;

use weft_rs::adk::agent::{Agent, AgentEvent};
use weft_rs::weft::checkpoint::{Checkpointer, ListOptions};
use weft_rs::weft::companion::build_companion_graph;
use weft_rs::weft::config::Config;
use weft_rs::weft::graph::{CompileOptions, CompiledGraph, GraphAgent, RunOutcome};
use weft_rs::weft::state::PartialState;
use weft_rs::weft::workflow::{StepRegistry, WorkflowBuilder};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database for checkpoints (overrides WEFT_DATABASE_URL)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one message to the chat companion
    Chat {
        #[arg(short, long)]
        thread: String,

        #[arg(short, long)]
        input: String,

        /// Print node updates as they happen
        #[arg(long)]
        stream: bool,

        /// Pause before these nodes
        #[arg(long, value_delimiter = ',')]
        interrupt_before: Vec<String>,
    },
    /// Run a workflow file
    Run {
        #[arg(short, long)]
        file: PathBuf,

        /// Initial state as a JSON object
        #[arg(short, long, default_value = "{}")]
        input: String,

        #[arg(short, long)]
        thread: String,
    },
    /// Continue a paused thread
    Resume {
        #[arg(short, long)]
        thread: String,

        /// Workflow file the thread runs; the chat companion if omitted
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// JSON object merged into the state before resuming
        #[arg(long)]
        patch: Option<String>,
    },
    /// List the checkpoints of a thread, newest first
    History {
        #[arg(short, long)]
        thread: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Delete every checkpoint of a thread
    Reset {
        #[arg(short, long)]
        thread: String,
    },
    /// Delete every checkpoint of every thread
    HardReset {
        #[arg(long)]
        yes: bool,
    },
    /// Print a graph as a Mermaid diagram
    Graph {
        /// Workflow file; the chat companion if omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if args.database.is_some() {
        config.database_url = args.database;
    }

    match args.command {
        Commands::Chat {
            thread,
            input,
            stream,
            interrupt_before,
        } => {
            let saver = config.checkpointer().await?;
            let options = CompileOptions::default()
                .with_checkpointer(saver)
                .interrupt_before(interrupt_before);
            let agent = GraphAgent::new("companion", build_companion_graph(options)?)
                .with_config(config.run_config(&thread)?);

            let answer = if stream {
                let (tx, mut rx) = mpsc::channel(16);
                let printer = tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        print_event(&event);
                    }
                });
                let answer = agent.run_stream(input, tx).await;
                printer.await?;
                answer?
            } else {
                agent.run(input).await?
            };
            println!("{answer}");
        }
        Commands::Run {
            file,
            input,
            thread,
        } => {
            let saver = config.checkpointer().await?;
            let workflow = WorkflowBuilder::new(StepRegistry::new())
                .build_file(&file, CompileOptions::default().with_checkpointer(saver))
                .await?;
            let input = parse_state(&input)?;

            let run = config
                .run_config(&thread)?
                .with_recursion_limit(workflow.recursion_limit);
            let outcome = workflow.graph.invoke(Some(input), &run).await?;
            print_outcome(&outcome)?;
        }
        Commands::Resume {
            thread,
            file,
            patch,
        } => {
            let saver = config.checkpointer().await?;
            let graph = load_graph(file, saver).await?;
            let patch = patch.as_deref().map(parse_state).transpose()?;
            let outcome = graph.resume(patch, &config.run_config(&thread)?).await?;
            print_outcome(&outcome)?;
        }
        Commands::History { thread, limit } => {
            let saver = config.checkpointer().await?;
            let options = limit.map(ListOptions::limit).unwrap_or_default();
            for tuple in saver.list(&thread, options).await? {
                println!(
                    "{}  step {:>3}  {:<6}  next {:?}",
                    tuple.checkpoint.id,
                    tuple.checkpoint.step,
                    format!("{:?}", tuple.metadata.source).to_lowercase(),
                    tuple.checkpoint.next
                );
            }
        }
        Commands::Reset { thread } => {
            let saver = config.checkpointer().await?;
            let removed = saver.reset_thread(&thread).await?;
            println!("Removed {removed} checkpoints from thread {thread}");
        }
        Commands::HardReset { yes } => {
            if !yes {
                bail!("hard-reset deletes every thread; pass --yes to confirm");
            }
            let saver = config.checkpointer().await?;
            let removed = saver.hard_reset().await?;
            println!("Removed {removed} checkpoints");
        }
        Commands::Graph { file } => {
            let graph = match file {
                Some(path) => {
                    WorkflowBuilder::new(StepRegistry::new())
                        .build_file(&path, CompileOptions::default())
                        .await?
                        .graph
                }
                None => build_companion_graph(CompileOptions::default())?,
            };
            print!("{}", graph.get_graph().to_mermaid());
        }
    }

    Ok(())
}

async fn load_graph(
    file: Option<PathBuf>,
    saver: Arc<dyn Checkpointer>,
) -> anyhow::Result<CompiledGraph> {
    let options = CompileOptions::default().with_checkpointer(saver);
    Ok(match file {
        Some(path) => {
            WorkflowBuilder::new(StepRegistry::new())
                .build_file(&path, options)
                .await?
                .graph
        }
        None => build_companion_graph(options)?,
    })
}

fn parse_state(raw: &str) -> anyhow::Result<PartialState> {
    let value: serde_json::Value = serde_json::from_str(raw).context("state must be JSON")?;
    PartialState::from_json(value).context("state must be a JSON object")
}

fn print_outcome(outcome: &RunOutcome) -> anyhow::Result<()> {
    if let RunOutcome::Paused(interrupted) = outcome {
        println!("Paused before {:?}", interrupted.next);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome.state().to_json())?
    );
    Ok(())
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::Update { node, update } => println!("[{node}] {update}"),
        AgentEvent::Interrupted { next } => println!("[paused] before {next:?}"),
        AgentEvent::Error(message) => eprintln!("[error] {message}"),
        AgentEvent::Answer(_) => {}
    }
}
