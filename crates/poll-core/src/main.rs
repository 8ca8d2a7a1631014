//! genpoll
//!
//! Simulated population surveys: each selected persona agent answers the
//! questions through a language model and the answers are tallied into
//! per-option counts, percentages and bars.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use poll_core::{
    default_config_toml, AgentOutcome, PollConfig, SimulationOrchestrator, BASELINE_AGENT_ID,
};
use poll_events::{
    AgentResponse, Command, DialogueTurn, NumericRange, QuestionSet, Report, SelectionRequest,
    SurveyRequest,
};
use tally::{render_summary, ReportWriter};

/// Command line arguments for genpoll
#[derive(Parser, Debug)]
#[command(name = "genpoll")]
#[command(about = "Simulated population surveys with persona agents")]
struct Args {
    /// Configuration file (TOML); built-in defaults when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Random seed for agent selection
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Directory to write report.json, responses.jsonl and summary.txt into
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Print the full report as JSON instead of the text summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask one categorical question
    Ask {
        #[arg(long)]
        question: String,
        /// Comma-separated options, e.g. "Yes,No"
        #[arg(long, value_delimiter = ',', required = true)]
        options: Vec<String>,
        /// Agents to ask: a count like 10 or a share like 25%
        #[arg(long, default_value = "1")]
        agent_count: SelectionRequest,
        /// Named LLM configuration
        #[arg(long)]
        llm: Option<String>,
    },
    /// Ask one numerical question
    Numeric {
        #[arg(long)]
        question: String,
        /// Inclusive range as low,high
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        range: Vec<f64>,
        /// Accept fractional answers
        #[arg(long)]
        float: bool,
        #[arg(long, default_value = "1")]
        agent_count: SelectionRequest,
        #[arg(long)]
        llm: Option<String>,
    },
    /// Run a JSON request envelope
    Run {
        #[arg(long)]
        request: PathBuf,
    },
    /// Talk to one agent; type exit or quit to stop
    Chat {
        #[arg(long, default_value = BASELINE_AGENT_ID)]
        agent: String,
        #[arg(long, default_value = "Interviewer")]
        interviewer: String,
        /// Background given to the agent
        #[arg(long, default_value = "")]
        context: String,
        #[arg(long)]
        llm: Option<String>,
    },
    /// List agents in the configured population
    ListAgents,
    /// Print a default configuration file
    InitConfig,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .try_init()
        .ok();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    if let Commands::InitConfig = args.command {
        print!("{}", default_config_toml());
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => PollConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PollConfig::default(),
    };
    let orchestrator = SimulationOrchestrator::from_config(config)?;
    let mut rng = SmallRng::seed_from_u64(args.seed);

    let request = match &args.command {
        Commands::Ask {
            question,
            options,
            agent_count,
            llm,
        } => {
            let options: Vec<&str> = options.iter().map(|o| o.trim()).collect();
            let questions = QuestionSet::categorical([(question.as_str(), options)])?;
            with_llm(
                SurveyRequest::new(Command::Categorical { questions }, *agent_count),
                llm,
            )
        }
        Commands::Numeric {
            question,
            range,
            float,
            agent_count,
            llm,
        } => {
            let [low, high] = <[f64; 2]>::try_from(range.as_slice())
                .context("--range takes exactly two values")?;
            let questions = QuestionSet::numerical([(question.as_str(), NumericRange::new(low, high)?)])?;
            with_llm(
                SurveyRequest::new(
                    Command::Numerical {
                        questions,
                        float_resp: *float,
                    },
                    *agent_count,
                ),
                llm,
            )
        }
        Commands::Run { request } => {
            let json = std::fs::read_to_string(request)
                .with_context(|| format!("reading {}", request.display()))?;
            SurveyRequest::from_json(&json)
                .with_context(|| format!("parsing request {}", request.display()))?
        }
        Commands::Chat {
            agent,
            interviewer,
            context,
            llm,
        } => {
            return chat(&orchestrator, agent, interviewer, context, llm.as_deref());
        }
        Commands::ListAgents => {
            let population = orchestrator.population();
            for id in population.members() {
                println!("{}", id);
            }
            eprintln!(
                "{} agents under {}",
                population.len(),
                orchestrator.population_root().display()
            );
            return Ok(());
        }
        Commands::InitConfig => return Ok(()),
    };

    let report = orchestrator.run(&request, &mut rng)?;
    emit(&report, &args)
}

fn with_llm(request: SurveyRequest, llm: &Option<String>) -> SurveyRequest {
    match llm {
        Some(name) => request.with_llm(name.clone()),
        None => request,
    }
}

fn emit(report: &Report, args: &Args) -> anyhow::Result<()> {
    if let Some(dir) = &args.out {
        let mut writer = ReportWriter::new(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        writer.write(report)?;
    }

    if args.json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    print!("{}", render_summary(&report.summary));
    for response in &report.individual_responses {
        if let AgentResponse::Utterance(u) = response {
            println!("[{}]: {}", u.agent_id, u.utterance);
        }
    }
    println!("agents answered: {}", report.num_agents);
    if !report.diagnostics.is_empty() {
        println!("diagnostics: {}", report.diagnostics.len());
        for diagnostic in &report.diagnostics {
            println!("  {}", diagnostic);
        }
    }
    Ok(())
}

fn chat(
    orchestrator: &SimulationOrchestrator,
    agent_id: &str,
    interviewer: &str,
    context: &str,
    llm: Option<&str>,
) -> anyhow::Result<()> {
    let name = orchestrator.agent_name(agent_id)?;
    println!("Talking to {} ({}). Type exit or quit to stop.", name, agent_id);

    let mut dialogue: Vec<DialogueTurn> = Vec::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("[{}]: ", interviewer);
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }

        dialogue.push(DialogueTurn::new(interviewer, text));
        match orchestrator.converse(agent_id, llm, &dialogue, context)? {
            AgentOutcome::Answered(AgentResponse::Utterance(u)) => {
                println!("[{}]: {}", name, u.utterance);
                dialogue.push(DialogueTurn::new(name.clone(), u.utterance));
            }
            AgentOutcome::Answered(other) => {
                bail!("expected an utterance from {}, got {:?}", agent_id, other)
            }
            AgentOutcome::NoAnswer { error, .. } => {
                eprintln!("no reply: {}", error);
                dialogue.pop();
            }
        }
    }
    Ok(())
}
