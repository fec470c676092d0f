//! Binario `deployflow`: lanza un workflow sobre un entorno y espera su
//! resultado. Códigos de salida: 0 éxito, 1 fallo, 2 entorno desconocido,
//! 3 run en curso.
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use deployflow::runner::{self, Approvals};
use deployflow::workflows::{self, WorkflowKind};
use deployflow::{AppConfig, AppError};
use flow_adapters::LogNotifier;
use flow_core::{ApprovalDecision, RunCoordinator, WorkflowRun};

#[derive(Parser, Debug)]
#[command(name = "deployflow", version, about = "Deployment workflow engine for AWX environments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Trigger a workflow run and wait for it to finish
    Run(RunArgs),
    /// Print the steps a run would execute, without executing them
    Plan(PlanArgs),
    /// List the configured environments
    Environments,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Target environment (dev, nonprod, prod, ...)
    environment: String,

    #[arg(long, value_enum, default_value_t = WorkflowKind::Deploy)]
    workflow: WorkflowKind,

    /// Approve every approval gate without prompting
    #[arg(long, conflicts_with = "reject")]
    approve: bool,

    /// Reject the first approval gate without prompting
    #[arg(long)]
    reject: bool,

    /// Print the final run snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct PlanArgs {
    environment: String,

    #[arg(long, value_enum, default_value_t = WorkflowKind::Deploy)]
    workflow: WorkflowKind,

    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Plan(args) => plan(args),
        Commands::Environments => environments(),
    };
    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(args: RunArgs) -> Result<u8, AppError> {
    let config = AppConfig::from_env()?;
    let registry = Arc::new(config.load_registry()?);
    let definition = workflows::build(args.workflow, &config, Arc::new(LogNotifier))?;
    let coordinator = RunCoordinator::with_engine(registry, definition, Arc::new(config.engine()));

    let handle = coordinator.trigger(&args.environment)?;
    println!("run {} started: {} on {}", handle.run_id, args.workflow, handle.environment);

    let mut approvals = if args.approve {
        Approvals::Fixed(ApprovalDecision::Approve)
    } else if args.reject {
        Approvals::Fixed(ApprovalDecision::Reject)
    } else {
        Approvals::from_stdin()
    };
    let interrupt = async {
        // Sin manejador de señales no hay interrupción que atender.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let run = runner::drive(&coordinator, handle.run_id, &mut approvals, interrupt).await?;

    if args.json {
        let json = serde_json::to_string_pretty(&run)?;
        println!("{json}");
    } else {
        print_run(&run);
    }
    Ok(run.exit_code())
}

fn print_run(run: &WorkflowRun) {
    println!("{}", run.report());
    for line in &run.trace {
        println!("  | {line}");
    }
}

fn plan(args: PlanArgs) -> Result<u8, AppError> {
    let config = AppConfig::from_env()?;
    let registry = config.load_registry()?;
    let environment = registry.lookup(&args.environment)?;
    let definition = workflows::build(args.workflow, &config, Arc::new(LogNotifier))?;
    let steps = workflows::plan(&definition, environment);

    if args.json {
        let json = serde_json::to_string_pretty(&steps)?;
        println!("{json}");
        return Ok(0);
    }
    println!("{} on {} (namespace {})", args.workflow, environment.name, environment.namespace);
    for s in steps {
        let gate = if s.gated { " [approval]" } else { "" };
        println!("  {}. {}{gate} (max {} attempt(s))", s.index, s.step_id, s.max_attempts);
        println!("     {}", s.action);
    }
    Ok(0)
}

fn environments() -> Result<u8, AppError> {
    let config = AppConfig::from_env()?;
    let registry = config.load_registry()?;
    println!("{:<12} {:<16} {:>8}  {:<8} approval", "NAME", "NAMESPACE", "REPLICAS", "TIER");
    for env in registry.iter() {
        println!("{:<12} {:<16} {:>8}  {:<8} {}",
                 env.name,
                 env.namespace,
                 env.replicas,
                 env.resource_tier.as_str(),
                 if env.approval_required { "required" } else { "-" });
    }
    Ok(0)
}
