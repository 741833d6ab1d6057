// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use stage_conductor::{
    Config, ConnectivityProbe, ConsolePrompt, Decision, DecisionPrompt, HttpConnectivityProbe,
    PipelineRun, PresetPrompt, ProcessRunner, RendererKind, StageCommand, StageId,
    StageSequencer, UiBridge, interpreter, report, ui,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "stage-conductor")]
#[command(author = "cipher")]
#[command(version = "0.1.0")]
#[command(about = "Runs the three-stage content pipeline with live progress", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the connectivity check and then every stage in order
    Run {
        /// Answer "run" to every stage prompt
        #[arg(short, long)]
        yes: bool,

        /// Skip a stage (1, 2, 3 or its name); repeatable
        #[arg(long, value_name = "STAGE")]
        skip: Vec<StageId>,

        /// Force the line-oriented renderer
        #[arg(long)]
        plain: bool,

        /// No renderer at all; only logs and the final summary
        #[arg(long)]
        headless: bool,

        #[arg(long)]
        no_probe: bool,

        /// Print the run record as JSON when done
        #[arg(long)]
        json: bool,
    },

    /// Only run the connectivity check
    Check,

    /// Show the resolved interpreter and stage command lines
    Stages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    stage_conductor::utils::logging::init_logger(cli.color, cli.verbose);

    info!("Stage Conductor");
    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    match cli.command {
        Commands::Run {
            yes,
            skip,
            plain,
            headless,
            no_probe,
            json,
        } => {
            let options = RunOptions {
                yes,
                skip,
                plain,
                headless,
                no_probe,
                json,
                colored: cli.color,
            };
            cmd_run(&config, options).await?;
        }
        Commands::Check => {
            cmd_check(&config).await?;
        }
        Commands::Stages => {
            cmd_stages(&config);
        }
    }

    Ok(())
}

struct RunOptions {
    yes: bool,
    skip: Vec<StageId>,
    plain: bool,
    headless: bool,
    no_probe: bool,
    json: bool,
    colored: bool,
}

fn build_prompt(options: &RunOptions) -> Arc<dyn DecisionPrompt> {
    if !options.yes && options.skip.is_empty() {
        return Arc::new(ConsolePrompt);
    }
    if !options.yes {
        warn!("--skip without --yes: the remaining stages run without asking");
    }
    let prompt = options
        .skip
        .iter()
        .fold(PresetPrompt::new(Decision::Run), |prompt, stage| {
            prompt.with(*stage, Decision::Skip)
        });
    Arc::new(prompt)
}

async fn cmd_run(config: &Config, options: RunOptions) -> Result<()> {
    let interpreter = interpreter::resolve_interpreter(&config.interpreter);
    info!("Using interpreter {}", interpreter.display());

    let bridge = Arc::new(UiBridge::new());
    let runner = ProcessRunner::from_config(bridge.clone(), &config.stages);
    let commands = StageCommand::all_from_config(config, &interpreter);

    let mut sequencer =
        StageSequencer::new(Arc::new(runner), build_prompt(&options), bridge, commands)
            .context("Invalid stage setup")?;
    if config.probe.enabled && !options.no_probe {
        let probe = HttpConnectivityProbe::new(&config.probe)
            .context("Failed to set up connectivity check")?;
        sequencer = sequencer.with_probe(Arc::new(probe));
    } else {
        info!("Connectivity check disabled");
    }
    let sequencer = Arc::new(sequencer);

    let run = if options.headless {
        let run = sequencer.run().await?;
        for line in report::summary_lines(&run, options.colored) {
            println!("{}", line);
        }
        run
    } else {
        let (tx, rx) = mpsc::unbounded_channel();
        let (content, prompt) = ui::channel_updaters(tx);
        let mut renderer =
            RendererKind::detect(config.ui.renderer, options.plain).build(options.colored);

        let worker = {
            let sequencer = sequencer.clone();
            tokio::spawn(async move { sequencer.run_with_ui(content, prompt).await })
        };

        // The channel closes once the worker has restored the bridge.
        let delivered = ui::drive(rx, renderer.as_mut()).await;
        let run = worker.await.context("Pipeline worker panicked")??;
        info!("Delivered {} ui updates", delivered);
        renderer.finish(&run);
        run
    };

    if options.json {
        print_json(&run)?;
    }

    if let Some(cause) = &run.abort_cause {
        error!("Pipeline aborted: {}", cause);
        bail!("Pipeline aborted: {}", cause);
    }

    Ok(())
}

fn print_json(run: &PipelineRun) -> Result<()> {
    let json = run.to_json().context("Failed to serialize run")?;
    println!("{}", json);
    Ok(())
}

async fn cmd_check(config: &Config) -> Result<()> {
    info!("Checking connectivity");

    let probe = HttpConnectivityProbe::new(&config.probe)
        .context("Failed to set up connectivity check")?;

    match probe.check().await {
        Ok(reply) => {
            info!("Connectivity check passed: {}", reply);
            Ok(())
        }
        Err(e) => {
            error!("Connectivity check failed: {}", e);
            Err(e).context("Connectivity check failed")
        }
    }
}

fn cmd_stages(config: &Config) {
    let interpreter = interpreter::resolve_interpreter(&config.interpreter);

    println!("interpreter: {}", interpreter.display());
    println!("working dir: {}", config.stages.working_dir.display());
    for command in StageCommand::all_from_config(config, &interpreter) {
        println!(
            "[{}/{}] {:<32} {:?}",
            command.stage.index() + 1,
            StageId::ALL.len(),
            command.stage.title(),
            command.mode
        );
        println!("      {}", command.command_line());
        println!(
            "      log: {}",
            config.stages.log_path(command.stage).display()
        );
    }
}
