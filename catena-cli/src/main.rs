//! Catena CLI - run prompts, agents and evaluations from the command line

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use catena_core::prelude::*;

#[derive(Parser)]
#[command(name = "catena")]
#[command(about = "Composable LLM chains and agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (replaces the default search path)
    #[arg(long, global = true, env = "CATENA_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Use the fake model with this scripted response (repeatable)
    #[arg(long, global = true)]
    fake: Vec<String>,

    /// Stream tokens to stdout as they arrive
    #[arg(long, global = true)]
    stream: bool,

    /// Log every model, chain and agent event
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a prompt template and generate once
    Prompt {
        /// Template with {{variable}} placeholders
        template: String,

        /// Template variable as key=value (repeatable)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },
    /// Answer a question with the zero-shot ReAct agent
    Agent {
        question: String,

        /// Give the agent a bash tool
        #[arg(long)]
        bash: bool,

        /// Iteration cap; 0 disables it (defaults to the configured value)
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Print every intermediate step
        #[arg(long)]
        show_steps: bool,
    },
    /// Grade predictions in a JSON file of {examples, predictions}
    Eval {
        file: PathBuf,

        /// Grade against the example's context instead of its answer
        #[arg(long)]
        context: bool,

        /// Fail on verdicts that are neither CORRECT nor INCORRECT
        #[arg(long)]
        strict: bool,
    },
    /// Print the effective configuration
    Config,
    /// Version information
    Version,
}

fn parse_var(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

/// Prints streamed tokens as they arrive
struct StdoutTokens;

#[async_trait]
impl Callback for StdoutTokens {
    async fn on_model_new_token(&self, token: &str) -> CallbackResult {
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "{}", token)?;
        stdout.flush()?;
        Ok(())
    }

    async fn on_model_end(&self, _model_type: &str, _result: &ModelResult) -> CallbackResult {
        println!();
        Ok(())
    }
}

fn load_config(cli: &Cli) -> Result<CatenaConfig> {
    let mut config = match &cli.config {
        Some(path) => CatenaConfig::from_file(path)?,
        None => CatenaConfig::load()?,
    };

    if !cli.fake.is_empty() {
        config.model = ModelConfig::fake(cli.fake.clone());
    }
    if cli.stream {
        config.model.stream = true;
    }
    if cli.verbose {
        config.verbose = true;
    }

    config.validate()?;
    Ok(config)
}

fn create_model(config: &CatenaConfig) -> Result<Arc<dyn LanguageModel>> {
    ModelFactory::create_with_http(&config.model, &config.http, config.verbose)
        .context("failed to create model")
}

/// Run context cancelled by Ctrl-C, streaming tokens when asked to
fn run_context(stream: bool) -> RunContext {
    let mut callbacks = CallbackManager::new();
    if stream {
        callbacks.register(Arc::new(StdoutTokens));
    }
    let ctx = RunContext::new().with_callbacks(callbacks);

    let cancel = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            cancel.cancel();
        }
    });
    ctx
}

async fn run_prompt(
    config: &CatenaConfig,
    template: &str,
    vars: Vec<(String, String)>,
) -> Result<()> {
    let model = create_model(config)?;
    let chain = LlmChain::new(model, PromptTemplate::new(template)?).with_verbose(config.verbose);
    let inputs: ChainValues = vars
        .into_iter()
        .map(|(k, v)| (k, Value::from(v)))
        .collect();

    let ctx = run_context(config.model.stream);
    let text = chain::predict(&chain, inputs, &ctx).await?;
    if !config.model.stream {
        println!("{}", text);
    }
    Ok(())
}

async fn run_agent(
    config: &CatenaConfig,
    question: &str,
    bash: bool,
    max_iterations: Option<usize>,
    show_steps: bool,
) -> Result<()> {
    let model = create_model(config)?;

    let mut tools = ToolRegistry::new();
    if bash {
        tools.register(Arc::new(BashTool::new()))?;
    }
    let agent = ZeroShotReactAgent::new(model, &tools)?;

    let mut executor_config = AgentExecutorConfig::from(&config.agent).with_verbose(config.verbose);
    if let Some(max) = max_iterations {
        executor_config = executor_config.with_max_iterations((max > 0).then_some(max));
    }
    let executor = AgentExecutor::new(Arc::new(agent), tools).with_config(executor_config);

    let ctx = run_context(config.model.stream);
    let inputs = ChainValues::from([("input", question)]);

    match executor.run_with_history(&inputs, &ctx).await {
        Ok(run) => {
            if show_steps {
                print_steps(&run.steps);
            }
            let answer = run.return_values.get_string("output")?;
            println!("{}", answer);
            Ok(())
        }
        Err(failure) => {
            print_steps(&failure.steps);
            Err(failure.error).context(format!(
                "agent stopped after {} step(s)",
                failure.steps.len()
            ))
        }
    }
}

fn print_steps(steps: &[AgentStep]) {
    for (i, step) in steps.iter().enumerate() {
        eprintln!(
            "[{}] {}({}) -> {}",
            i + 1,
            step.action.tool,
            step.action.tool_input,
            step.observation.trim_end()
        );
    }
}

async fn run_eval(config: &CatenaConfig, file: &Path, context: bool, strict: bool) -> Result<()> {
    let dataset = EvalDataset::load(file)
        .with_context(|| format!("failed to load dataset {}", file.display()))?;
    let model = create_model(config)?;
    let ctx = run_context(false);

    let (results, output_key) = if context {
        let mut eval = ContextQaEvalChain::new(model)?;
        if strict {
            eval = eval.with_grade_parser();
        }
        let key = eval.output_key().to_string();
        (
            eval.evaluate(&dataset.examples, &dataset.predictions, &ctx)
                .await?,
            key,
        )
    } else {
        let mut eval = QaEvalChain::new(model)?;
        if strict {
            eval = eval.with_grade_parser();
        }
        let key = eval.output_key().to_string();
        (
            eval.evaluate(&dataset.examples, &dataset.predictions, &ctx)
                .await?,
            key,
        )
    };

    for (i, result) in results.iter().enumerate() {
        let verdict = result.get(&output_key).map(Value::render).unwrap_or_default();
        println!("{}\t{}", i, verdict.trim());
    }

    let summary = EvalSummary::from_results(&results, &output_key);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn print_config(config: &CatenaConfig) -> Result<()> {
    let mut shown = config.clone();
    if shown.model.api_key.is_some() {
        shown.model.api_key = Some("<redacted>".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("catena {}", env!("CARGO_PKG_VERSION"));
        println!("catena-core {}", catena_core::VERSION);
        return Ok(());
    }

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Prompt { template, vars } => run_prompt(&config, &template, vars).await,
        Commands::Agent {
            question,
            bash,
            max_iterations,
            show_steps,
        } => run_agent(&config, &question, bash, max_iterations, show_steps).await,
        Commands::Eval {
            file,
            context,
            strict,
        } => {
            if config.model.stream {
                bail!("--stream is not supported for eval");
            }
            run_eval(&config, &file, context, strict).await
        }
        Commands::Config => print_config(&config),
        Commands::Version => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("country=France").unwrap(),
            ("country".to_string(), "France".to_string())
        );
        assert_eq!(
            parse_var("expr=a=b").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "catena", "prompt", "Hi {{name}}", "--var", "name=Ada", "--fake", "Hello", "--stream",
        ])
        .unwrap();

        assert_eq!(cli.fake, vec!["Hello"]);
        assert!(cli.stream);
        match cli.command {
            Commands::Prompt { template, vars } => {
                assert_eq!(template, "Hi {{name}}");
                assert_eq!(vars, vec![("name".to_string(), "Ada".to_string())]);
            }
            _ => panic!("expected prompt command"),
        }
    }
}
