//! `governed` command-line entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use governed_core::{
    count_sources, FactChecker, Pipeline, Profile, ProfileRegistry, TaskContract,
    VerificationResult,
};

#[derive(Parser)]
#[command(name = "governed")]
#[command(about = "Verify agent output against a task contract", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML file overriding built-in task profiles
    #[arg(long = "profiles", global = true)]
    profile_overrides: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gates (and the fact check in council mode); exit 1 on failure
    Verify {
        /// Task contract, JSON or YAML
        #[arg(short, long)]
        contract: PathBuf,

        /// Agent output to verify
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Count cited sources by kind
    Sources {
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the fact check label for an output
    Facts {
        #[arg(short, long)]
        contract: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Print the JSON report instead of the label
        #[arg(long)]
        json: bool,
    },

    /// Show the active task profiles
    Profiles {
        #[arg(long)]
        json: bool,
    },

    /// Gates plus a live reviewer council (needs ANTHROPIC_API_KEY)
    Council {
        #[arg(short, long)]
        contract: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Runtime config YAML (timeouts, model, retry, budget, cache)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let registry = load_registry(cli.profile_overrides.as_deref())?;

    match cli.command {
        Commands::Verify { contract, output } => {
            let contract = load_contract(&contract)?;
            let output = read_output(&output)?;
            let result = Pipeline::new()
                .with_registry(registry)
                .run(&contract, &output);
            print_result(&result)
        }
        Commands::Sources { output } => {
            let output = read_output(&output)?;
            println!("{}", serde_json::to_string_pretty(&count_sources(&output))?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Facts {
            contract,
            output,
            json,
        } => {
            let contract = load_contract(&contract)?;
            let output = read_output(&output)?;
            let report = FactChecker::new().check(&output, &contract.user_provided_context);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.nutrition_label());
            }
            Ok(if report.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Profiles { json } => {
            let table: BTreeMap<String, ProfileRow> = registry
                .iter()
                .map(|(task_type, profile)| (task_type.to_string(), ProfileRow::from(profile)))
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                print!("{}", serde_yaml::to_string(&table)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Council {
            contract,
            output,
            config,
        } => {
            let contract = load_contract(&contract)?;
            let output = read_output(&output)?;
            council::run(registry, &contract, &output, config.as_deref()).await
        }
    }
}

#[derive(Serialize)]
struct ProfileRow<'a> {
    min_word_count: usize,
    required_sections: &'a [String],
    structural_checks: Vec<&'a str>,
    grounding_checks: Vec<&'a str>,
}

impl<'a> From<&'a Profile> for ProfileRow<'a> {
    fn from(profile: &'a Profile) -> Self {
        Self {
            min_word_count: profile.min_word_count,
            required_sections: &profile.required_sections,
            structural_checks: profile.structural_checks.iter().map(|c| c.name()).collect(),
            grounding_checks: profile.grounding_checks.iter().map(|c| c.name()).collect(),
        }
    }
}

fn load_registry(path: Option<&Path>) -> Result<ProfileRegistry> {
    match path {
        Some(path) => {
            let yaml = std::fs::read_to_string(path)
                .with_context(|| format!("reading profiles {}", path.display()))?;
            ProfileRegistry::from_yaml(&yaml)
                .with_context(|| format!("loading profiles {}", path.display()))
        }
        None => Ok(ProfileRegistry::builtin()),
    }
}

fn load_contract(path: &Path) -> Result<TaskContract> {
    TaskContract::from_file(path).with_context(|| format!("loading contract {}", path.display()))
}

fn read_output(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading output {}", path.display()))
}

fn print_result(result: &VerificationResult) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(if result.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(feature = "anthropic")]
mod council {
    use super::*;
    use governed_runtime::{AnthropicProvider, Council, GovernedVerifier, RuntimeConfig};
    use std::sync::Arc;

    pub async fn run(
        registry: ProfileRegistry,
        contract: &TaskContract,
        output: &str,
        config: Option<&Path>,
    ) -> Result<ExitCode> {
        let config = match config {
            Some(path) => RuntimeConfig::from_file(path)
                .with_context(|| format!("loading runtime config {}", path.display()))?,
            None => RuntimeConfig::default(),
        };
        let provider = Arc::new(AnthropicProvider::from_env()?);
        let council = Council::from_config(provider, &config);
        let verifier = GovernedVerifier::new(Pipeline::new().with_registry(registry), council);

        let cancel = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::warn!("Interrupted, closing the council"),
                // No signal handler: run to completion.
                Err(_) => std::future::pending::<()>().await,
            }
        };
        let result = verifier.verify_until(contract, output, cancel).await;

        if let Some(usage) = verifier.council().usage() {
            tracing::info!(
                calls = usage.calls,
                tokens = usage.total_tokens,
                cost_usd = usage.estimated_cost,
                "Council usage"
            );
        }
        print_result(&result)
    }
}

#[cfg(not(feature = "anthropic"))]
mod council {
    use super::*;

    pub async fn run(
        _registry: ProfileRegistry,
        _contract: &TaskContract,
        _output: &str,
        _config: Option<&Path>,
    ) -> Result<ExitCode> {
        anyhow::bail!("the council command needs the 'anthropic' feature")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_verify() {
        let cli = Cli::parse_from(["governed", "verify", "-c", "task.yaml", "-o", "out.md"]);
        match cli.command {
            Commands::Verify { contract, output } => {
                assert_eq!(contract, PathBuf::from("task.yaml"));
                assert_eq!(output, PathBuf::from("out.md"));
            }
            _ => panic!("expected verify"),
        }
    }

    #[test]
    fn test_profile_rows_cover_every_task_type() {
        let registry = ProfileRegistry::builtin();
        let rows: BTreeMap<String, ProfileRow> = registry
            .iter()
            .map(|(t, p)| (t.to_string(), ProfileRow::from(p)))
            .collect();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows["custom"].min_word_count, 0);
        assert!(rows["research"].min_word_count > 0);
    }
}
