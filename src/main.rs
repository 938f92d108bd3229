use anyhow::{Context, Result};
use asterix_nlq::{Config, NlqPipeline, PipelineOutcome, QueryPackage, VerificationResult};
use clap::{Parser, Subcommand};
use std::num::NonZeroU32;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "asterix-nlq")]
#[command(about = "Ask AsterixDB questions in natural language, with a safety gate before execution")]
struct Args {
    /// AsterixDB query service URL (or set ASTERIXDB_URL)
    #[arg(long, global = true)]
    asterixdb_url: Option<String>,

    /// Model backend: huggingface or ollama (or set LLM_BACKEND)
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate, verify and execute a query for a question
    Ask {
        #[arg(short, long)]
        dataverse: String,

        /// Result-size bound requested from the model
        #[arg(short, long)]
        limit: Option<NonZeroU32>,

        /// Stop after verification
        #[arg(long)]
        dry_run: bool,

        question: String,
    },
    /// Verify a hand-written SQL++ query without executing it
    Verify {
        #[arg(short, long)]
        dataverse: String,

        #[arg(short, long)]
        limit: Option<NonZeroU32>,

        query: String,
    },
    /// Print the catalog metadata of a dataverse as JSON
    Metadata {
        #[arg(short, long)]
        dataverse: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!("Using AsterixDB at {}", config.asterixdb_url);

    match args.command {
        Command::Ask {
            dataverse,
            limit,
            dry_run,
            question,
        } => {
            info!("Generating with {} backend", config.backend);
            let pipeline = NlqPipeline::from_config(&config).context("failed to set up pipeline")?;
            let limit = limit.unwrap_or(config.default_limit);
            if dry_run {
                let (package, verification) = pipeline.prepare(&dataverse, &question, limit).await?;
                print_package(&package);
                print_verification(&verification);
                return Ok(verdict_code(&verification));
            }

            match pipeline.run(&dataverse, &question, limit).await? {
                PipelineOutcome::Executed {
                    package,
                    verification,
                    rows,
                } => {
                    print_package(&package);
                    print_verification(&verification);
                    println!("\n=== Results ({} rows) ===", rows.len());
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                    Ok(ExitCode::SUCCESS)
                }
                PipelineOutcome::Rejected {
                    package,
                    verification,
                } => {
                    print_package(&package);
                    print_verification(&verification);
                    error!("Query rejected, nothing was executed");
                    Ok(ExitCode::from(2))
                }
            }
        }
        Command::Verify {
            dataverse,
            limit,
            query,
        } => {
            let pipeline = NlqPipeline::catalog_only(&config).context("failed to set up pipeline")?;
            let limit = limit.unwrap_or(config.default_limit);
            let (_, verification) = pipeline.verify_query(&dataverse, &query, limit).await?;
            print_verification(&verification);
            Ok(verdict_code(&verification))
        }
        Command::Metadata { dataverse } => {
            let pipeline = NlqPipeline::catalog_only(&config).context("failed to set up pipeline")?;
            let metadata = pipeline.fetch_metadata(&dataverse).await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut kv: std::collections::HashMap<String, String> = std::env::vars().collect();
    if let Some(backend) = &args.backend {
        kv.insert("LLM_BACKEND".to_string(), backend.clone());
    }
    if let Some(url) = &args.asterixdb_url {
        kv.insert("ASTERIXDB_URL".to_string(), url.clone());
    }
    Config::from_kv(&kv).context("invalid configuration")
}

fn print_package(package: &QueryPackage) {
    println!("\n=== Query Package ===");
    println!("Natural Query: {}", package.natural_query());
    println!("SQL++ Query:   {}", package.query());
    println!("Dataverse:     {}", package.dataverse_name());
    println!("Limit:         {}", package.limit());
    println!("Generated at:  {}", package.timestamp().to_rfc3339());
}

fn print_verification(verification: &VerificationResult) {
    println!("\n=== Verification ===");
    print!("{}", verification);
    println!(
        "{}",
        if verification.passed {
            "Query verification passed"
        } else {
            "Query verification failed"
        }
    );
}

fn verdict_code(verification: &VerificationResult) -> ExitCode {
    if verification.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}
