//! spendctl: SmartSpend CLI client
//!
//! Calls the AI endpoints through the governed advisor.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use smartspend::{
    ApiResponse, Config, FinancialAdvisor, FinancialData, GovernedAdvisor, Insight, InsightKind,
    SmartSpend, UserContext, fallback,
};
use tracing::info;

/// SmartSpend CLI client
#[derive(Parser)]
#[command(name = "spendctl")]
#[command(version = smartspend::PKG_VERSION)]
#[command(about = "SmartSpend AI endpoint client")]
struct Args {
    /// Config file (default: ~/.smartspend/config.toml)
    #[arg(short, long, env = "SMARTSPEND_CONFIG")]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, env = "SMARTSPEND_BASE_URL")]
    base_url: Option<String>,

    /// Print fallback content when a call fails
    #[arg(long)]
    fallback: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate financial insights
    Insights {
        #[arg(short, long)]
        user: String,
    },

    /// Generate budget recommendations
    Budget {
        #[arg(short, long)]
        user: String,
    },

    /// Generate spending predictions
    Predictions {
        #[arg(short, long)]
        user: String,
    },

    /// Ask the financial coach a question
    Advice {
        #[arg(short, long)]
        user: String,
        /// Question to ask
        question: String,
    },

    /// Analyze financial risk
    Risk {
        #[arg(short, long)]
        user: String,
        #[arg(long)]
        income: Option<f64>,
        #[arg(long)]
        expenses: Option<f64>,
        #[arg(long)]
        debt: Option<f64>,
        #[arg(long)]
        savings: Option<f64>,
    },

    /// Show this process's rate limit status for a user
    ///
    /// Limiter state lives only in the running process and is not shared
    /// with the server or other invocations, so a fresh run always
    /// reports the full quota.
    Limits {
        #[arg(short, long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(url) = args.base_url {
        config.api.base_url = url;
    }
    info!(base_url = %config.api.base_url, "using AI endpoints");

    let advisor = SmartSpend::builder().from_config(&config).build()?;
    let use_fallback = args.fallback;

    let ok = match args.command {
        Command::Insights { user } => {
            run_insights(&advisor, InsightKind::Financial, &user, use_fallback).await
        }
        Command::Budget { user } => {
            run_insights(&advisor, InsightKind::Budget, &user, use_fallback).await
        }
        Command::Predictions { user } => {
            run_insights(&advisor, InsightKind::Spending, &user, use_fallback).await
        }
        Command::Advice { user, question } => {
            let context = UserContext::new(user).question(question.clone());
            let response = advisor.get_financial_advice(&context).await;
            report(
                response,
                use_fallback,
                || fallback::fallback_advice(Some(&question)),
                |advice| println!("{advice}"),
            )
        }
        Command::Risk {
            user,
            income,
            expenses,
            debt,
            savings,
        } => {
            let mut data = FinancialData::new(user);
            data.monthly_income = income;
            data.monthly_expenses = expenses;
            data.total_debt = debt;
            data.total_savings = savings;
            match advisor.analyze_financial_risk(&data).await.into_result() {
                Ok(analysis) => {
                    println!("health score: {:.1}", analysis.health_score);
                    println!("{}", analysis.risk_predictions);
                    true
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    false
                }
            }
        }
        Command::Limits { user } => {
            let status = advisor.rate_limit_status(&user);
            println!("limit:     {}", status.limit);
            println!("remaining: {}", status.remaining);
            println!("resets in: {}s", status.reset_after.as_secs());
            if let Some(secs) = status.retry_after {
                println!("retry in:  {secs}s");
            }
            if advisor.is_admin(&user) {
                println!("admin:     yes (bypasses limits)");
            }
            true
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn run_insights(
    advisor: &GovernedAdvisor,
    kind: InsightKind,
    user: &str,
    use_fallback: bool,
) -> bool {
    let response = advisor.insights(kind, user).await;
    report(
        response,
        use_fallback,
        || fallback::fallback_insights(kind),
        |insights| print_insights(&insights),
    )
}

/// Print the response data, or the error (and fallback, if requested).
fn report<T>(
    response: ApiResponse<T>,
    use_fallback: bool,
    fallback: impl FnOnce() -> T,
    print: impl Fn(T),
) -> bool {
    let error = response.error.clone();
    match response.into_result() {
        Ok(data) => {
            print(data);
            true
        }
        Err(e) => {
            eprintln!("error: {}", error.unwrap_or_else(|| e.to_string()));
            if use_fallback {
                eprintln!("showing fallback content");
                print(fallback());
            }
            false
        }
    }
}

fn print_insights(insights: &[Insight]) {
    if insights.is_empty() {
        println!("no insights");
        return;
    }
    for insight in insights {
        let priority = insight.priority.as_deref().unwrap_or("-");
        println!("[{}] ({priority}) {}", insight.kind, insight.title);
        println!("    {}", insight.description);
    }
}
