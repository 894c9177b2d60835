use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use loanworth::core::LoanForm;
use loanworth::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct CalcArgs {
    /// Loan start date (YYYY-MM-DD)
    #[arg(short, long)]
    start_date: String,

    /// Loan duration in months
    #[arg(short, long)]
    months: String,

    /// Loan amount in the loan currency
    #[arg(short, long)]
    amount: String,

    /// Annual interest rate in percent
    #[arg(short, long)]
    rate: String,

    /// Loan currency (USD, EUR, CZK); defaults to the configured currency
    #[arg(long)]
    currency: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl From<CalcArgs> for loanworth::AppCommand {
    fn from(args: CalcArgs) -> loanworth::AppCommand {
        loanworth::AppCommand::Calculate {
            form: LoanForm {
                start_date: Some(args.start_date),
                currency: args.currency,
                amount: Some(args.amount),
                rate: Some(args.rate),
                duration: Some(args.months),
            },
            json: args.json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Check whether a BTC-collateralized loan was worth it
    Calc(CalcArgs),
    /// Recompute interactively from field=value lines on stdin
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config_path = cli.config_path.as_deref();
    let result = match cli.command {
        Some(Commands::Setup) => loanworth::cli::setup::setup().map(|path| {
            println!("Created default configuration at {}", path.display());
        }),
        Some(Commands::Calc(args)) => loanworth::run_command(args.into(), config_path).await,
        Some(Commands::Watch) => {
            loanworth::run_command(loanworth::AppCommand::Watch, config_path).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
