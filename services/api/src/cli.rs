use crate::server;
use clap::{Args, Parser, Subcommand};
use hunt_property::config::AppConfig;
use hunt_property::domain::finance::EmiRequest;
use hunt_property::error::AppError;
use hunt_property::store::mongo;
use hunt_property::{telemetry, ConfigError};
use validator::Validate;

#[derive(Parser, Debug)]
#[command(
    name = "Hunt Property API",
    about = "Run and maintain the Hunt Property marketplace backend",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Create the MongoDB indexes used by search, uniqueness and OTP expiry
    Indexes,
    /// Print the EMI breakdown for a loan
    Emi(EmiArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct EmiArgs {
    /// Principal in rupees
    #[arg(long)]
    amount: f64,
    /// Annual interest rate in percent
    #[arg(long)]
    rate: f64,
    /// Tenure in years
    #[arg(long)]
    years: f64,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Indexes => create_indexes().await,
        Command::Emi(args) => print_emi(args),
    }
}

async fn create_indexes() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let url = config
        .database
        .url
        .clone()
        .ok_or(ConfigError::MissingVar { key: "MONGODB_URL" })?;
    let (_client, database) = mongo::connect(&config.database, &url).await?;
    mongo::ensure_indexes(&database).await?;
    println!("indexes ensured on database '{}'", config.database.name);
    Ok(())
}

fn print_emi(args: EmiArgs) -> Result<(), AppError> {
    let request = EmiRequest {
        loan_amount: args.amount,
        loan_tenure_years: args.years,
        rate_of_interest: args.rate,
    };
    request.validate()?;
    let breakdown = request.evaluate();

    println!("Monthly EMI:           {:>14.0}", breakdown.monthly_emi);
    println!("Total interest:        {:>14.0}", breakdown.total_interest);
    println!("Total amount payable:  {:>14.0}", breakdown.total_amount_payable);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emi_rejects_out_of_range_tenure() {
        let args = EmiArgs {
            amount: 1_000_000.0,
            rate: 8.5,
            years: 45.0,
        };
        assert!(matches!(print_emi(args), Err(AppError::Input(_))));
    }

    #[test]
    fn emi_prints_valid_breakdown() {
        let args = EmiArgs {
            amount: 1_000_000.0,
            rate: 8.5,
            years: 20.0,
        };
        assert!(print_emi(args).is_ok());
    }
}
