use anyhow::{bail, Context, Result};
use std::env;

use installment_ledger::{init_tracing, open_database, Config, InstallmentScheduler};

const USAGE: &str = "usage:
  installment-ledger init [--config <file>]
  installment-ledger preview <amount> <count> <YYYY-MM-DD> <closing-day> [--config <file>]";

fn main() -> Result<()> {
    init_tracing();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let config_arg = take_flag(&mut args, "--config")?;
    let config = Config::load(&Config::resolve_path(config_arg.as_deref()))?;

    match args.first().map(String::as_str) {
        Some("init") => run_init(&config),
        Some("preview") => run_preview(&config, &args[1..]),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

/// Remove `--flag <value>` from args, returning the value
fn take_flag(args: &mut Vec<String>, flag: &str) -> Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("{} needs a value", flag);
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

fn run_init(config: &Config) -> Result<()> {
    println!("🗄️  Installment Ledger - database setup");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let path = config.database_path();
    open_database(path).with_context(|| format!("initialise {}", path.display()))?;

    println!("✓ Schema ready at {} (env: {})", path.display(), config.api.env);
    Ok(())
}

fn run_preview(config: &Config, args: &[String]) -> Result<()> {
    let [amount, count, date, closing_day] = args else {
        bail!("preview takes 4 arguments\n{}", USAGE);
    };

    let amount: f64 = amount.parse().context("amount must be a number")?;
    let count: u32 = count.parse().context("count must be a positive integer")?;
    let closing_day: u32 = closing_day.parse().context("closing day must be 1-31")?;

    let scheduler = InstallmentScheduler::new(config.schedule.split);
    let installments = scheduler.schedule(uuid::Uuid::nil(), amount, count, date, closing_day)?;

    println!("📅 {:.2} in {} installments, bought {} (card closes on day {})", amount, count, date, closing_day);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for inst in &installments {
        println!("  {}  {:>10.2}  {}", inst.month_key(), inst.value, inst.description);
    }

    let total: f64 = installments.iter().map(|i| i.value).sum();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  total    {:>10.2}", total);

    Ok(())
}
