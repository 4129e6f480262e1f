use std::collections::VecDeque;
use std::sync::Arc;

use alloy::primitives::Address;

use fhe_refund_desk::domain::{format_refund, TaxRecord};
use fhe_refund_desk::ledger::{AlloyLedger, LedgerConfig, DEFAULT_CHAIN_ID};
use fhe_refund_desk::metrics::MetricsRegistry;
use fhe_refund_desk::telemetry::{init_telemetry, TelemetryConfig};
use fhe_refund_desk::workflow::RecordRepository;
use fhe_refund_desk::ReadOnlyLedger;

fn print_help() {
    eprintln!(
        "\
refund-admin

USAGE:
  refund-admin <command> [options]

COMMANDS:
  list                            List every tax record on the ledger
  show                            Print one record as JSON
  stats                           Refund totals over all records
  search                          List records matching a name or category
  availability                    Ask the contract whether it accepts traffic

COMMON OPTIONS:
  --rpc-url <url>                 (defaults to env TAX_LEDGER_RPC_URL)
  --contract <address>            (defaults to env TAX_LEDGER_CONTRACT_ADDRESS)

show OPTIONS:
  --id <record id>                (required)

search OPTIONS:
  --term <text>                   (required)

ENV (logging):
  LOG_LEVEL / RUST_LOG / LOG_JSON / LOG_CONSOLE
"
    );
}

#[derive(Default)]
struct Options {
    rpc_url: Option<String>,
    contract: Option<Address>,
    id: Option<String>,
    term: Option<String>,
}

fn parse_options(args: &mut VecDeque<String>) -> anyhow::Result<Option<Options>> {
    let mut options = Options::default();
    while let Some(arg) = args.pop_front() {
        match arg.as_str() {
            "--rpc-url" => {
                options.rpc_url = Some(
                    args.pop_front()
                        .ok_or_else(|| anyhow::anyhow!("missing value for --rpc-url"))?,
                );
            }
            "--contract" => {
                let raw = args
                    .pop_front()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --contract"))?;
                options.contract = Some(
                    raw.parse()
                        .map_err(|e| anyhow::anyhow!("invalid --contract {raw}: {e}"))?,
                );
            }
            "--id" => {
                options.id = Some(
                    args.pop_front()
                        .ok_or_else(|| anyhow::anyhow!("missing value for --id"))?,
                );
            }
            "--term" => {
                options.term = Some(
                    args.pop_front()
                        .ok_or_else(|| anyhow::anyhow!("missing value for --term"))?,
                );
            }
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }
    Ok(Some(options))
}

fn require_config(options: &Options) -> anyhow::Result<LedgerConfig> {
    let from_env = LedgerConfig::from_env();

    let rpc_url = options
        .rpc_url
        .clone()
        .or_else(|| from_env.as_ref().map(|c| c.rpc_url.clone()))
        .ok_or_else(|| anyhow::anyhow!("TAX_LEDGER_RPC_URL is required (or pass --rpc-url)"))?;
    let contract_address = options
        .contract
        .or_else(|| from_env.as_ref().map(|c| c.contract_address))
        .ok_or_else(|| {
            anyhow::anyhow!("TAX_LEDGER_CONTRACT_ADDRESS is required (or pass --contract)")
        })?;

    Ok(LedgerConfig {
        rpc_url,
        contract_address,
        private_key: None,
        chain_id: from_env.map(|c| c.chain_id).unwrap_or(DEFAULT_CHAIN_ID),
    })
}

fn amount_column(record: &TaxRecord) -> String {
    match record.attested_amount() {
        Some(amount) => amount.to_string(),
        None => "encrypted".to_string(),
    }
}

fn print_records(records: &[TaxRecord]) {
    for record in records {
        println!(
            "{:<28} {:<24} {:<10} {:<9} {:>12} est={}",
            record.id,
            record.name,
            record.category,
            if record.is_verified { "verified" } else { "pending" },
            amount_column(record),
            record.public_value1,
        );
    }
    println!("{} record(s)", records.len());
}

async fn load_repository(ledger: Arc<AlloyLedger>) -> anyhow::Result<RecordRepository> {
    let metrics = Arc::new(MetricsRegistry::new());
    let repository = RecordRepository::new(ledger, metrics.clone());
    let report = repository.reload().await?;
    for id in &report.skipped {
        eprintln!("warn: skipped {id} (failed to load)");
    }
    tracing::debug!(metrics = %metrics.to_json().await, "Reload finished");
    Ok(repository)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry(&TelemetryConfig::from_env())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let mut args: VecDeque<String> = std::env::args().skip(1).collect();
    let Some(command) = args.pop_front() else {
        print_help();
        return Ok(());
    };

    if matches!(command.as_str(), "-h" | "--help" | "help") {
        print_help();
        return Ok(());
    }

    let Some(options) = parse_options(&mut args)? else {
        return Ok(());
    };

    match command.as_str() {
        "list" => {
            let ledger = Arc::new(AlloyLedger::new(require_config(&options)?));
            let repository = load_repository(ledger).await?;
            print_records(&repository.records());
            Ok(())
        }
        "show" => {
            let id = options
                .id
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--id is required"))?;
            let ledger = AlloyLedger::new(require_config(&options)?);
            let data = ledger.get_business_data(&id).await?;
            let record = TaxRecord::from_ledger(id, data);
            println!("{}", serde_json::to_string_pretty(&record)?);
            if let Some(amount) = record.attested_amount() {
                println!("estimated refund: {}", format_refund(amount));
            }
            Ok(())
        }
        "stats" => {
            let ledger = Arc::new(AlloyLedger::new(require_config(&options)?));
            let repository = load_repository(ledger).await?;
            let stats = repository.stats();
            println!("total refund:   {:.2}", stats.total_refund);
            println!("average refund: {:.2}", stats.average_refund);
            println!("verified:       {}", stats.verified_count);
            println!("pending:        {}", stats.pending_count);
            Ok(())
        }
        "search" => {
            let term = options
                .term
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--term is required"))?;
            let ledger = Arc::new(AlloyLedger::new(require_config(&options)?));
            let repository = load_repository(ledger).await?;
            print_records(&repository.search(&term));
            Ok(())
        }
        "availability" => {
            let ledger = AlloyLedger::new(require_config(&options)?);
            if ledger.is_available().await? {
                println!("ok: system available");
            } else {
                println!("unavailable: system temporarily unavailable");
            }
            Ok(())
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}")
        }
    }
}
