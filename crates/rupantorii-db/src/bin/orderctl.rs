//! # Order Operator CLI
//!
//! Thin admin tool over the order ledger. Every command prints JSON on
//! stdout; logs go to stderr.
//!
//! ## Usage
//! ```bash
//! cargo run -p rupantorii-db --bin orderctl -- list --status pending --search rup-
//! cargo run -p rupantorii-db --bin orderctl -- create ./order.json
//! cargo run -p rupantorii-db --bin orderctl -- show <order-id>
//! cargo run -p rupantorii-db --bin orderctl -- transition <order-id> delivered
//! cargo run -p rupantorii-db --bin orderctl -- transition <order-id> cancelled --reason "Customer unreachable"
//! cargo run -p rupantorii-db --bin orderctl -- low-stock --threshold 5
//! ```

use std::env;
use std::fs::File;
use std::io::{self, BufReader};

use rupantorii_core::{NewOrder, OrderQuery, OrderStatus};
use rupantorii_db::{init_tracing, Database, StoreConfig};
use serde::Serialize;

const USAGE: &str = "\
Rupantorii Order CLI

Usage: orderctl <COMMAND>

Commands:
  list [--page N] [--limit N] [--status S] [--search TEXT]
  create <FILE|->                       Place an order from a JSON submission
  show <ORDER_ID>
  transition <ORDER_ID> <STATUS> [--reason TEXT]
  low-stock [--threshold N]

Statuses: pending, confirmed, shipped, delivered, cancelled, returned";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    let config = StoreConfig::load()?;
    let db = Database::new(config.db_config()).await?;
    let orders = db.orders();

    match command.as_str() {
        "list" => {
            let query = OrderQuery {
                page: flag(rest, "--page").map(|v| v.parse::<u32>()).transpose()?.unwrap_or(1),
                limit: flag(rest, "--limit")
                    .map(|v| v.parse::<u32>())
                    .transpose()?
                    .unwrap_or(config.page_limit),
                status: flag(rest, "--status").map(|v| v.parse::<OrderStatus>()).transpose()?,
                search: flag(rest, "--search").map(str::to_string),
            };
            print_json(&orders.list_orders(query).await?)?;
        }
        "create" => {
            let source = positional(rest, 0, "FILE")?;
            let submission: NewOrder = if source == "-" {
                serde_json::from_reader(io::stdin().lock())?
            } else {
                serde_json::from_reader(BufReader::new(File::open(source)?))?
            };
            print_json(&orders.create_order(submission).await?)?;
        }
        "show" => {
            let id = positional(rest, 0, "ORDER_ID")?;
            print_json(&orders.get_order(id).await?)?;
        }
        "transition" => {
            let id = positional(rest, 0, "ORDER_ID")?;
            let status: OrderStatus = positional(rest, 1, "STATUS")?.parse()?;
            let reason = flag(rest, "--reason");
            print_json(&orders.transition_status(id, status, reason).await?)?;
        }
        "low-stock" => {
            let threshold = flag(rest, "--threshold")
                .map(|v| v.parse::<i64>())
                .transpose()?
                .unwrap_or(config.low_stock_threshold);
            print_json(&db.alerts().low_stock(threshold).await?)?;
        }
        "--help" | "-h" | "help" => println!("{}", USAGE),
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            eprintln!("{}", USAGE);
            db.close().await;
            std::process::exit(2);
        }
    }

    db.close().await;
    Ok(())
}

/// Value following `name`, if present.
fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// The `index`th argument that is neither a flag nor a flag's value.
fn positional<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str, String> {
    let mut values = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i].starts_with("--") {
            i += 2;
            continue;
        }
        values.push(args[i].as_str());
        i += 1;
    }
    values
        .get(index)
        .copied()
        .ok_or_else(|| format!("missing <{}>\n\n{}", name, USAGE))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
