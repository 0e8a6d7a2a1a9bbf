//! CSV format handling for command logs and ledger reports
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization of command log rows
//! - Conversion from CSV records to `LedgerCommand`
//! - Report serialization (customers, stock, partner share, summary)
//!
//! Input columns: `command,customer,codes,amount,brand,cost,price`. Which
//! columns a row needs depends on its command; unused ones may be empty.
//! `codes` holds one or more stock codes separated by spaces or commas.

use crate::aggregation::{
    archived_customers, compute_stats, customer_directory, is_at_risk, is_high_debt,
    partner_ledger, stock_listing, InsightRules, StockQuery,
};
use crate::config::LedgerConfig;
use crate::types::{
    parse_code_list, Amount, LedgerCommand, LedgerError, LedgerSnapshot, StockPricing, Timestamp,
};
use clap::ValueEnum;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct CsvRecord {
    pub command: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub codes: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
}

/// Non-empty trimmed value of an optional column
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, column: &str, command: &str) -> Result<&'a str, String> {
    present(value).ok_or_else(|| format!("{} requires {}", command, column))
}

/// Parse a whole, non-negative amount; `1500` and `1500.00` are both accepted
fn parse_amount(raw: &str, column: &str) -> Result<Amount, String> {
    let invalid = || format!("Invalid {} '{}'", column, raw);
    let value = Decimal::from_str(raw).map_err(|_| invalid())?;
    if !value.fract().is_zero() || value.is_sign_negative() {
        return Err(invalid());
    }
    value.to_i64().ok_or_else(invalid)
}

fn amount_column(value: &Option<String>, column: &str, command: &str) -> Result<Amount, String> {
    parse_amount(required(value, column, command)?, column)
}

fn code_list(record: &CsvRecord, command: &str) -> Result<Vec<String>, String> {
    let codes = parse_code_list(required(&record.codes, "codes", command)?);
    if codes.is_empty() {
        return Err(format!("{} requires at least one code", command));
    }
    Ok(codes)
}

fn single_code(record: &CsvRecord, command: &str) -> Result<String, String> {
    let mut codes = code_list(record, command)?;
    if codes.len() != 1 {
        return Err(format!("{} takes exactly one code, got {}", command, codes.len()));
    }
    Ok(codes.remove(0))
}

fn pricing(record: &CsvRecord, command: &str) -> Result<StockPricing, String> {
    Ok(StockPricing::new(
        required(&record.brand, "brand", command)?,
        amount_column(&record.cost, "cost", command)?,
        amount_column(&record.price, "price", command)?,
    ))
}

/// Convert a CsvRecord to a LedgerCommand
///
/// Checks that the columns the command needs are present and well-formed.
/// Business rules (positive amounts, price ordering, known names) are left to
/// the engine.
///
/// # Returns
///
/// * `Ok(LedgerCommand)` - Successfully converted record
/// * `Err(String)` - Description of the conversion failure
pub fn convert_csv_record(record: CsvRecord) -> Result<LedgerCommand, String> {
    let command = record.command.trim().to_lowercase();
    let name = command.as_str();
    let customer = || required(&record.customer, "customer", name).map(str::to_string);

    let converted = match name {
        "intake" => LedgerCommand::Intake {
            codes: code_list(&record, name)?,
            pricing: pricing(&record, name)?,
        },
        "edit" => LedgerCommand::EditStock {
            code: single_code(&record, name)?,
            pricing: pricing(&record, name)?,
        },
        "remove" => LedgerCommand::RemoveStock {
            code: single_code(&record, name)?,
        },
        "sale" => LedgerCommand::Sale {
            customer: customer()?,
            codes: code_list(&record, name)?,
            initial_payment: match present(&record.amount) {
                Some(raw) => parse_amount(raw, "amount")?,
                None => 0,
            },
        },
        "payment" => LedgerCommand::Payment {
            customer: customer()?,
            amount: amount_column(&record.amount, "amount", name)?,
        },
        "refund" => LedgerCommand::Refund {
            customer: customer()?,
            amount: amount_column(&record.amount, "amount", name)?,
        },
        "return" => LedgerCommand::Return {
            code: single_code(&record, name)?,
        },
        "archive" => LedgerCommand::Archive {
            customer: customer()?,
        },
        "restore" => LedgerCommand::Restore {
            customer: customer()?,
        },
        "settle" | "unsettle" => LedgerCommand::Settle {
            codes: code_list(&record, name)?,
            paid: name == "settle",
        },
        _ => return Err(format!("Invalid command: '{}'", record.command.trim())),
    };
    Ok(converted)
}

/// Reports the replay binary can print
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Every customer with bill, payments and flags
    #[default]
    Customers,
    /// Every stock unit with prices and availability
    Stock,
    /// Partner share per sale, pending first
    Partner,
    /// Dashboard totals
    Summary,
}

/// Write the chosen report for a snapshot
///
/// # Arguments
///
/// * `kind` - Which report to write
/// * `snapshot` - State to report on
/// * `config` - Share rate and insight thresholds
/// * `now` - Reference time for the risk flag
/// * `output` - Destination of the CSV text
pub fn write_report(
    kind: ReportKind,
    snapshot: &LedgerSnapshot,
    config: &LedgerConfig,
    now: Timestamp,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    match kind {
        ReportKind::Customers => {
            write_customers_csv(snapshot, InsightRules::from_config(config), now, output)
        }
        ReportKind::Stock => write_stock_csv(snapshot, output),
        ReportKind::Partner => write_partner_csv(snapshot, output),
        ReportKind::Summary => write_summary_csv(snapshot, config, output),
    }
}

/// Write customers: active ones in directory order, then archived ones
pub fn write_customers_csv(
    snapshot: &LedgerSnapshot,
    rules: InsightRules,
    now: Timestamp,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record([
        "customer",
        "status",
        "billed",
        "paid",
        "balance",
        "at_risk",
        "high_debt",
    ])?;

    let listed = customer_directory(snapshot, "")
        .into_iter()
        .chain(archived_customers(snapshot));
    for customer in listed {
        // Flags only apply to customers still on the books
        let active = customer.is_active();
        let at_risk = active && is_at_risk(customer, now, rules.risk_window);
        let high_debt = active && is_high_debt(customer, rules.high_debt_threshold);
        writer.write_record(&[
            customer.name.clone(),
            customer.status.as_str().to_string(),
            customer.total_billed.to_string(),
            customer.total_paid.to_string(),
            customer.balance().to_string(),
            at_risk.to_string(),
            high_debt.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write every stock unit in natural code order
pub fn write_stock_csv(snapshot: &LedgerSnapshot, output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(["code", "brand", "cost", "price", "status"])?;

    for item in stock_listing(snapshot, &StockQuery::default()).items {
        let status = if item.is_available() { "available" } else { "sold" };
        writer.write_record(&[
            item.external_code.clone(),
            item.brand.clone(),
            item.cost_price.to_string(),
            item.sale_price.to_string(),
            status.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the partner share per sale, pending sales before settled ones
pub fn write_partner_csv(
    snapshot: &LedgerSnapshot,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(["code", "brand", "customer", "profit", "partner_share", "status"])?;

    let pending = partner_ledger(snapshot, false).into_iter().map(|s| (s, "pending"));
    let settled = partner_ledger(snapshot, true).into_iter().map(|s| (s, "paid"));
    for (sale, status) in pending.chain(settled) {
        let buyer = snapshot
            .customer(&sale.customer_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        writer.write_record(&[
            sale.external_code.clone(),
            sale.brand.clone(),
            buyer,
            sale.profit.to_string(),
            sale.partner_share.to_string(),
            status.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write dashboard totals as `metric,value` rows
pub fn write_summary_csv(
    snapshot: &LedgerSnapshot,
    config: &LedgerConfig,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let stats = compute_stats(snapshot, config.partner_share_rate)?;
    let rows: [(&str, i64); 11] = [
        ("capital", stats.capital),
        ("realized_net_profit", stats.realized_net_profit),
        ("projected_net_profit", stats.projected_net_profit),
        ("total_net_profit", stats.total_net_profit),
        ("receivable", stats.receivable),
        ("received", stats.received),
        ("stock_count", stats.stock_count as i64),
        ("stock_value", stats.stock_value),
        ("partner_share_total", stats.partner_share_total),
        ("partner_share_paid", stats.partner_share_paid),
        ("partner_share_pending", stats.partner_share_pending),
    ];

    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(["metric", "value"])?;
    for (metric, value) in rows {
        writer.write_record(&[metric.to_string(), value.to_string()])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Customer, CustomerId, CustomerStatus, SaleRecord, ShareRate, StockItem, StockItemId,
    };
    use chrono::Utc;
    use rstest::rstest;

    fn record(command: &str, customer: &str, codes: &str, amount: &str) -> CsvRecord {
        let opt = |v: &str| Some(v.to_string()).filter(|v| !v.is_empty());
        CsvRecord {
            command: command.to_string(),
            customer: opt(customer),
            codes: opt(codes),
            amount: opt(amount),
            brand: None,
            cost: None,
            price: None,
        }
    }

    fn priced(command: &str, codes: &str, brand: &str, cost: &str, price: &str) -> CsvRecord {
        CsvRecord {
            brand: Some(brand.to_string()),
            cost: Some(cost.to_string()),
            price: Some(price.to_string()),
            ..record(command, "", codes, "")
        }
    }

    fn owned(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[rstest]
    #[case::sale(
        record("sale", " Ali ", "a1, b2", "500"),
        LedgerCommand::Sale { customer: "Ali".to_string(), codes: owned(&["A1", "B2"]), initial_payment: 500 }
    )]
    #[case::sale_without_payment(
        record("SALE", "Ali", "A1", ""),
        LedgerCommand::Sale { customer: "Ali".to_string(), codes: owned(&["A1"]), initial_payment: 0 }
    )]
    #[case::payment(
        record("payment", "Ali", "", "1000.00"),
        LedgerCommand::Payment { customer: "Ali".to_string(), amount: 1000 }
    )]
    #[case::refund(
        record("Refund", "Ali", "", "200"),
        LedgerCommand::Refund { customer: "Ali".to_string(), amount: 200 }
    )]
    #[case::return_item(
        record("return", "", " a1 ", ""),
        LedgerCommand::Return { code: "A1".to_string() }
    )]
    #[case::archive(
        record("archive", "Ali", "", ""),
        LedgerCommand::Archive { customer: "Ali".to_string() }
    )]
    #[case::restore(
        record("restore", "Ali", "", ""),
        LedgerCommand::Restore { customer: "Ali".to_string() }
    )]
    #[case::settle(
        record("settle", "", "A1 B2", ""),
        LedgerCommand::Settle { codes: owned(&["A1", "B2"]), paid: true }
    )]
    #[case::unsettle(
        record("unsettle", "", "A1", ""),
        LedgerCommand::Settle { codes: owned(&["A1"]), paid: false }
    )]
    #[case::remove(
        record("remove", "", "c3", ""),
        LedgerCommand::RemoveStock { code: "C3".to_string() }
    )]
    #[case::intake(
        priced("intake", "A1 A2,A3", "Khaadi", "1000", "1500"),
        LedgerCommand::Intake { codes: owned(&["A1", "A2", "A3"]), pricing: StockPricing::new("Khaadi", 1000, 1500) }
    )]
    #[case::edit(
        priced("edit", "a1", "Sapphire", "900", "1400"),
        LedgerCommand::EditStock { code: "A1".to_string(), pricing: StockPricing::new("Sapphire", 900, 1400) }
    )]
    fn test_convert_csv_record(#[case] record: CsvRecord, #[case] expected: LedgerCommand) {
        assert_eq!(convert_csv_record(record), Ok(expected));
    }

    #[rstest]
    #[case::unknown_command(record("gift", "Ali", "", ""), "Invalid command")]
    #[case::missing_customer(record("payment", "", "", "100"), "requires customer")]
    #[case::missing_amount(record("payment", "Ali", "", ""), "requires amount")]
    #[case::fractional_amount(record("payment", "Ali", "", "10.5"), "Invalid amount")]
    #[case::negative_amount(record("refund", "Ali", "", "-10"), "Invalid amount")]
    #[case::garbage_amount(record("sale", "Ali", "A1", "lots"), "Invalid amount")]
    #[case::missing_codes(record("sale", "Ali", "", ""), "requires codes")]
    #[case::separators_only(record("settle", "", " , ", ""), "requires at least one code")]
    #[case::two_codes_for_return(record("return", "", "A1 B2", ""), "exactly one code")]
    #[case::missing_brand(record("intake", "", "A1", ""), "requires brand")]
    #[case::invalid_cost(priced("intake", "A1", "Khaadi", "abc", "1500"), "Invalid cost")]
    fn test_convert_csv_record_errors(#[case] record: CsvRecord, #[case] expected_error: &str) {
        let error = convert_csv_record(record).unwrap_err();
        assert!(error.contains(expected_error), "{error}");
    }

    fn report_snapshot() -> LedgerSnapshot {
        let now = Utc::now();
        let sold = StockItem {
            id: StockItemId::new(),
            external_code: "A10".to_string(),
            brand: "Khaadi".to_string(),
            cost_price: 1000,
            sale_price: 1500,
            available_qty: 0,
            created_at: now,
        };
        let shelf = StockItem {
            id: StockItemId::new(),
            external_code: "A2".to_string(),
            available_qty: 1,
            ..sold.clone()
        };
        let mut ali = Customer::new(CustomerId::new(), "Ali", now);
        ali.total_billed = 1500;
        ali.total_paid = 500;
        let mut old = Customer::new(CustomerId::new(), "Bilal", now);
        old.status = CustomerStatus::Deleted;
        let sale = SaleRecord::for_item(&sold, ali.id, ShareRate::DEFAULT, now).unwrap();
        LedgerSnapshot::new(vec![sold, shelf], vec![ali, old], vec![], vec![sale])
    }

    fn render(kind: ReportKind) -> String {
        let mut output = Vec::new();
        write_report(
            kind,
            &report_snapshot(),
            &LedgerConfig::default(),
            Utc::now(),
            &mut output,
        )
        .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[rstest]
    #[case::customers(
        ReportKind::Customers,
        "customer,status,billed,paid,balance,at_risk,high_debt\n\
         Ali,active,1500,500,1000,false,false\n\
         Bilal,deleted,0,0,0,false,false\n"
    )]
    #[case::stock(
        ReportKind::Stock,
        "code,brand,cost,price,status\n\
         A2,Khaadi,1000,1500,available\n\
         A10,Khaadi,1000,1500,sold\n"
    )]
    #[case::partner(
        ReportKind::Partner,
        "code,brand,customer,profit,partner_share,status\n\
         A10,Khaadi,Ali,500,100,pending\n"
    )]
    #[case::summary(
        ReportKind::Summary,
        "metric,value\n\
         capital,2000\n\
         realized_net_profit,400\n\
         projected_net_profit,400\n\
         total_net_profit,800\n\
         receivable,1000\n\
         received,500\n\
         stock_count,1\n\
         stock_value,1000\n\
         partner_share_total,100\n\
         partner_share_paid,0\n\
         partner_share_pending,100\n"
    )]
    fn test_write_report(#[case] kind: ReportKind, #[case] expected: &str) {
        assert_eq!(render(kind), expected);
    }

    #[test]
    fn test_empty_reports_have_headers() {
        let mut output = Vec::new();
        write_stock_csv(&LedgerSnapshot::default(), &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "code,brand,cost,price,status\n");
    }
}
