//! CSV surface of the engine: a command feed in, mason statements out.
//!
//! Rows are discriminated by their `type` column; seed rows create
//! masons, rewards, lifts, KYC submissions, and redemption orders, while
//! `*_decision` rows carry administrative actions. A backoffice actor is
//! synthesized from the `org` column of each decision row.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::auth::{Actor, Role};
use crate::engine::MasonAccount;
use crate::model::{AccountEdits, Command, KycOutcome, KycStatus, LiftDecision, RedemptionStatus};
use crate::points::Points;

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized row type '{kind}'")]
    UnrecognizedType { line: usize, kind: String },

    #[error("line {line}: {kind} row missing '{field}'")]
    MissingField {
        line: usize,
        kind: String,
        field: &'static str,
    },

    #[error("line {line}: invalid date '{date}'")]
    BadDate { line: usize, date: String },

    #[error("line {line}: unrecognized decision '{decision}'")]
    UnrecognizedDecision { line: usize, decision: String },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    id: Option<u32>,
    mason: Option<u32>,
    org: Option<u32>,
    referrer: Option<u32>,
    reward: Option<u32>,
    bags: Option<u32>,
    quantity: Option<u32>,
    stock: Option<u32>,
    cost: Option<i64>,
    name: Option<String>,
    date: Option<String>,
    decision: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    mason: u32,
    points: i64,
    bags: u32,
    kyc: String,
}

fn require<T>(
    line: usize,
    kind: &str,
    field: &'static str,
    value: Option<T>,
) -> Result<T, CsvError> {
    value.ok_or_else(|| CsvError::MissingField {
        line,
        kind: kind.to_string(),
        field,
    })
}

/// Decision rows act on behalf of the org's back office.
fn actor_for(org: u32) -> Actor {
    Actor::new(0, org, Role::Backoffice)
}

fn parse_row(line: usize, row: InputRow) -> Result<Command, CsvError> {
    let kind = row.r#type.as_str();
    match kind {
        "mason" => Ok(Command::RegisterMason {
            mason: require(line, kind, "id", row.id)?,
            org: require(line, kind, "org", row.org)?,
            referred_by: row.referrer,
        }),
        "reward" => Ok(Command::AddReward {
            reward: require(line, kind, "id", row.id)?,
            name: require(line, kind, "name", row.name)?,
            stock: require(line, kind, "stock", row.stock)?,
            cost: Points::new(require(line, kind, "cost", row.cost)?),
        }),
        "lift" => {
            let date = require(line, kind, "date", row.date)?;
            let purchase_date = date
                .parse()
                .map_err(|_| CsvError::BadDate { line, date })?;
            Ok(Command::SubmitBagLift {
                lift: require(line, kind, "id", row.id)?,
                mason: require(line, kind, "mason", row.mason)?,
                dealer: None,
                bags: require(line, kind, "bags", row.bags)?,
                purchase_date,
            })
        }
        "kyc" => Ok(Command::SubmitKyc {
            submission: require(line, kind, "id", row.id)?,
            mason: require(line, kind, "mason", row.mason)?,
        }),
        "redemption" => Ok(Command::PlaceRedemption {
            redemption: require(line, kind, "id", row.id)?,
            mason: require(line, kind, "mason", row.mason)?,
            reward: require(line, kind, "reward", row.reward)?,
            quantity: require(line, kind, "quantity", row.quantity)?,
        }),
        "lift_decision" => {
            let decision = require(line, kind, "decision", row.decision)?;
            let decision = match decision.as_str() {
                "approved" => LiftDecision::Approved,
                "rejected" => LiftDecision::Rejected,
                _ => return Err(CsvError::UnrecognizedDecision { line, decision }),
            };
            Ok(Command::DecideBagLift {
                actor: actor_for(require(line, kind, "org", row.org)?),
                lift: require(line, kind, "id", row.id)?,
                decision,
                memo: row.notes,
            })
        }
        "redemption_decision" => {
            let decision = require(line, kind, "decision", row.decision)?;
            let status = match decision.as_str() {
                "approved" => RedemptionStatus::Approved,
                "shipped" => RedemptionStatus::Shipped,
                "delivered" => RedemptionStatus::Delivered,
                "rejected" => RedemptionStatus::Rejected,
                _ => return Err(CsvError::UnrecognizedDecision { line, decision }),
            };
            Ok(Command::UpdateRedemption {
                actor: actor_for(require(line, kind, "org", row.org)?),
                redemption: require(line, kind, "id", row.id)?,
                status,
                notes: row.notes,
            })
        }
        "kyc_decision" => {
            let decision = require(line, kind, "decision", row.decision)?;
            let outcome = match decision.as_str() {
                "verified" => KycOutcome::Verified,
                "rejected" => KycOutcome::Rejected,
                _ => return Err(CsvError::UnrecognizedDecision { line, decision }),
            };
            Ok(Command::DecideKyc {
                actor: actor_for(require(line, kind, "org", row.org)?),
                mason: require(line, kind, "mason", row.mason)?,
                outcome,
                remarks: row.notes,
                edits: AccountEdits::default(),
            })
        }
        other => Err(CsvError::UnrecognizedType {
            line,
            kind: other.to_string(),
        }),
    }
}

/// Read commands from a csv file
pub fn read_commands(path: impl AsRef<Path>) -> impl Iterator<Item = Result<Command, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            parse_row(line, row)
        })
}

fn kyc_label(status: KycStatus) -> &'static str {
    match status {
        KycStatus::None => "none",
        KycStatus::Pending => "pending",
        KycStatus::Verified => "verified",
        KycStatus::Rejected => "rejected",
    }
}

/// Write mason statements to stdout in csv format, sorted by mason id
pub fn write_statements<'a>(masons: impl IntoIterator<Item = &'a MasonAccount>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    let mut accounts: Vec<&MasonAccount> = masons.into_iter().collect();
    accounts.sort_by_key(|a| a.mason);

    for account in accounts {
        let row = OutputRow {
            mason: account.mason,
            points: account.points.value(),
            bags: account.bags,
            kyc: kyc_label(account.kyc).to_string(),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
