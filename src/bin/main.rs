// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, bail};
use carpool_ledger::registry::PASSENGER_SEPARATOR;
use carpool_ledger::{
    Debt, FileStore, Ledger, Participant, RemovalPolicy, Session, SessionConfig, SnapshotStore,
    Trip,
};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use csv::{ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Carpool ledger - who owes whom a ride, and who should drive next
///
/// State lives in a JSON snapshot file. Balances and history are written to
/// stdout as CSV; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "carpool", version)]
#[command(about = "Track carpool ride debts and suggest the next driver", long_about = None)]
struct Cli {
    /// Path to the JSON snapshot holding participants, debts and history
    #[arg(long, env = "CARPOOL_STATE", default_value = "carpool.json", global = true)]
    state: PathBuf,

    /// What happens to a removed participant's debts (forgive or archive)
    #[arg(long, env = "CARPOOL_REMOVAL_POLICY", default_value_t = RemovalPolicy::Forgive, global = true)]
    removal_policy: RemovalPolicy,

    /// Identity recorded on confirmed and edited trips
    #[arg(long, env = "CARPOOL_ACTOR", global = true)]
    actor: Option<String>,

    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a participant
    Add { name: String },
    /// Remove a participant and settle their debts per the removal policy
    Remove {
        name: String,
        /// Confirm the removal
        #[arg(long)]
        yes: bool,
    },
    /// Rename a participant everywhere, history included
    Rename { old: String, new: String },
    /// List participants in display order
    List,
    /// Suggest today's driver
    Suggest {
        #[arg(required = true, num_args = 2..)]
        passengers: Vec<String>,
    },
    /// Record today's trip with the suggested or given driver
    Confirm {
        #[arg(required = true, num_args = 2..)]
        passengers: Vec<String>,
        /// Override the suggested driver
        #[arg(short, long)]
        driver: Option<String>,
    },
    /// Change the driver of a recent trip (0 = most recent)
    Edit { index: usize, driver: String },
    /// Signed balance between two participants (positive: first owes second)
    Balance { a: String, b: String },
    /// Write every outstanding debt as CSV
    Balances,
    /// Write the trip history as CSV, newest first
    History,
    /// Forget every balance and trip, keeping participants
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Replay a trip CSV (date,driver,passengers) and write the resulting balances
    ///
    /// Expected format: date,driver,passengers with passengers separated by ';'
    /// Example: carpool replay trips.csv > balances.csv
    Replay {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::Replay { input } = &cli.command {
        let file = File::open(input)
            .with_context(|| format!("opening trip file '{}'", input.display()))?;
        let ledger = replay_trips(BufReader::new(file)).context("reading trip CSV")?;
        write_debts(&ledger.debts(), std::io::stdout()).context("writing balances")?;
        return Ok(());
    }

    let store = FileStore::new(&cli.state);
    let config = SessionConfig::default().with_removal_policy(cli.removal_policy);
    let (mut session, revision) = match store.load()? {
        Some(stored) => (
            Session::from_snapshot(stored.snapshot, config)
                .with_context(|| format!("loading '{}'", cli.state.display()))?,
            stored.revision,
        ),
        None => (Session::new(config), 0),
    };
    session.set_actor(cli.actor.clone());

    if run(&mut session, cli.command, &mut std::io::stdout())? {
        let saved = store.save(&session.snapshot(), Some(revision))?;
        debug!(revision = saved, "state saved");
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

/// Runs one command against the session. Returns whether state changed.
fn run<W: Write>(session: &mut Session, command: Command, out: &mut W) -> anyhow::Result<bool> {
    match command {
        Command::Add { name } => {
            let participant = session.add_participant(&name)?;
            writeln!(out, "Added {participant}")?;
            Ok(true)
        }
        Command::Remove { name, yes } => {
            if !yes {
                bail!("removing '{name}' affects their debts; pass --yes to confirm");
            }
            let dropped = session.remove_participant(&name)?;
            writeln!(
                out,
                "Removed {} ({} debt(s) {})",
                name.trim(),
                dropped.len(),
                match session.config().removal_policy {
                    RemovalPolicy::Forgive => "forgiven",
                    RemovalPolicy::Archive => "archived",
                }
            )?;
            Ok(true)
        }
        Command::Rename { old, new } => {
            let renamed = session.rename_participant(&old, &new)?;
            writeln!(out, "Renamed {} to {renamed}", old.trim())?;
            Ok(true)
        }
        Command::List => {
            for participant in session.participants().iter() {
                writeln!(out, "{participant}")?;
            }
            Ok(false)
        }
        Command::Suggest { passengers } => {
            session.set_today(&passengers)?;
            let Some(driver) = session.suggest_driver() else {
                bail!("at least two passengers are needed for a suggestion");
            };
            writeln!(out, "Suggested driver: {driver}")?;
            for (passenger, rides) in session.driver_debts(&driver) {
                writeln!(out, "  {driver} -> {passenger}: {rides} ride(s)")?;
            }
            Ok(false)
        }
        Command::Confirm { passengers, driver } => {
            session.set_today(&passengers)?;
            let trip = session.confirm_trip(driver.as_deref())?;
            writeln!(
                out,
                "Recorded trip: {} drove {}",
                trip.driver,
                join(trip.riders())
            )?;
            Ok(true)
        }
        Command::Edit { index, driver } => {
            let trip = session.edit_trip(index, &driver)?;
            writeln!(out, "Trip #{index} now driven by {}", trip.driver)?;
            Ok(true)
        }
        Command::Balance { a, b } => {
            writeln!(out, "{}", session.net_balance(&a, &b)?)?;
            Ok(false)
        }
        Command::Balances => {
            write_debts(&session.debts(), out)?;
            Ok(false)
        }
        Command::History => {
            write_history(session.history().iter(), out)?;
            Ok(false)
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("reset forgets every balance and trip; pass --yes to confirm");
            }
            session.reset_all();
            writeln!(out, "Ledger and history reset")?;
            Ok(true)
        }
        Command::Replay { .. } => bail!("replay does not operate on saved state"),
    }
}

fn join<'a>(names: impl Iterator<Item = &'a Participant>) -> String {
    names.map(Participant::as_str).collect::<Vec<_>>().join(", ")
}

/// One row of a trip CSV.
///
/// Fields: `date, driver, passengers`
#[derive(Debug, Serialize, Deserialize)]
struct TripRow {
    #[serde(default)]
    date: String,
    driver: String,
    /// Passenger names separated by `;`, driver included.
    passengers: String,
}

impl TripRow {
    fn from_trip(trip: &Trip) -> Self {
        Self {
            date: trip.date.to_rfc3339(),
            driver: trip.driver.to_string(),
            passengers: trip
                .passengers
                .iter()
                .map(Participant::as_str)
                .collect::<Vec<_>>()
                .join(PASSENGER_SEPARATOR),
        }
    }

    /// Converts a CSV row into a trip.
    ///
    /// Returns `None` for an unparseable date or an empty driver. A missing
    /// date means "now".
    fn into_trip(self) -> Option<Trip> {
        let date = parse_date(&self.date)?;
        let driver = self.driver.trim();
        if driver.is_empty() {
            return None;
        }
        let passengers = self
            .passengers
            .split(PASSENGER_SEPARATOR)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Participant::from)
            .collect();
        Some(Trip::at(date, Participant::from(driver), passengers))
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(Utc::now());
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

/// Replays trips from a CSV reader into a fresh ledger.
///
/// Rows are applied in file order, oldest first. Malformed rows and trips
/// that break the trip contract are skipped and logged.
///
/// # CSV Format
///
/// ```csv
/// date,driver,passengers
/// 2025-03-01,Ana,Ana;Luis
/// 2025-03-02,Luis,Ana;Luis;Eva
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails.
fn replay_trips<R: Read>(reader: R) -> Result<Ledger, csv::Error> {
    let mut ledger = Ledger::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (line, result) in rdr.deserialize::<TripRow>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(row = line + 1, error = %e, "skipping malformed row");
                continue;
            }
        };
        let Some(trip) = record.into_trip() else {
            warn!(row = line + 1, "skipping row with invalid date or driver");
            continue;
        };
        if let Err(e) = ledger.apply(&trip) {
            warn!(row = line + 1, error = %e, "skipping trip");
        }
    }

    Ok(ledger)
}

/// Writes debts as CSV.
///
/// # CSV Format
///
/// ```csv
/// debtor,creditor,rides
/// Eva,Ana,2
/// Luis,Ana,1
/// ```
fn write_debts<W: Write>(debts: &[Debt], writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    if debts.is_empty() {
        wtr.write_record(["debtor", "creditor", "rides"])?;
    }
    for debt in debts {
        wtr.serialize(debt)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes trips as CSV in the same shape [`replay_trips`] reads.
fn write_history<'a, W: Write>(
    trips: impl Iterator<Item = &'a Trip>,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    let mut empty = true;
    for trip in trips {
        wtr.serialize(TripRow::from_trip(trip))?;
        empty = false;
    }
    if empty {
        wtr.write_record(["date", "driver", "passengers"])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn p(name: &str) -> Participant {
        Participant::from(name)
    }

    fn session(names: &[&str]) -> Session {
        let mut session = Session::default();
        for name in names {
            session.add_participant(name).unwrap();
        }
        session
    }

    fn run_to_string(session: &mut Session, args: &[&str]) -> anyhow::Result<(bool, String)> {
        let cli = Cli::try_parse_from(
            ["carpool", "--state", "unused.json"].iter().chain(args.iter()),
        )?;
        let mut out = Vec::new();
        let changed = run(session, cli.command, &mut out)?;
        Ok((changed, String::from_utf8(out)?))
    }

    #[test]
    fn replay_simple_trip() {
        let csv = "date,driver,passengers\n2025-03-01,Ana,Ana;Luis\n";
        let ledger = replay_trips(Cursor::new(csv)).unwrap();

        assert_eq!(ledger.balance_of(&p("Luis"), &p("Ana")), 1);
    }

    #[test]
    fn replay_nets_opposing_trips() {
        let csv = "date,driver,passengers\n\
                   2025-03-01,Ana,Ana;Luis\n\
                   2025-03-02,Luis,Ana;Luis\n";
        let ledger = replay_trips(Cursor::new(csv)).unwrap();

        assert!(ledger.is_empty());
    }

    #[test]
    fn replay_with_whitespace() {
        let csv = "date,driver,passengers\n 2025-03-01 , Ana , Ana ; Luis \n";
        let ledger = replay_trips(Cursor::new(csv)).unwrap();

        assert_eq!(ledger.balance_of(&p("Luis"), &p("Ana")), 1);
    }

    #[test]
    fn replay_skips_invalid_rows() {
        let csv = "date,driver,passengers\n\
                   2025-03-01,Ana,Ana;Luis\n\
                   not-a-date,Ana,Ana;Luis\n\
                   2025-03-02,Eva,Ana;Luis\n\
                   2025-03-03,Ana,Ana\n\
                   2025-03-04,Ana,Ana;Eva\n";
        let ledger = replay_trips(Cursor::new(csv)).unwrap();

        assert_eq!(ledger.balance_of(&p("Luis"), &p("Ana")), 1);
        assert_eq!(ledger.balance_of(&p("Eva"), &p("Ana")), 1);
        assert_eq!(ledger.debts().len(), 2);
    }

    #[test]
    fn replay_accepts_rfc3339_and_missing_dates() {
        let csv = "date,driver,passengers\n\
                   2025-03-01T08:30:00+01:00,Ana,Ana;Luis\n\
                   ,Ana,Ana;Luis\n";
        let ledger = replay_trips(Cursor::new(csv)).unwrap();

        assert_eq!(ledger.balance_of(&p("Luis"), &p("Ana")), 2);
    }

    #[test]
    fn write_debts_to_csv() {
        let csv = "date,driver,passengers\n2025-03-01,Ana,Ana;Luis;Eva\n";
        let ledger = replay_trips(Cursor::new(csv)).unwrap();

        let mut output = Vec::new();
        write_debts(&ledger.debts(), &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(output, "debtor,creditor,rides\nEva,Ana,1\nLuis,Ana,1\n");
    }

    #[test]
    fn write_debts_empty_still_has_header() {
        let mut output = Vec::new();
        write_debts(&[], &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "debtor,creditor,rides\n");
    }

    #[test]
    fn history_csv_replays_to_the_same_ledger() {
        let mut session = session(&["Ana", "Luis", "Eva"]);
        session.set_today(["Ana", "Luis", "Eva"]).unwrap();
        session.confirm_trip(Some("Ana")).unwrap();
        session.set_today(["Luis", "Eva"]).unwrap();
        session.confirm_trip(Some("Eva")).unwrap();

        let mut output = Vec::new();
        // History is newest first; replay expects oldest first.
        write_history(session.history().iter().rev(), &mut output).unwrap();
        let ledger = replay_trips(Cursor::new(output)).unwrap();

        assert_eq!(&ledger, session.ledger());
    }

    #[test]
    fn suggest_prints_driver_debts() {
        let mut session = session(&["Ana", "Luis", "Eva"]);
        session.set_today(["Ana", "Luis"]).unwrap();
        session.confirm_trip(Some("Ana")).unwrap();

        let (changed, output) =
            run_to_string(&mut session, &["suggest", "Ana", "Luis", "Eva"]).unwrap();

        assert!(!changed);
        assert_eq!(
            output,
            "Suggested driver: Luis\n  Luis -> Ana: 1 ride(s)\n  Luis -> Eva: 0 ride(s)\n"
        );
    }

    #[test]
    fn confirm_records_and_reports_changes() {
        let mut session = session(&["Ana", "Luis"]);

        let (changed, output) =
            run_to_string(&mut session, &["confirm", "Ana", "Luis", "--driver", "Luis"]).unwrap();

        assert!(changed);
        assert_eq!(output, "Recorded trip: Luis drove Ana\n");
        assert_eq!(session.balance_of("Ana", "Luis").unwrap(), 1);
    }

    #[test]
    fn remove_requires_confirmation() {
        let mut session = session(&["Ana", "Luis"]);

        assert!(run_to_string(&mut session, &["remove", "Luis"]).is_err());
        assert_eq!(session.participants().len(), 2);

        let (changed, _) = run_to_string(&mut session, &["remove", "Luis", "--yes"]).unwrap();
        assert!(changed);
        assert_eq!(session.participants().len(), 1);
    }

    #[test]
    fn reset_requires_confirmation() {
        let mut session = session(&["Ana", "Luis"]);
        session.set_today(["Ana", "Luis"]).unwrap();
        session.confirm_trip(None).unwrap();

        assert!(run_to_string(&mut session, &["reset"]).is_err());
        assert_eq!(session.history().len(), 1);

        run_to_string(&mut session, &["reset", "--yes"]).unwrap();
        assert!(session.history().is_empty());
        assert!(session.ledger().is_empty());
    }

    #[test]
    fn history_csv_keeps_names_with_commas() {
        let mut session = session(&["Ana, Jr.", "Luis"]);
        session.set_today(["Ana, Jr.", "Luis"]).unwrap();
        session.confirm_trip(Some("Ana, Jr.")).unwrap();

        let mut output = Vec::new();
        write_history(session.history().iter(), &mut output).unwrap();
        let ledger = replay_trips(Cursor::new(output)).unwrap();

        assert_eq!(ledger.balance_of(&p("Luis"), &p("Ana, Jr.")), 1);
    }

    #[test]
    fn add_rejects_the_passenger_separator() {
        let mut session = session(&[]);

        let err = run_to_string(&mut session, &["add", "Ana;Luis"]).unwrap_err();

        assert_eq!(err.to_string(), "participant name 'Ana;Luis' must not contain ';'");
        assert!(session.participants().is_empty());
    }

    #[test]
    fn removal_policy_flag_parses() {
        let cli = Cli::try_parse_from(["carpool", "--removal-policy", "archive", "list"]).unwrap();
        assert_eq!(cli.removal_policy, RemovalPolicy::Archive);
    }
}
