// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `tally record`: offline-first CRUD on local records.

use serde_json::Value;
use tally_core::{ClockSource, LocalStore, Record};

use crate::cli::{OutputFormat, RecordCommand};
use crate::error::{Error, Result};
use crate::services::EntityService;
use crate::sync::RemoteEndpoint;

use super::{open_engine, runtime};

pub fn run(command: RecordCommand) -> Result<()> {
    let (engine, config, _) = open_engine()?;
    print!("{}", runtime()?.block_on(run_impl(&engine, &config.api_url, command))?);
    Ok(())
}

/// Parse a JSON argument.
fn parse_body(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| Error::InvalidBody {
        reason: e.to_string(),
    })
}

fn to_pretty(record: &Record) -> Result<String> {
    Ok(format!("{}\n", serde_json::to_string_pretty(&record.to_json())?))
}

/// Internal implementation that accepts the engine for testing.
///
/// Only `Refresh` contacts the server; every other command is local.
pub(crate) async fn run_impl<S: LocalStore, R: RemoteEndpoint, C: ClockSource>(
    engine: &crate::sync::SyncEngine<S, R, C>,
    api_url: &str,
    command: RecordCommand,
) -> Result<String> {
    match command {
        RecordCommand::Add { entity, body } => {
            let record = EntityService::new(engine, entity, api_url).create(parse_body(&body)?)?;
            Ok(format!("Created {} {} (queued for sync)\n", entity, record.id))
        }
        RecordCommand::Update { entity, id, body } => {
            EntityService::new(engine, entity, api_url).update(&id, parse_body(&body)?)?;
            Ok(format!("Updated {} {} (queued for sync)\n", entity, id))
        }
        RecordCommand::Patch { entity, id, fields } => {
            let record =
                EntityService::new(engine, entity, api_url).patch(&id, parse_body(&fields)?)?;
            to_pretty(&record)
        }
        RecordCommand::Delete { entity, id } => {
            EntityService::new(engine, entity, api_url).delete(&id)?;
            Ok(format!("Deleted {} {} (queued for sync)\n", entity, id))
        }
        RecordCommand::Get { entity, id } => {
            let record = EntityService::new(engine, entity, api_url)
                .get(&id)?
                .ok_or_else(|| tally_core::Error::RecordNotFound {
                    collection: entity.collection().to_string(),
                    id: id.to_string(),
                })?;
            to_pretty(&record)
        }
        RecordCommand::List { entity, output } => {
            let records = EntityService::new(engine, entity, api_url).list()?;
            match output {
                OutputFormat::Json => {
                    let items: Vec<Value> = records.iter().map(Record::to_json).collect();
                    Ok(format!("{}\n", serde_json::to_string_pretty(&items)?))
                }
                OutputFormat::Text if records.is_empty() => {
                    Ok(format!("No {} stored locally.\n", entity.collection()))
                }
                OutputFormat::Text => Ok(records
                    .iter()
                    .map(|r| format!("{:<20} {}\n", r.id.to_string(), r.body))
                    .collect()),
            }
        }
        RecordCommand::Refresh { entity } => {
            let received = EntityService::new(engine, entity, api_url).refresh().await?;
            Ok(format!(
                "Refreshed {}: {} record(s) from server\n",
                entity.collection(),
                received
            ))
        }
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
