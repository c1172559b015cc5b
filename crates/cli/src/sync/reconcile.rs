// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Swap a temporary record for the server's copy after a creation replays.

use serde_json::Value;
use tally_core::{EntityKind, LocalStore, Record, RecordId, Result, TempId};

/// What reconciliation did to the local collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// The temporary record was replaced by the permanent one.
    Replaced { permanent: RecordId },
    /// The temporary record was already gone (deleted while in flight).
    Vanished,
    /// The response carried no usable id; the temporary record is kept.
    Unidentified { reason: String },
}

/// Replace the temporary record `temp` with the server's `response`.
///
/// The temporary record is deleted before the permanent one is written. If a
/// record with the permanent id already exists it is overwritten. A
/// temporary record that no longer exists is not resurrected.
///
/// The swap runs in one transaction: on error the temporary record is
/// still in place and no permanent record was written.
pub fn reconcile<S: LocalStore>(
    store: &mut S,
    entity: EntityKind,
    temp: TempId,
    response: Value,
) -> Result<Reconciled> {
    let temp_id = RecordId::Temporary(temp);
    if store.get_record(entity, &temp_id)?.is_none() {
        tracing::debug!(%entity, %temp, "temporary record gone; nothing to reconcile");
        return Ok(Reconciled::Vanished);
    }

    let record = match Record::from_server(response) {
        Ok(record) => record,
        Err(e) => return Ok(Reconciled::Unidentified { reason: e.to_string() }),
    };
    let permanent = record.id.clone();

    store.transaction(|s| {
        s.delete_record(entity, &temp_id)?;
        if s.get_record(entity, &permanent)?.is_some() {
            s.update_record(entity, &record)
        } else {
            s.add_record(entity, &record)
        }
    })?;

    tracing::debug!(%entity, %temp, %permanent, "reconciled temporary record");
    Ok(Reconciled::Replaced { permanent })
}
