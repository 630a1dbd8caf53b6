//! Read-only queries: show, history, list, verify.

use crate::lifecycle::{Clock, LedgerError, Lifecycle};
use crate::model::ItemId;

use super::format::{format_item, format_item_line, format_record};

pub(super) fn cmd_show(
    ledger: &Lifecycle<'_, impl Clock>,
    id: ItemId,
    json: bool,
) -> Result<(), String> {
    let item = match ledger.get(id) {
        Ok(item) => item,
        Err(LedgerError::NotFound(_)) => return Err(format!("item {id} not found")),
        Err(e) => return Err(format!("failed to load item {id}: {e}")),
    };

    if json {
        println!("{}", to_json(&item)?);
    } else {
        println!("{}", format_item(&item));
    }
    Ok(())
}

pub(super) fn cmd_history(
    ledger: &Lifecycle<'_, impl Clock>,
    id: ItemId,
    json: bool,
) -> Result<(), String> {
    let history = ledger
        .history(id)
        .map_err(|e| format!("failed to load history of item {id}: {e}"))?;

    if json {
        println!("{}", to_json(&history)?);
        return Ok(());
    }
    if history.is_empty() {
        println!("No history");
        return Ok(());
    }
    for (position, record) in history.iter().enumerate() {
        println!("{}", format_record(position, record));
    }
    Ok(())
}

pub(super) fn cmd_list(ledger: &Lifecycle<'_, impl Clock>, json: bool) -> Result<(), String> {
    let items = ledger
        .list()
        .map_err(|e| format!("failed to list items: {e}"))?;

    if json {
        println!("{}", to_json(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No items");
        return Ok(());
    }
    for item in &items {
        println!("{}", format_item_line(item));
    }
    Ok(())
}

pub(super) fn cmd_verify(ledger: &Lifecycle<'_, impl Clock>, id: ItemId) -> Result<(), String> {
    let verified = ledger.verify(id).map_err(|e| e.to_string())?;
    if verified.records == 0 {
        return Err(format!("item {id} has no history"));
    }
    println!("ok {} record(s), head {}", verified.records, verified.head);
    Ok(())
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to serialize: {e}"))
}
