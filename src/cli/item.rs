//! Lifecycle commands: harvest, process, ship, receive.

use crate::lifecycle::{Clock, Lifecycle};
use crate::model::{Address, ItemId};

use super::format::state_label;

pub(super) fn cmd_harvest(
    ledger: &Lifecycle<'_, impl Clock>,
    actor: Address,
    name: &str,
) -> Result<(), String> {
    let id = ledger.harvest(actor, name).map_err(|e| e.to_string())?;
    println!("{id}");
    Ok(())
}

pub(super) fn cmd_process(
    ledger: &Lifecycle<'_, impl Clock>,
    actor: Address,
    id: ItemId,
) -> Result<(), String> {
    ledger.process(actor, id).map_err(|e| e.to_string())?;
    report(ledger, id)
}

pub(super) fn cmd_ship(
    ledger: &Lifecycle<'_, impl Clock>,
    actor: Address,
    id: ItemId,
    recipient: Address,
) -> Result<(), String> {
    ledger
        .ship(actor, id, recipient)
        .map_err(|e| e.to_string())?;
    eprintln!("Item {id} now owned by {recipient}");
    report(ledger, id)
}

pub(super) fn cmd_receive(
    ledger: &Lifecycle<'_, impl Clock>,
    actor: Address,
    id: ItemId,
) -> Result<(), String> {
    ledger.receive(actor, id).map_err(|e| e.to_string())?;
    report(ledger, id)
}

/// Print the item's state after a successful command.
fn report(ledger: &Lifecycle<'_, impl Clock>, id: ItemId) -> Result<(), String> {
    let item = ledger.get(id).map_err(|e| e.to_string())?;
    println!("{}", state_label(item.current_state));
    Ok(())
}
