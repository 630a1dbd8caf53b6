//! Output formatting for CLI display.

use jiff::tz::TimeZone;

use crate::model::{Item, State, TrackingRecord};

/// Human-readable label for a lifecycle state.
pub(super) fn state_label(state: State) -> &'static str {
    match state {
        State::Harvested => "Harvested",
        State::Processed => "Processed",
        State::Shipped => "Shipped",
        State::Received => "Received",
    }
}

/// The command that moves an item out of `state`, if any.
pub(super) fn next_step(state: State) -> Option<&'static str> {
    state.next().map(|next| match next {
        State::Harvested => "harvest",
        State::Processed => "process",
        State::Shipped => "ship",
        State::Received => "receive",
    })
}

/// Multi-line item summary.
pub(super) fn format_item(item: &Item) -> String {
    let mut out = format!(
        "ID:    {}\nName:  {}\nOwner: {}\nState: {}",
        item.id,
        item.name,
        item.owner,
        state_label(item.current_state)
    );
    if let Some(step) = next_step(item.current_state) {
        out.push_str(&format!("\nNext:  {step}"));
    }
    out
}

/// One-line item summary for listings.
pub(super) fn format_item_line(item: &Item) -> String {
    format!(
        "{:>4}  [{:<9}]  {}  {}",
        item.id,
        state_label(item.current_state),
        item.owner,
        item.name
    )
}

/// One-line record summary, timestamp in UTC. Shipping records name the recipient.
pub(super) fn format_record(position: usize, record: &TrackingRecord) -> String {
    let at = record.timestamp.to_zoned(TimeZone::UTC);
    let mut line = format!(
        "{:>2}. {:<9}  {}  by {}",
        position + 1,
        state_label(record.state),
        at.strftime("%Y-%m-%dT%H:%M:%SZ"),
        record.actor
    );
    if record.state == State::Shipped {
        line.push_str(&format!(" to {}", record.owner));
    }
    line
}
