//! `fleet event ...`

use super::Context;
use crate::args::EventAction;
use crate::policy::actions;
use colored::*;
use fleet_core::{Event, EventFilter};

pub fn run(ctx: &Context, action: EventAction) -> anyhow::Result<()> {
    match action {
        EventAction::Check {
            consumer,
            since_id,
            types,
            limit,
        } => {
            let scope = ctx.authorized_scope(actions::EVENT_CHECK)?;
            let filter = EventFilter {
                types,
                since_id,
                consumer,
                limit,
            };
            let events = scope.events().check(&filter)?;
            ctx.console.render(&events, |events| print_events(ctx, events))
        }
        EventAction::Tail { count } => {
            let scope = ctx.authorized_scope(actions::EVENT_CHECK)?;
            let events = scope.events().tail(count);
            ctx.console.render(&events, |events| print_events(ctx, events))
        }
    }
}

fn print_events(ctx: &Context, events: &[Event]) {
    if events.is_empty() {
        ctx.console.info("No new events");
        return;
    }
    for event in events {
        let payload = serde_json::to_string(&event.payload).unwrap_or_default();
        println!(
            "{:>6} {} {:<24} {}",
            event.id.to_string().dimmed(),
            event.ts.format("%Y-%m-%d %H:%M:%S"),
            event.event_type.bold(),
            payload.dimmed()
        );
    }
}
