//! `fleet message ...`

use super::Context;
use crate::args::MessageAction;
use colored::*;
use fleet_core::SendRequest;
use fleet_core::messaging::{BroadcastOutcome, ChannelType};

pub fn run(ctx: &Context, action: MessageAction) -> anyhow::Result<()> {
    match action {
        MessageAction::Send {
            from,
            to,
            content,
            priority,
            id,
            ttl,
            reply_to,
        } => {
            let scope = ctx.authorized_scope("message.send")?;
            let mut request = SendRequest::new(from, to, content).with_priority(priority);
            request.message_id = id;
            request.ttl_secs = ttl;
            request.reply_to = reply_to;

            let outcome = scope.messages().send(request)?;
            ctx.console.render(&outcome, |o| {
                if o.duplicate {
                    ctx.console
                        .warn(&format!("Duplicate {} suppressed", o.row.id));
                } else {
                    let channel = o
                        .row
                        .channel
                        .map(|c| format!("{:?}", c))
                        .unwrap_or_else(|| "-".to_string());
                    ctx.console.success(&format!(
                        "Message {} to {} is {} ({})",
                        o.row.id, o.row.to_member, o.row.status, channel
                    ));
                }
            })
        }
        MessageAction::Broadcast {
            from,
            content,
            priority,
            exclude,
            id,
        } => {
            let scope = ctx.authorized_scope("message.broadcast")?;
            let outcome = scope.messages().broadcast(
                &from,
                &content,
                priority,
                &exclude,
                id.as_deref(),
                ChannelType::Broadcast,
            )?;
            ctx.console.render(&outcome, |o| print_broadcast(ctx, o))
        }
        MessageAction::Announce {
            from,
            content,
            priority,
        } => {
            let scope = ctx.authorized_scope("message.broadcast")?;
            let outcome = scope.messages().announce(&from, &content, priority)?;
            ctx.console.render(&outcome, |o| print_broadcast(ctx, o))
        }
        MessageAction::Inbox { member, clear } => {
            let scope = ctx.authorized_scope("message.inbox")?;
            let envelopes = scope.messages().inbox(&member, clear)?;
            ctx.console.render(&envelopes, |envelopes| {
                if envelopes.is_empty() {
                    ctx.console.info(&format!("No queued messages for {}", member));
                    return;
                }
                ctx.console.print_header(&format!("Inbox of {}", member));
                for envelope in envelopes {
                    println!(
                        "  {} {} {} [{}]",
                        envelope.ts.format("%H:%M:%S").to_string().dimmed(),
                        envelope.message_id.bold(),
                        envelope.from_member,
                        envelope.priority
                    );
                    println!("    {}", envelope.content);
                }
            })
        }
        MessageAction::Ack { message_id, member } => {
            let scope = ctx.authorized_scope("message.ack")?;
            let row = scope.messages().ack(&message_id, &member)?;
            ctx.console.render(&row, |r| {
                ctx.console
                    .success(&format!("{} acknowledged by {}", r.id, member));
            })
        }
    }
}

fn print_broadcast(ctx: &Context, outcome: &BroadcastOutcome) {
    ctx.console.success(&format!(
        "Sent {} to {} recipients",
        outcome.message_id,
        outcome.recipients.len()
    ));
    ctx.console.field("delivered", outcome.delivered);
    ctx.console.field("queued", outcome.queued);
    if outcome.duplicates > 0 {
        ctx.console.field("duplicates", outcome.duplicates);
    }
}
