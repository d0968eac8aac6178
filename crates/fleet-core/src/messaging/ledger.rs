//! Message ledger: idempotent send, broadcast, ack and mailbox fallback

use super::model::{
    ChannelType, DeliveryChannel, InboxEnvelope, MessageRow, MessageStatus, Priority,
};
use crate::error::{FleetError, FleetResult};
use crate::events::EventKind;
use crate::ids::validate_id;
use crate::paths::terminals;
use crate::tasks::TaskStatus;
use crate::team::{Member, MemberStatus, Team, TeamScope};
use chrono::{DateTime, Duration, Utc};
use fleet_store::StoreExt;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Input for [`MessageLedger::send`]
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub from: String,
    pub to: String,
    pub content: String,
    pub priority: Priority,
    pub ttl_secs: Option<u64>,
    /// Idempotency key; `M<epoch-millis>` when absent
    pub message_id: Option<String>,
    pub reply_to: Option<String>,
}

impl SendRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            content: content.into(),
            priority: Priority::Normal,
            ttl_secs: None,
            message_id: None,
            reply_to: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    /// The appended row, or the existing current state for a duplicate
    pub row: MessageRow,
    pub duplicate: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastOutcome {
    pub message_id: String,
    pub recipients: Vec<String>,
    pub delivered: usize,
    pub queued: usize,
    pub duplicates: usize,
}

/// Coincidence of stale messages, blocked tasks and idle members
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Escalation {
    pub stale_messages: usize,
    pub blocked_tasks: usize,
    pub idle_members: Vec<String>,
}

impl Escalation {
    pub fn is_triggered(&self) -> bool {
        self.stale_messages > 0 && self.blocked_tasks > 0 && !self.idle_members.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Delivery {
    pub status: MessageStatus,
    pub channel: DeliveryChannel,
    pub retry_count: u32,
}

/// Messaging operations of one team
pub struct MessageLedger<'a> {
    scope: &'a TeamScope<'a>,
}

impl<'a> MessageLedger<'a> {
    pub fn new(scope: &'a TeamScope<'a>) -> Self {
        Self { scope }
    }

    /// Every ledger row, oldest first
    pub fn rows(&self) -> Vec<MessageRow> {
        self.scope.store().read_jsonl(&self.scope.paths().messages())
    }

    /// Latest row per message id, in first-seen order
    pub fn current(&self) -> Vec<MessageRow> {
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, MessageRow> = HashMap::new();
        for row in self.rows() {
            if !latest.contains_key(&row.id) {
                order.push(row.id.clone());
            }
            latest.insert(row.id.clone(), row);
        }
        order
            .into_iter()
            .filter_map(|id| latest.remove(&id))
            .collect()
    }

    /// Current state of one id
    pub fn get(&self, message_id: &str) -> Option<MessageRow> {
        self.rows().into_iter().rev().find(|r| r.id == message_id)
    }

    /// Unacknowledged, unexpired messages, optionally for one recipient
    pub fn open_messages(&self, member_id: Option<&str>) -> Vec<MessageRow> {
        let now = self.scope.now();
        self.current()
            .into_iter()
            .filter(|r| r.is_open_at(now))
            .filter(|r| member_id.is_none_or(|m| r.to_member == m))
            .collect()
    }

    /// Open messages older than `threshold_secs`
    pub fn stale_messages(&self, threshold_secs: u64) -> Vec<MessageRow> {
        let cutoff = self.scope.now() - Duration::seconds(threshold_secs as i64);
        self.open_messages(None)
            .into_iter()
            .filter(|r| r.ts <= cutoff)
            .collect()
    }

    fn envelope(&self, row: &MessageRow) -> InboxEnvelope {
        InboxEnvelope {
            message_id: row.id.clone(),
            team_id: self.scope.id().to_string(),
            ts: row.ts,
            from_member: row.from_member.clone(),
            priority: row.priority,
            channel_type: row.channel_type,
            content: row.content.clone(),
            reply_to_message_id: row.reply_to_message_id.clone(),
        }
    }

    fn enqueue(&self, member_id: &str, envelope: &InboxEnvelope) -> FleetResult<()> {
        self.scope
            .store()
            .append_json(&self.scope.paths().mailbox(member_id), envelope)?;
        Ok(())
    }

    /// Inbox first with one retry, then the mailbox
    pub(crate) fn deliver(&self, recipient: &Member, envelope: &InboxEnvelope) -> FleetResult<Delivery> {
        if let Some(session_id) = recipient.session_id() {
            let key = terminals::inbox(session_id);
            for attempt in 0..2u32 {
                match self.scope.store().append_json(&key, envelope) {
                    Ok(()) => {
                        return Ok(Delivery {
                            status: MessageStatus::Delivered,
                            channel: DeliveryChannel::Inbox,
                            retry_count: attempt,
                        });
                    }
                    Err(e) => warn!(
                        "Inbox write for {} failed (attempt {}): {}",
                        recipient.member_id,
                        attempt + 1,
                        e
                    ),
                }
            }
            self.enqueue(&recipient.member_id, envelope)?;
            return Ok(Delivery {
                status: MessageStatus::Queued,
                channel: DeliveryChannel::MailboxFallback,
                retry_count: 2,
            });
        }

        self.enqueue(&recipient.member_id, envelope)?;
        Ok(Delivery {
            status: MessageStatus::Queued,
            channel: DeliveryChannel::Mailbox,
            retry_count: 0,
        })
    }

    fn unused_id(&self, rows: &[MessageRow]) -> String {
        let mut millis = self.scope.now().timestamp_millis();
        loop {
            let candidate = format!("M{}", millis);
            if !rows.iter().any(|r| r.id == candidate) {
                return candidate;
            }
            millis += 1;
        }
    }

    /// Send one message. A repeated id appends nothing and reports a duplicate.
    pub fn send(&self, request: SendRequest) -> FleetResult<SendOutcome> {
        validate_id("sender", &request.from)?;
        validate_id("recipient", &request.to)?;
        if let Some(id) = &request.message_id {
            validate_id("message id", id)?;
        }
        let team = self.scope.load_team()?;
        self.send_with_team(&team, request, ChannelType::P2p)
    }

    fn send_with_team(
        &self,
        team: &Team,
        request: SendRequest,
        channel_type: ChannelType,
    ) -> FleetResult<SendOutcome> {
        if team.member(&request.from).is_none() {
            return Err(FleetError::not_found("Member", &request.from));
        }
        let recipient = team
            .member(&request.to)
            .ok_or_else(|| FleetError::not_found("Member", &request.to))?;

        let rows = self.rows();
        if let Some(id) = &request.message_id {
            if let Some(existing) = rows.iter().rev().find(|r| &r.id == id) {
                debug!("Duplicate message {} suppressed", id);
                return Ok(SendOutcome {
                    row: existing.clone(),
                    duplicate: true,
                });
            }
        }

        let now = self.scope.now();
        let ttl = request
            .ttl_secs
            .unwrap_or(self.scope.fleet().config().message_ttl_secs);
        let mut row = MessageRow {
            id: request.message_id.clone().unwrap_or_else(|| self.unused_id(&rows)),
            ts: now,
            from_member: request.from.clone(),
            to_member: request.to.clone(),
            priority: request.priority,
            content: request.content,
            channel_type,
            status: MessageStatus::Queued,
            channel: None,
            retry_count: 0,
            expires_at: now + Duration::seconds(ttl as i64),
            delivered_at: None,
            acknowledged_at: None,
            acknowledged_by: None,
            reply_to_message_id: request.reply_to,
        };

        let delivery = self.deliver(recipient, &self.envelope(&row))?;
        row.status = delivery.status;
        row.channel = Some(delivery.channel);
        row.retry_count = delivery.retry_count;
        if delivery.status == MessageStatus::Delivered {
            row.delivered_at = Some(now);
        }
        self.scope
            .store()
            .append_json(&self.scope.paths().messages(), &row)?;

        let event = if delivery.status == MessageStatus::Delivered {
            EventKind::PeerMessageDelivered {
                message_id: row.id.clone(),
                from_member: row.from_member.clone(),
                to_member: row.to_member.clone(),
                channel: delivery.channel,
                retry_count: delivery.retry_count,
            }
        } else {
            EventKind::PeerMessageQueued {
                message_id: row.id.clone(),
                from_member: row.from_member.clone(),
                to_member: row.to_member.clone(),
                channel: delivery.channel,
                retry_count: delivery.retry_count,
            }
        };
        self.scope.emit(event)?;
        Ok(SendOutcome {
            row,
            duplicate: false,
        })
    }

    /// Fan out to every member except the sender, the lead (unless announcing) and `exclude`.
    ///
    /// Each recipient row has id `<base>-<recipient>` so retries stay idempotent.
    pub fn broadcast(
        &self,
        from: &str,
        content: &str,
        priority: Priority,
        exclude: &[String],
        message_id: Option<&str>,
        channel_type: ChannelType,
    ) -> FleetResult<BroadcastOutcome> {
        validate_id("sender", from)?;
        if let Some(id) = message_id {
            validate_id("message id", id)?;
        }
        let team = self.scope.load_team()?;
        if team.member(from).is_none() {
            return Err(FleetError::not_found("Member", from));
        }

        let base = message_id
            .map(str::to_string)
            .unwrap_or_else(|| self.unused_id(&self.rows()));
        let include_lead = channel_type == ChannelType::Announcement;
        let recipients: Vec<String> = team
            .members
            .iter()
            .filter(|m| m.member_id != from)
            .filter(|m| include_lead || !team.is_lead(&m.member_id))
            .filter(|m| !exclude.contains(&m.member_id))
            .map(|m| m.member_id.clone())
            .collect();

        let mut outcome = BroadcastOutcome {
            message_id: base.clone(),
            recipients: recipients.clone(),
            ..Default::default()
        };
        for recipient in recipients {
            let request = SendRequest {
                from: from.to_string(),
                to: recipient.clone(),
                content: content.to_string(),
                priority,
                ttl_secs: None,
                message_id: Some(format!("{}-{}", base, recipient)),
                reply_to: None,
            };
            let sent = self.send_with_team(&team, request, channel_type)?;
            if sent.duplicate {
                outcome.duplicates += 1;
            } else if sent.row.status == MessageStatus::Delivered {
                outcome.delivered += 1;
            } else {
                outcome.queued += 1;
            }
        }

        self.scope.emit(EventKind::BroadcastSent {
            message_id: base,
            from_member: from.to_string(),
            channel_type,
            delivered: outcome.delivered,
            queued: outcome.queued,
        })?;
        info!(
            "Broadcast from {}: {} delivered, {} queued",
            from, outcome.delivered, outcome.queued
        );
        Ok(outcome)
    }

    /// Broadcast to everyone including the lead
    pub fn announce(&self, from: &str, content: &str, priority: Priority) -> FleetResult<BroadcastOutcome> {
        self.broadcast(from, content, priority, &[], None, ChannelType::Announcement)
    }

    /// Append an `acknowledged` row; acknowledging twice appends nothing
    pub fn ack(&self, message_id: &str, member_id: &str) -> FleetResult<MessageRow> {
        validate_id("message id", message_id)?;
        validate_id("member id", member_id)?;
        let team = self.scope.load_team()?;
        if team.member(member_id).is_none() {
            return Err(FleetError::not_found("Member", member_id));
        }

        let latest = self
            .get(message_id)
            .ok_or_else(|| FleetError::not_found("Message", message_id))?;
        if latest.status == MessageStatus::Acknowledged {
            return Ok(latest);
        }

        let now = self.scope.now();
        let mut row = latest;
        row.ts = now;
        row.status = MessageStatus::Acknowledged;
        row.acknowledged_at = Some(now);
        row.acknowledged_by = Some(member_id.to_string());
        self.scope
            .store()
            .append_json(&self.scope.paths().messages(), &row)?;

        self.scope.emit(EventKind::PeerMessageAcknowledged {
            message_id: message_id.to_string(),
            member_id: member_id.to_string(),
        })?;
        Ok(row)
    }

    /// Queued mailbox entries of a member, optionally draining them
    pub fn inbox(&self, member_id: &str, clear: bool) -> FleetResult<Vec<InboxEnvelope>> {
        validate_id("member id", member_id)?;
        let key = self.scope.paths().mailbox(member_id);
        let items: Vec<InboxEnvelope> = self.scope.store().read_jsonl(&key);
        if clear {
            self.scope.store().remove(&key)?;
        }
        Ok(items)
    }

    /// Move the mailbox backlog into a freshly attached session inbox
    pub fn flush_mailbox(&self, member_id: &str, session_id: &str) -> FleetResult<usize> {
        let store = self.scope.store();
        let key = self.scope.paths().mailbox(member_id);
        let items: Vec<InboxEnvelope> = store.read_jsonl(&key);
        if items.is_empty() {
            return Ok(0);
        }

        let inbox = terminals::inbox(session_id);
        for (i, item) in items.iter().enumerate() {
            if let Err(e) = store.append_json(&inbox, item) {
                warn!("Mailbox flush for {} stopped: {}", member_id, e);
                let rest: Vec<String> = items[i..]
                    .iter()
                    .filter_map(|it| serde_json::to_string(it).ok())
                    .collect();
                store.rewrite_lines(&key, &rest)?;
                return Ok(i);
            }
        }
        store.remove(&key)?;
        debug!("Flushed {} mailbox entries for {}", items.len(), member_id);
        Ok(items.len())
    }

    /// Deliver a runtime notice (interrupts, resume directives) to a member
    pub(crate) fn notify(
        &self,
        recipient: &Member,
        content: &str,
        priority: Priority,
    ) -> FleetResult<Delivery> {
        let envelope = InboxEnvelope {
            message_id: format!("N{}", self.scope.now().timestamp_millis()),
            team_id: self.scope.id().to_string(),
            ts: self.scope.now(),
            from_member: "runtime".to_string(),
            priority,
            channel_type: ChannelType::P2p,
            content: content.to_string(),
            reply_to_message_id: None,
        };
        self.deliver(recipient, &envelope)
    }

    /// Measure the escalation condition without emitting anything
    pub fn escalation(&self) -> FleetResult<Escalation> {
        let config = self.scope.fleet().config();
        let team = self.scope.load_team()?;
        let now = self.scope.now();

        let stale_messages = self.stale_messages(config.stale_message_secs).len();
        let blocked_tasks = self
            .scope
            .tasks()
            .list(Some(TaskStatus::Blocked), None)
            .len();
        let idle_members = idle_members(&team, now, config.idle_threshold_secs);

        Ok(Escalation {
            stale_messages,
            blocked_tasks,
            idle_members,
        })
    }

    /// Raise `CoordinationEscalated` for the lead when the condition holds,
    /// at most once per idle cooldown
    pub fn check_escalation(&self) -> FleetResult<Option<Escalation>> {
        let escalation = self.escalation()?;
        if !escalation.is_triggered() {
            return Ok(None);
        }

        let now = self.scope.now();
        let cooldown = Duration::seconds(self.scope.fleet().config().idle_cooldown_secs as i64);
        let fire = self.scope.update_runtime(|runtime| {
            let due = runtime
                .last_escalation_at
                .is_none_or(|last| now - last >= cooldown);
            if due {
                runtime.last_escalation_at = Some(now);
            }
            Ok(due)
        })?;
        if !fire {
            return Ok(None);
        }

        let team = self.scope.load_team()?;
        self.scope.emit(EventKind::CoordinationEscalated {
            to_member: team.lead_member_id.clone(),
            stale_messages: escalation.stale_messages,
            blocked_tasks: escalation.blocked_tasks,
            idle_members: escalation.idle_members.clone(),
        })?;
        info!("Escalated coordination stall to {}", team.lead_member_id);
        Ok(Some(escalation))
    }
}

/// Teammates that are idle, or live but silent past the threshold
pub(crate) fn idle_members(team: &Team, now: DateTime<Utc>, threshold_secs: u64) -> Vec<String> {
    let threshold = Duration::seconds(threshold_secs as i64);
    team.teammates()
        .filter(|m| match m.status {
            MemberStatus::Idle => true,
            MemberStatus::Active | MemberStatus::Starting => {
                let seen = m.last_seen.unwrap_or(m.joined_at);
                now - seen >= threshold
            }
            _ => false,
        })
        .map(|m| m.member_id.clone())
        .collect()
}
