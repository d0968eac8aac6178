//! Peer-to-peer and broadcast messaging with delivery-channel fallback

mod ledger;
mod model;

pub(crate) use ledger::idle_members;
pub use ledger::{BroadcastOutcome, Escalation, MessageLedger, SendOutcome, SendRequest};
pub use model::{
    ChannelType, DeliveryChannel, InboxEnvelope, MessageRow, MessageStatus, Priority,
};
