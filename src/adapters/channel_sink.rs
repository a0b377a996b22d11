//! Bounded cross-core message queue.
//!
//! The control core pushes into a static [`MessageChannel`] through a
//! [`ChannelSink`]; the services core drains it and hands each message to
//! the transport. A full queue drops the new message instead of blocking
//! the control loop.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::events::OutboundMessage;
use crate::app::ports::MessageSink;

/// Queue depth between the cores.
pub const MESSAGE_QUEUE_DEPTH: usize = 16;

pub type MessageChannel = Channel<CriticalSectionRawMutex, OutboundMessage, MESSAGE_QUEUE_DEPTH>;

/// Non-blocking producer handle onto a [`MessageChannel`].
#[derive(Clone, Copy)]
pub struct ChannelSink<'c> {
    channel: &'c MessageChannel,
}

impl<'c> ChannelSink<'c> {
    pub fn new(channel: &'c MessageChannel) -> Self {
        Self { channel }
    }

    /// Next queued message, if any (consumer side).
    pub fn try_take(&self) -> Option<OutboundMessage> {
        self.channel.try_receive().ok()
    }
}

impl MessageSink for ChannelSink<'_> {
    fn enqueue(&mut self, msg: OutboundMessage) -> bool {
        self.channel.try_send(msg).is_ok()
    }

    fn pending(&self) -> usize {
        self.channel.len()
    }
}
