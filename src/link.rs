//! Transport-independent measurement seams.
//!
//! A [`Connector`] opens one [`Link`] per sweep step; the drivers in
//! [`crate::sweep`] only ever talk to these traits, never to a concrete
//! protocol.

use crate::channel::DuplexChannel;
use crate::error::Result;
use crate::flood;
use crate::payload::Payload;
use crate::trial::TrialKind;

/// Opens links to one measured endpoint.
#[allow(async_fn_in_trait)]
pub trait Connector {
    /// Link type produced by [`Connector::connect`].
    type Link: Link;

    /// Protocol label used in reports, e.g. `"TCP_TLS"`.
    fn protocol(&self) -> &str;

    /// Whether trials of this connector are raw or HTTP transfers.
    fn kind(&self) -> TrialKind;

    /// Establish a new link. Errors here abort the whole run.
    async fn connect(&self) -> Result<Self::Link>;
}

/// One established connection under measurement.
#[allow(async_fn_in_trait)]
pub trait Link {
    /// Best-effort first byte exchange; never fails.
    async fn probe(&mut self);

    /// Move `size` bytes of `payload` to the peer and wait for it to
    /// acknowledge them.
    async fn transfer(&mut self, payload: &Payload, size: usize) -> Result<()>;
}

/// A link that can carry several transfers at the same time.
pub trait MultiplexLink: Link {
    /// Like [`Link::transfer`], on a logical stream of its own.
    ///
    /// The returned future owns everything it touches so it can be
    /// spawned onto the runtime.
    fn transfer_shared(
        &self,
        payload: Payload,
        size: usize,
    ) -> impl Future<Output = Result<()>> + Send + 'static;
}

/// A [`Link`] over a single duplex channel; every transfer is a flood.
pub struct StreamLink<C> {
    channel: C,
}

impl<C: DuplexChannel> StreamLink<C> {
    /// Wrap an established channel.
    pub fn new(channel: C) -> Self {
        StreamLink { channel }
    }
}

impl<C: DuplexChannel> Link for StreamLink<C> {
    async fn probe(&mut self) {
        flood::first_byte(&mut self.channel).await;
    }

    async fn transfer(&mut self, payload: &Payload, size: usize) -> Result<()> {
        flood::flood(&mut self.channel, payload, size).await
    }
}
