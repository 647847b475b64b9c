//! The open-air leg between a subscriber and the serving network.
//!
//! Frames are unauthenticated bytes: anyone on the path may read, drop or
//! rewrite them, so every received frame is parsed into its typed form before
//! a role engine sees it.

use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use tokio::sync::mpsc;

use crate::types::error::{AkaError, AkaResult};
use crate::types::messages::{DownlinkChallenge, UplinkMessage};
use crate::types::wire;

const AIR_CAPACITY: usize = 16;

pub struct AirPort<Out, In> {
    tx: mpsc::Sender<Vec<u8>>,
    rx: mpsc::Receiver<Vec<u8>>,
    _direction: PhantomData<fn(Out) -> In>,
}

pub type UePort = AirPort<UplinkMessage, DownlinkChallenge>;
pub type SeafPort = AirPort<DownlinkChallenge, UplinkMessage>;

impl<Out: Serialize, In: DeserializeOwned> AirPort<Out, In> {
    pub async fn send(&self, message: &Out) -> AkaResult<()> {
        self.send_frame(wire::encode(message)?).await
    }

    pub async fn receive(&mut self) -> AkaResult<In> {
        let frame = self.receive_frame().await?;
        wire::decode(&frame)
    }

    pub async fn send_frame(&self, frame: Vec<u8>) -> AkaResult<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| AkaError::ChannelUnavailable("air interface closed".to_string()))
    }

    pub async fn receive_frame(&mut self) -> AkaResult<Vec<u8>> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| AkaError::ChannelUnavailable("air interface closed".to_string()))
    }
}

/// One radio attempt: the subscriber's port and the serving network's port.
pub fn air_link() -> (UePort, SeafPort) {
    let (up_tx, up_rx) = mpsc::channel(AIR_CAPACITY);
    let (down_tx, down_rx) = mpsc::channel(AIR_CAPACITY);
    (
        AirPort {
            tx: up_tx,
            rx: down_rx,
            _direction: PhantomData,
        },
        AirPort {
            tx: down_tx,
            rx: up_rx,
            _direction: PhantomData,
        },
    )
}
