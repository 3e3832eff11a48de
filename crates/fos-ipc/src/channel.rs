//! IPC Channel
//!
//! Bidirectional channel between two processes. Each direction is a FIFO
//! queue of checksummed frames, so delivery is lossless and ordered per
//! channel. Sending never blocks, which lets native accessibility threads
//! post requests without waiting on the content process.

use std::sync::Arc;

use smol::channel::{self, Receiver, Sender, TryRecvError};

use crate::{IpcError, IpcSerialize, MessageFrame, TypedMessage};

/// IPC channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Connected and ready
    Connected,
    /// Peer went away or channel closed
    Disconnected,
}

/// Channel factory
pub struct IpcChannel;

impl IpcChannel {
    /// Create a connected pair of endpoints
    pub fn pair(name: &str) -> (IpcEndpoint, IpcEndpoint) {
        let (a_tx, a_rx) = channel::unbounded();
        let (b_tx, b_rx) = channel::unbounded();
        let name: Arc<str> = Arc::from(name);
        let a = IpcEndpoint {
            sender: IpcSender { name: name.clone(), tx: a_tx },
            receiver: b_rx,
        };
        let b = IpcEndpoint {
            sender: IpcSender { name, tx: b_tx },
            receiver: a_rx,
        };
        (a, b)
    }
}

/// Sending half; cheap to clone and usable from any thread
#[derive(Debug, Clone)]
pub struct IpcSender {
    name: Arc<str>,
    tx: Sender<Vec<u8>>,
}

impl IpcSender {
    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a message (non-blocking)
    pub fn send(&self, msg: &TypedMessage) -> Result<(), IpcError> {
        let frame = MessageFrame::new(msg.to_ipc_bytes());
        self.tx
            .try_send(frame.to_bytes())
            .map_err(|_| IpcError::Disconnected(self.name.to_string()))
    }

    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// One end of an IPC channel
#[derive(Debug)]
pub struct IpcEndpoint {
    sender: IpcSender,
    receiver: Receiver<Vec<u8>>,
}

impl IpcEndpoint {
    /// Channel name
    pub fn name(&self) -> &str {
        self.sender.name()
    }

    /// Get current state
    pub fn state(&self) -> ChannelState {
        if self.sender.is_connected() && !self.receiver.is_closed() {
            ChannelState::Connected
        } else {
            ChannelState::Disconnected
        }
    }

    /// Is connected?
    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Clone of the sending half
    pub fn sender(&self) -> IpcSender {
        self.sender.clone()
    }

    /// Send a message (non-blocking)
    pub fn send(&self, msg: &TypedMessage) -> Result<(), IpcError> {
        self.sender.send(msg)
    }

    /// Receive the next message if one is queued (non-blocking)
    pub fn try_recv(&self) -> Result<Option<TypedMessage>, IpcError> {
        match self.receiver.try_recv() {
            Ok(bytes) => decode(&bytes).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(IpcError::Disconnected(self.name().to_string())),
        }
    }

    /// Wait for the next message
    pub async fn recv(&self) -> Result<TypedMessage, IpcError> {
        let bytes = self
            .receiver
            .recv()
            .await
            .map_err(|_| IpcError::Disconnected(self.name().to_string()))?;
        decode(&bytes)
    }

    /// Number of frames waiting to be read
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Close both directions
    pub fn close(&self) {
        self.sender.tx.close();
        self.receiver.close();
    }
}

fn decode(bytes: &[u8]) -> Result<TypedMessage, IpcError> {
    let (frame, _) = MessageFrame::from_bytes(bytes)?;
    TypedMessage::from_ipc_bytes(&frame.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageType;

    fn teardown(routing_id: u32) -> TypedMessage {
        TypedMessage::new(MessageType::CacheTeardown, routing_id, Vec::new())
    }

    #[test]
    fn test_pair_is_connected() {
        let (a, b) = IpcChannel::pair("test");
        assert_eq!(a.state(), ChannelState::Connected);
        assert!(b.is_connected());
        assert_eq!(a.name(), "test");
    }

    #[test]
    fn test_send_recv_in_order() {
        let (a, b) = IpcChannel::pair("order");
        for id in 0..5 {
            a.send(&teardown(id)).unwrap();
        }
        assert_eq!(b.pending(), 5);

        let ids: Vec<u32> = std::iter::from_fn(|| b.try_recv().unwrap())
            .map(|m| m.routing_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(b.try_recv().unwrap(), None);
    }

    #[test]
    fn test_sender_from_other_thread() {
        let (a, b) = IpcChannel::pair("threads");
        let sender = b.sender();
        std::thread::spawn(move || {
            sender.send(&TypedMessage::new(MessageType::PopulateRequest, 9, vec![1])).unwrap();
        })
        .join()
        .unwrap();

        let msg = a.try_recv().unwrap().unwrap();
        assert_eq!(msg.msg_type, MessageType::PopulateRequest);
    }

    #[test]
    fn test_async_recv() {
        let (a, b) = IpcChannel::pair("async");
        a.send(&teardown(3)).unwrap();
        let msg = smol::block_on(b.recv()).unwrap();
        assert_eq!(msg, teardown(3));
    }

    #[test]
    fn test_closed_channel() {
        let (a, b) = IpcChannel::pair("closed");
        b.close();
        assert!(!a.is_connected());
        assert!(matches!(a.send(&teardown(1)), Err(IpcError::Disconnected(_))));
        assert!(matches!(b.try_recv(), Err(IpcError::Disconnected(_))));
    }
}
