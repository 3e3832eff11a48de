//! Edge case and stress tests for fos-ipc

use fos_ipc::{
    ByteReader, IpcChannel, IpcError, IpcSerialize, MessageFrame, MessageType, TypedMessage,
    write_varint,
};

fn evict(routing_id: u32) -> TypedMessage {
    TypedMessage::new(MessageType::CacheEvict, routing_id, vec![1])
}

// ============================================================================
// FRAME EDGE CASES
// ============================================================================

#[test]
fn test_frame_detects_corruption() {
    let msg = TypedMessage::new(MessageType::CacheDelta, 4, vec![9, 8, 7, 6]);
    let mut bytes = MessageFrame::new(msg.to_ipc_bytes()).to_bytes();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x10;
    assert_eq!(MessageFrame::from_bytes(&bytes).unwrap_err(), IpcError::ChecksumMismatch);
}

#[test]
fn test_frame_length_beyond_buffer() {
    let mut bytes = MessageFrame::new(vec![1, 2, 3]).to_bytes();
    bytes.truncate(bytes.len() - 1);
    assert_eq!(MessageFrame::from_bytes(&bytes).unwrap_err(), IpcError::BufferTooShort);
    assert_eq!(MessageFrame::from_bytes(&[0, 0]).unwrap_err(), IpcError::BufferTooShort);
}

#[test]
fn test_back_to_back_frames() {
    let mut wire = MessageFrame::new(vec![1]).to_bytes();
    wire.extend(MessageFrame::new(vec![2, 3]).to_bytes());

    let (first, used) = MessageFrame::from_bytes(&wire).unwrap();
    let (second, rest) = MessageFrame::from_bytes(&wire[used..]).unwrap();
    assert_eq!(first.payload, vec![1]);
    assert_eq!(second.payload, vec![2, 3]);
    assert_eq!(used + rest, wire.len());
}

#[test]
fn test_empty_payload_frame() {
    let msg = TypedMessage::new(MessageType::CacheTeardown, 1, Vec::new());
    let (frame, _) = MessageFrame::from_bytes(&MessageFrame::new(msg.to_ipc_bytes()).to_bytes()).unwrap();
    assert_eq!(TypedMessage::from_ipc_bytes(&frame.payload).unwrap(), msg);
}

// ============================================================================
// READER EDGE CASES
// ============================================================================

#[test]
fn test_overlong_varint_rejected() {
    let buf = [0xFF; 11];
    assert!(ByteReader::new(&buf).read_varint().is_err());
}

#[test]
fn test_varint_u32_overflow() {
    let mut buf = Vec::new();
    write_varint(&mut buf, u64::from(u32::MAX) + 1);
    assert_eq!(ByteReader::new(&buf).read_varint_u32().unwrap_err(), IpcError::InvalidFormat);
}

#[test]
fn test_every_cache_message_type_known() {
    for ty in [
        MessageType::CacheDelta,
        MessageType::CacheEvict,
        MessageType::CacheTeardown,
        MessageType::PopulateRequest,
        MessageType::ResyncRequest,
        MessageType::SetCacheDomains,
    ] {
        assert_eq!(MessageType::from_u16(ty as u16), Some(ty));
    }
    assert_eq!(MessageType::from_u16(56), None);
}

// ============================================================================
// CHANNEL EDGE CASES
// ============================================================================

#[test]
fn test_dropped_peer_disconnects() {
    let (a, b) = IpcChannel::pair("drop");
    let sender = a.sender();
    drop(b);
    assert!(matches!(sender.send(&evict(1)), Err(IpcError::Disconnected(name)) if name == "drop"));
}

#[test]
fn test_queued_frames_survive_sender_drop() {
    let (a, b) = IpcChannel::pair("drain");
    a.send(&evict(1)).unwrap();
    a.send(&evict(2)).unwrap();
    drop(a);

    assert_eq!(b.try_recv().unwrap().map(|m| m.routing_id), Some(1));
    assert_eq!(b.try_recv().unwrap().map(|m| m.routing_id), Some(2));
    assert!(matches!(b.try_recv(), Err(IpcError::Disconnected(_))));
}

#[test]
fn test_many_senders_keep_per_sender_order() {
    let (a, b) = IpcChannel::pair("fan-in");
    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let sender = a.sender();
            std::thread::spawn(move || {
                for i in 0..250u32 {
                    let payload = i.to_le_bytes().to_vec();
                    sender.send(&TypedMessage::new(MessageType::PopulateRequest, t, payload)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut last = [None::<u32>; 4];
    let mut count = 0;
    while let Some(msg) = b.try_recv().unwrap() {
        let seq = u32::from_le_bytes(msg.payload[..4].try_into().unwrap());
        let slot = &mut last[msg.routing_id as usize];
        assert!(slot.is_none_or(|prev| prev < seq));
        *slot = Some(seq);
        count += 1;
    }
    assert_eq!(count, 1000);
}
