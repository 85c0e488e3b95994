#![cfg(feature = "proptest")]

use proptest::prelude::*;

use esp32spi::sim::MockEsp;
use esp32spi::{
    encode_command, encode_response, padded_frame_len, SpiDriver, END_CMD, REPLY_FLAG, START_CMD,
};

fn arb_params() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..=64), 0..=8)
}

fn arb_cmd() -> impl Strategy<Value = u8> {
    0x10u8..=0x54
}

/// Walk an encoded request and recover its parameters, checking every
/// framing byte on the way.
fn decode_request(frame: &[u8], cmd: u8) -> Vec<Vec<u8>> {
    assert_eq!(frame[0], START_CMD);
    assert_eq!(frame[1], cmd & !REPLY_FLAG);
    let count = frame[2] as usize;

    let mut params = Vec::with_capacity(count);
    let mut at = 3;
    for _ in 0..count {
        let len = frame[at] as usize;
        at += 1;
        params.push(frame[at..at + len].to_vec());
        at += len;
    }
    assert_eq!(frame[at], END_CMD);
    at += 1;
    // Everything after END is zero padding out to a 4-byte boundary.
    assert!(frame[at..].iter().all(|&b| b == 0));
    params
}

proptest! {
    #[test]
    fn request_encoding_roundtrip(cmd in arb_cmd(), params in arb_params()) {
        let refs: Vec<&[u8]> = params.iter().map(|p| p.as_slice()).collect();
        let mut frame = Vec::new();
        encode_command(&mut frame, cmd, &refs);

        prop_assert_eq!(frame.len() % 4, 0);
        prop_assert_eq!(frame.len(), padded_frame_len(&refs));
        prop_assert_eq!(decode_request(&frame, cmd), params);
    }

    #[test]
    fn response_decoding_roundtrip(cmd in arb_cmd(), params in arb_params()) {
        let refs: Vec<&[u8]> = params.iter().map(|p| p.as_slice()).collect();

        let esp = MockEsp::new();
        let (spi, pins, clock) = esp.handles();
        let mut driver = SpiDriver::new(spi, pins, clock);

        esp.queue_raw(&encode_response(cmd, &refs));
        let decoded = driver.send_command_get_response(cmd, &refs).unwrap();
        prop_assert_eq!(decoded, params);
        prop_assert!(!esp.is_locked());
    }
}
