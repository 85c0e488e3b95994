//! Transaction bracketing and frame-level fault handling against the
//! scripted co-processor.

use esp32spi::sim::{MockClock, MockEsp, MockPins, MockSpi};
use esp32spi::{
    BusConfig, Error, SpiDriver, WifiStatus, ERR_CMD, GET_CONN_STATUS_CMD, REPLY_FLAG, START_CMD,
};

fn make_driver(esp: &MockEsp) -> SpiDriver<MockSpi, MockPins, MockClock> {
    let (spi, pins, clock) = esp.handles();
    SpiDriver::new(spi, pins, clock)
}

#[test]
fn request_frames_are_padded_and_have_reply_flag_clear() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(GET_CONN_STATUS_CMD, &[&[3]]);
    driver.get_status().expect("status");

    let frames = esp.take_frames();
    assert_eq!(frames.len(), 1);
    let frame = &frames[0];
    assert_eq!(frame.len() % 4, 0);
    assert_eq!(frame[0], START_CMD);
    assert_eq!(frame[1], GET_CONN_STATUS_CMD);
    assert_eq!(frame[1] & REPLY_FLAG, 0);
}

#[test]
fn bus_is_configured_for_nina_timing() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(GET_CONN_STATUS_CMD, &[&[0]]);
    driver.get_status().expect("status");

    let config = esp.last_config().expect("bus configured");
    assert_eq!(config, BusConfig::nina_default());
    assert_eq!(config.frequency_hz, 8_000_000);
    assert!(!config.polarity);
    assert!(!config.phase);
    assert_eq!(config.bits, 8);
}

#[test]
fn lock_is_released_after_successful_exchange() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(GET_CONN_STATUS_CMD, &[&[3]]);
    assert_eq!(driver.get_status().expect("status"), WifiStatus::Connected);
    assert!(!esp.is_locked());
    // Two transactions per exchange: one for the request, one for the reply.
    assert_eq!(esp.stats().lock_cycles, 2);
}

#[test]
fn resync_skips_garbage_before_start_marker() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_raw(&[0x00, 0x42, 0x00]);
    esp.queue_response(GET_CONN_STATUS_CMD, &[&[3]]);
    assert_eq!(driver.get_status().expect("status"), WifiStatus::Connected);
}

#[test]
fn resync_tolerates_nine_garbage_bytes_but_not_ten() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_raw(&[0x55; 9]);
    esp.queue_response(GET_CONN_STATUS_CMD, &[&[3]]);
    assert_eq!(driver.get_status().expect("status"), WifiStatus::Connected);

    esp.queue_raw(&[0x55; 10]);
    esp.queue_response(GET_CONN_STATUS_CMD, &[&[3]]);
    assert_eq!(driver.get_status(), Err(Error::ResponseTimeout));
}

#[test]
fn err_marker_aborts_immediately_and_releases_lock() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_raw(&[ERR_CMD]);
    assert_eq!(driver.get_status(), Err(Error::ErrorResponse));
    assert!(!esp.is_locked());
}

#[test]
fn missing_start_marker_times_out_and_releases_lock() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    // Nothing queued: the bus reads back idle fill forever.
    assert_eq!(driver.get_status(), Err(Error::ResponseTimeout));
    assert!(!esp.is_locked());
}

#[test]
fn wrong_echoed_opcode_is_rejected() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    let wrong = 0x21 | REPLY_FLAG;
    esp.queue_raw(&[START_CMD, wrong]);
    assert_eq!(
        driver.get_status(),
        Err(Error::UnexpectedByte {
            expected: GET_CONN_STATUS_CMD | REPLY_FLAG,
            got: wrong,
        })
    );
    assert!(!esp.is_locked());
}

#[test]
fn stuck_ready_line_times_out_without_taking_the_lock() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.set_ready_stuck_high(true);
    assert_eq!(driver.get_status(), Err(Error::ReadyTimeout(false)));
    assert!(!esp.is_locked());
    assert_eq!(esp.stats().lock_cycles, 0);
}
