//! Association, status, and query façade flows against the scripted
//! co-processor.

use esp32spi::sim::{MockClock, MockEsp, MockPins, MockSpi};
use esp32spi::{
    Error, SpiDriver, WifiStatus, GET_CONN_STATUS_CMD, GET_FW_VERSION_CMD, GET_HOST_BY_NAME_CMD,
    GET_IPADDR_CMD, GET_MACADDR_CMD, GET_TIME_CMD, PING_CMD, REQ_HOST_BY_NAME_CMD,
    SET_ANALOG_READ_CMD, SET_PASSPHRASE_CMD,
};

fn make_driver(esp: &MockEsp) -> SpiDriver<MockSpi, MockPins, MockClock> {
    let (spi, pins, clock) = esp.handles();
    SpiDriver::new(spi, pins, clock)
}

#[test]
fn status_byte_is_authoritative() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(GET_CONN_STATUS_CMD, &[&[3]]);
    assert_eq!(driver.get_status().expect("status"), WifiStatus::Connected);

    esp.queue_response(GET_CONN_STATUS_CMD, &[&[3]]);
    assert!(driver.connected().expect("connected"));

    esp.queue_response(GET_CONN_STATUS_CMD, &[&[6]]);
    assert!(!driver.connected().expect("connected"));

    esp.queue_response(GET_CONN_STATUS_CMD, &[&[42]]);
    assert_eq!(driver.get_status().expect("status"), WifiStatus::Unknown(42));

    // A reply with no parameters means no shield responded.
    esp.queue_response(GET_CONN_STATUS_CMD, &[]);
    assert_eq!(driver.get_status().expect("status"), WifiStatus::NoShield);
}

#[test]
fn firmware_version_scrubs_every_nul_to_a_space() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(GET_FW_VERSION_CMD, &[b"1.7.7\0"]);
    assert_eq!(driver.firmware_version().expect("version"), b"1.7.7 ");
}

#[test]
fn mac_address_is_reversed_from_wire_order() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(GET_MACADDR_CMD, &[&[0x66, 0x55, 0x44, 0x33, 0x22, 0x11]]);
    assert_eq!(
        driver.mac_address().expect("mac"),
        [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]
    );
}

#[test]
fn connect_ap_polls_status_until_connected() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(SET_PASSPHRASE_CMD, &[&[1]]);
    esp.queue_response(GET_CONN_STATUS_CMD, &[&[0]]);
    esp.queue_response(GET_CONN_STATUS_CMD, &[&[0]]);
    esp.queue_response(GET_CONN_STATUS_CMD, &[&[3]]);

    driver
        .connect_ap(b"myssid", b"mypassword", 10_000)
        .expect("connect");

    let frames = esp.take_frames();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0][1], SET_PASSPHRASE_CMD);
    assert_eq!(frames[0][2], 2);
    for frame in &frames[1..] {
        assert_eq!(frame[1], GET_CONN_STATUS_CMD);
    }
}

#[test]
fn connect_ap_fails_fast_when_passphrase_is_rejected() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(SET_PASSPHRASE_CMD, &[&[0]]);
    assert_eq!(
        driver.connect_ap(b"myssid", b"wrong", 10_000),
        Err(Error::CommandFailed("set passphrase"))
    );
    assert_eq!(esp.take_frames().len(), 1);
}

#[test]
fn connect_ap_times_out_when_never_connected() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(SET_PASSPHRASE_CMD, &[&[1]]);
    for _ in 0..16 {
        esp.queue_response(GET_CONN_STATUS_CMD, &[&[6]]);
    }
    assert_eq!(
        driver.connect_ap(b"myssid", b"mypassword", 200),
        Err(Error::ConnectTimeout)
    );
}

#[test]
fn ip_and_hostname_lookup() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(GET_IPADDR_CMD, &[&[192, 168, 1, 42]]);
    assert_eq!(driver.ip_address().expect("ip"), [192, 168, 1, 42]);

    // Resolution is a request command followed by a fetch command.
    esp.queue_response(REQ_HOST_BY_NAME_CMD, &[&[1]]);
    esp.queue_response(GET_HOST_BY_NAME_CMD, &[&[93, 184, 216, 34]]);
    assert_eq!(
        driver.host_by_name(b"example.com").expect("resolve"),
        [93, 184, 216, 34]
    );

    esp.queue_response(REQ_HOST_BY_NAME_CMD, &[&[0]]);
    assert_eq!(
        driver.host_by_name(b"no.such.host"),
        Err(Error::CommandFailed("hostname lookup"))
    );
}

#[test]
fn ping_returns_round_trip_millis() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(PING_CMD, &[&[42, 0]]);
    assert_eq!(driver.ping([10, 0, 0, 1], 250).expect("ping"), 42);
}

#[test]
fn get_time_zero_means_not_yet_synced() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(GET_TIME_CMD, &[&1_700_000_000u32.to_le_bytes()]);
    assert_eq!(driver.get_time().expect("time"), 1_700_000_000);

    esp.queue_response(GET_TIME_CMD, &[&[0, 0, 0, 0]]);
    assert_eq!(driver.get_time(), Err(Error::TimeNotSet));
}

#[test]
fn analog_read_scales_and_rejects_invalid_pins() {
    let esp = MockEsp::new();
    let mut driver = make_driver(&esp);

    esp.queue_response(SET_ANALOG_READ_CMD, &[&255i32.to_le_bytes()]);
    assert_eq!(driver.set_analog_read(4, 0).expect("adc"), 255 * 16);

    esp.queue_response(SET_ANALOG_READ_CMD, &[&(-1i32).to_le_bytes()]);
    assert_eq!(driver.set_analog_read(9, 0), Err(Error::InvalidAnalogRead));
}
