use clap::Parser;
use esp32spi::sim::MockEsp;
use esp32spi::{
    ConnectMode, NetworkRecord, Socket, SpiDriver, AVAIL_DATA_TCP_CMD, DATA_SENT_TCP_CMD,
    GET_CLIENT_STATE_TCP_CMD, GET_CONN_STATUS_CMD, GET_DATABUF_TCP_CMD, GET_FW_VERSION_CMD,
    GET_HOST_BY_NAME_CMD, GET_IDX_BSSID_CMD, GET_IDX_CHAN_CMD, GET_IDX_ENCT_CMD,
    GET_IDX_RSSI_CMD, GET_IPADDR_CMD, GET_MACADDR_CMD, GET_SOCKET_CMD, REQ_HOST_BY_NAME_CMD,
    SCAN_NETWORKS_CMD, SEND_DATA_TCP_CMD, SET_PASSPHRASE_CMD, START_CLIENT_TCP_CMD,
    START_SCAN_NETWORKS_CMD, START_SERVER_TCP_CMD, STOP_CLIENT_TCP_CMD,
};
use serde::Serialize;

fn main() {
    let args = Args::parse();

    let esp = MockEsp::new();
    let (spi, pins, clock) = esp.handles();
    let mut driver = SpiDriver::new(spi, pins, clock);

    println!("Host-side AirLift session against the scripted co-processor");
    println!("ssid: {}  host: {}:{}", args.ssid, args.host, args.port);
    println!();

    if args.inject_garbage {
        // Stray bytes ahead of the first reply; the resync scan eats them.
        esp.queue_raw(&[0x00, 0x13, 0x37]);
        println!("injected 3 garbage bytes before the first reply");
    }

    esp.queue_response(GET_FW_VERSION_CMD, &[b"1.7.7\0"]);
    let version = driver.firmware_version().expect("firmware version");
    println!("firmware: {}", String::from_utf8_lossy(&version));

    esp.queue_response(GET_MACADDR_CMD, &[&[0x66, 0x55, 0x44, 0x33, 0x22, 0x11]]);
    let mac = driver.mac_address().expect("mac");
    println!(
        "mac: {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );

    // Association: passphrase accepted, one miss, then connected.
    esp.queue_response(SET_PASSPHRASE_CMD, &[&[1]]);
    esp.queue_response(GET_CONN_STATUS_CMD, &[&[6]]);
    esp.queue_response(GET_CONN_STATUS_CMD, &[&[3]]);
    driver
        .connect_ap(args.ssid.as_bytes(), args.password.as_bytes(), 10_000)
        .expect("connect");
    println!("associated with {:?}", args.ssid);

    esp.queue_response(GET_IPADDR_CMD, &[&[192, 168, 1, 42]]);
    let ip = driver.ip_address().expect("ip");
    println!("ip: {}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]);

    scripted_scan(&esp);
    driver.start_scan_networks().expect("start scan");
    let networks = driver.scan_networks().expect("scan");
    println!("\nscan found {} networks:", networks.len());
    for record in &networks {
        let ssid = record.ssid(&mut driver).expect("ssid");
        let rssi = record.rssi(&mut driver).expect("rssi");
        let auth = record.authmode_byte(&mut driver).expect("authmode");
        println!(
            "- {:<12} rssi={:>4} chan={:>2} auth={}",
            String::from_utf8_lossy(&ssid),
            rssi,
            record.channel(),
            NetworkRecord::authmode_str(auth)
        );
    }

    esp.queue_response(REQ_HOST_BY_NAME_CMD, &[&[1]]);
    esp.queue_response(GET_HOST_BY_NAME_CMD, &[&[93, 184, 216, 34]]);
    let addr = driver
        .host_by_name(args.host.as_bytes())
        .expect("resolve");
    println!(
        "\n{} resolves to {}.{}.{}.{}",
        args.host, addr[0], addr[1], addr[2], addr[3]
    );

    // One TCP round trip through the socket layer.
    esp.queue_response(GET_SOCKET_CMD, &[&[0]]);
    let mut socket = Socket::open(&mut driver, ConnectMode::Tcp).expect("open socket");
    esp.queue_response(START_CLIENT_TCP_CMD, &[&[1]]);
    esp.queue_response(GET_CLIENT_STATE_TCP_CMD, &[&[4]]);
    socket
        .connect(&mut driver, &addr, args.port)
        .expect("socket connect");
    println!("socket {} connected", socket.number());

    let message = args.message.as_bytes();
    for chunk in message.chunks(64) {
        esp.queue_response(SEND_DATA_TCP_CMD, &[&[chunk.len() as u8]]);
    }
    esp.queue_response(DATA_SENT_TCP_CMD, &[&[1]]);
    let sent = socket.send(&mut driver, message).expect("send");
    println!("sent {} bytes", sent);

    let reply = b"HTTP/1.0 200 OK\r\n";
    esp.queue_response(AVAIL_DATA_TCP_CMD, &[&[reply.len() as u8, 0]]);
    esp.queue_bulk_response(GET_DATABUF_TCP_CMD, reply);
    esp.queue_response(AVAIL_DATA_TCP_CMD, &[&[0, 0]]);
    let mut buf = [0u8; 256];
    let received = socket.recv_into(&mut driver, &mut buf).expect("recv");
    println!(
        "received {} bytes: {:?}",
        received,
        String::from_utf8_lossy(&buf[..received])
    );

    esp.queue_response(STOP_CLIENT_TCP_CMD, &[&[1]]);
    socket.close(&mut driver);
    println!("socket closed");

    if args.serve {
        esp.queue_response(GET_SOCKET_CMD, &[&[1]]);
        let listener = driver.get_socket().expect("server socket");
        esp.queue_response(START_SERVER_TCP_CMD, &[&[1]]);
        driver
            .start_server(args.port, listener, ConnectMode::Tcp)
            .expect("start server");
        println!("server listening on socket {}", listener);
    }

    if args.show_frames {
        println!("\nrequest frames as clocked onto the bus:");
        for frame in esp.frames() {
            let hex: String = frame.iter().map(|b| format!("{:02x}", b)).collect();
            println!("  {}", hex);
        }
    }

    let stats = esp.stats();
    let metrics = Metrics {
        frames_written: stats.frames_written,
        bytes_read: stats.bytes_read,
        lock_cycles: stats.lock_cycles,
        sim_time_ms: stats.last_time_ms,
        garbage_injected: args.inject_garbage,
    };
    println!(
        "\nbus metrics json: {}",
        serde_json::to_string(&metrics).unwrap()
    );
    if let Some(path) = args.metrics_csv.as_ref() {
        let mut content = String::new();
        content.push_str("frames_written,bytes_read,lock_cycles,sim_time_ms,garbage_injected\n");
        content.push_str(&format!(
            "{},{},{},{},{}\n",
            metrics.frames_written,
            metrics.bytes_read,
            metrics.lock_cycles,
            metrics.sim_time_ms,
            metrics.garbage_injected
        ));
        std::fs::write(path, content).expect("write metrics csv");
        println!("bus metrics written to {}", path);
    }
}

/// Script replies for a two-network scan: the SSID list, then the
/// per-index RSSI, auth, BSSID, and channel queries in harvest order.
fn scripted_scan(esp: &MockEsp) {
    esp.queue_response(START_SCAN_NETWORKS_CMD, &[&[1]]);
    esp.queue_response(SCAN_NETWORKS_CMD, &[b"demo-net", b"coffee-shop"]);

    esp.queue_response(GET_IDX_RSSI_CMD, &[&(-55i32).to_le_bytes()]);
    esp.queue_response(GET_IDX_ENCT_CMD, &[&[4]]);
    esp.queue_response(GET_IDX_BSSID_CMD, &[&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]]);
    esp.queue_response(GET_IDX_CHAN_CMD, &[&[6]]);

    esp.queue_response(GET_IDX_RSSI_CMD, &[&(-81i32).to_le_bytes()]);
    esp.queue_response(GET_IDX_ENCT_CMD, &[&[7]]);
    esp.queue_response(GET_IDX_BSSID_CMD, &[&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x02]]);
    esp.queue_response(GET_IDX_CHAN_CMD, &[&[11]]);
}

#[derive(Parser, Debug)]
struct Args {
    /// SSID to associate with in the scripted session.
    #[arg(long, default_value = "demo-net")]
    ssid: String,

    /// Passphrase for the scripted association.
    #[arg(long, default_value = "hunter22")]
    password: String,

    /// Hostname to resolve and connect to.
    #[arg(long, default_value = "example.com")]
    host: String,

    /// TCP port for the client connection.
    #[arg(long, default_value_t = 80)]
    port: u16,

    /// Payload for the socket write.
    #[arg(long, default_value = "GET / HTTP/1.0\r\n\r\n")]
    message: String,

    /// Also start a scripted server socket.
    #[arg(long, default_value_t = false)]
    serve: bool,

    /// Put garbage bytes ahead of the first reply to exercise resync.
    #[arg(long, default_value_t = false)]
    inject_garbage: bool,

    /// Hex-dump every request frame the driver produced.
    #[arg(long, default_value_t = false)]
    show_frames: bool,

    /// Path to write bus metrics CSV (optional).
    #[arg(long)]
    metrics_csv: Option<String>,
}

#[derive(Serialize)]
struct Metrics {
    frames_written: usize,
    bytes_read: usize,
    lock_cycles: usize,
    sim_time_ms: u64,
    garbage_injected: bool,
}
