use embassy_net::{tcp, tcp::TcpSocket, IpListenEndpoint, Stack};
use embassy_time::{with_timeout, Duration};
use embedded_io_async::Write;
use esp_hal::gpio::Output;
use heapless::Vec;
use log::{debug, info, warn};
use smart_led::{
    config::{SessionPolicy, SERVER_PORT},
    SessionEngine, SessionIo, TransportEvent, Verdict,
};
use static_cell::StaticCell;

const SOCKET_BUF: usize = 1024;
const READ_CHUNK: usize = 64;
// Largest single dispatch output: an HTTP response plus a state frame.
const STAGED_MAX: usize = 512;
const ECONNRESET: i32 = -104;

/// Collects what one dispatch wants written so the socket write can be awaited
/// afterwards.
struct SocketIo<'a> {
    staged: Vec<u8, STAGED_MAX>,
    closing: bool,
    led: &'a mut Output<'static>,
}

impl<'a> SocketIo<'a> {
    fn new(led: &'a mut Output<'static>) -> Self {
        Self {
            staged: Vec::new(),
            closing: false,
            led,
        }
    }

    async fn flush_into(&mut self, socket: &mut TcpSocket<'_>) {
        if self.staged.is_empty() {
            return;
        }
        if let Err(err) = socket.write_all(&self.staged).await {
            warn!("ws_server: write err={:?}", err);
        }
        self.staged.clear();
    }
}

impl SessionIo for SocketIo<'_> {
    fn write(&mut self, bytes: &[u8]) {
        if self.staged.extend_from_slice(bytes).is_err() {
            warn!("ws_server: staging full; dropped {} bytes", bytes.len());
        }
    }

    fn close(&mut self) {
        self.closing = true;
    }

    fn actuate(&mut self, on: bool) {
        if on {
            self.led.set_high();
        } else {
            self.led.set_low();
        }
    }
}

#[embassy_executor::task]
pub(super) async fn server_task(stack: Stack<'static>, mut led: Output<'static>, policy: SessionPolicy) {
    static RX_BUFFER: StaticCell<[u8; SOCKET_BUF]> = StaticCell::new();
    static TX_BUFFER: StaticCell<[u8; SOCKET_BUF]> = StaticCell::new();

    let rx_buffer = RX_BUFFER.init([0u8; SOCKET_BUF]);
    let tx_buffer = TX_BUFFER.init([0u8; SOCKET_BUF]);
    let mut engine = SessionEngine::default();
    let mut read_buf = [0u8; READ_CHUNK];

    stack.wait_config_up().await;
    if let Some(cfg) = stack.config_v4() {
        info!(
            "ws_server: listening on {}:{} idle_timeout_ms={:?}",
            cfg.address.address(),
            SERVER_PORT,
            policy.idle_timeout_ms
        );
    }

    loop {
        // Only one socket exists, so further SYNs are reset while a client is
        // being served.
        let mut socket = TcpSocket::new(stack, &mut rx_buffer[..], &mut tx_buffer[..]);
        let accepted = socket
            .accept(IpListenEndpoint {
                addr: None,
                port: SERVER_PORT,
            })
            .await;
        if let Err(err) = accepted {
            warn!("ws_server: accept err={:?}", err);
            continue;
        }

        let mut io = SocketIo::new(&mut led);
        if engine.dispatch(TransportEvent::Accepted, &mut io) != Verdict::Accepted {
            socket.abort();
            continue;
        }

        while !io.closing {
            let read = read_with_policy(&mut socket, &mut read_buf, policy).await;
            let event = match read {
                None => TransportEvent::IdleTimeout,
                Some(Ok(0)) => TransportEvent::Closed,
                Some(Ok(n)) => TransportEvent::Data(&read_buf[..n]),
                Some(Err(err)) => TransportEvent::Error(error_code(err)),
            };
            let verdict = engine.dispatch(event, &mut io);
            debug!("ws_server: dispatch verdict={:?}", verdict);
            io.flush_into(&mut socket).await;
        }

        let _ = with_timeout(Duration::from_millis(250), socket.flush()).await;
        socket.close();
    }
}

/// `None` when the idle policy expired before any byte arrived.
async fn read_with_policy(
    socket: &mut TcpSocket<'_>,
    buf: &mut [u8],
    policy: SessionPolicy,
) -> Option<Result<usize, tcp::Error>> {
    match policy.idle_timeout_ms {
        Some(ms) => with_timeout(Duration::from_millis(ms as u64), socket.read(buf))
            .await
            .ok(),
        None => Some(socket.read(buf).await),
    }
}

#[allow(unreachable_patterns)]
fn error_code(err: tcp::Error) -> i32 {
    match err {
        tcp::Error::ConnectionReset => ECONNRESET,
        _ => -1,
    }
}
