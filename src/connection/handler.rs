//! Connection Handler Module
//!
//! This module handles individual client connections to linekv.
//! Each client gets its own handler task that runs in a loop,
//! reading lines and sending responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute buffered lines  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Write prompt + flush    │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / error
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! Incoming bytes accumulate in a BytesMut buffer. TCP is a stream protocol,
//! so a read may end mid-line or carry several lines at once. Every complete
//! line is executed before the prompt is written, so pipelined input gets
//! all of its responses followed by a single prompt.

use crate::commands::CommandHandler;
use crate::protocol::{split_line, ParseError, Request, Response, MAX_LINE_SIZE};
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total request lines processed
    pub commands_processed: AtomicU64,
    /// Requests that were answered with an `ERR` line
    pub error_responses: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self, failed: bool) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.error_responses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the stream so the same loop serves a `TcpStream` in
/// production and an in-memory mock in tests.
pub struct ConnectionHandler<S> {
    /// The client stream, buffered for writes
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// Written before every read
    prompt: Arc<str>,

    /// Longest line accepted before the connection is closed
    max_line: usize,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client stream
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing requests
    /// * `stats` - Shared connection statistics
    /// * `prompt` - Text written before each read
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        prompt: Arc<str>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            stats,
            prompt,
            max_line: MAX_LINE_SIZE,
        }
    }

    /// Overrides the maximum line size.
    pub fn with_max_line_size(mut self, max_line: usize) -> Self {
        self.max_line = max_line;
        self
    }

    /// Runs the main connection loop.
    ///
    /// Returns `Ok(())` when the client closes its end of the connection.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The execute-prompt-read loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(line) = self.next_line().await? {
                self.process_line(&line).await?;
            }

            self.write_prompt().await?;

            if !self.read_more_data().await? {
                // A final line without a terminator still gets an answer
                if !self.buffer.is_empty() {
                    let line = self.buffer.split().freeze();
                    self.process_line(&line).await?;
                    self.stream.flush().await?;
                }
                return Ok(());
            }
        }
    }

    /// Takes the next complete line off the buffer.
    ///
    /// An oversized line is answered with an error and ends the session.
    async fn next_line(&mut self) -> Result<Option<Bytes>, ConnectionError> {
        match split_line(&mut self.buffer, self.max_line) {
            Ok(line) => Ok(line),
            Err(e) => {
                debug!(client = %self.addr, error = %e, "Rejecting oversized line");
                self.write_response(&Response::error(e.to_string())).await?;
                self.stream.flush().await?;
                Err(e.into())
            }
        }
    }

    /// Parses and executes one line, buffering the response.
    async fn process_line(&mut self, line: &[u8]) -> Result<(), ConnectionError> {
        let response = match Request::parse(line) {
            Ok(request) => {
                trace!(client = %self.addr, command = %request.command, "Executing");
                self.command_handler.execute(&request)
            }
            Err(e) => {
                debug!(client = %self.addr, error = %e, "Rejected request line");
                Response::error(e.to_string())
            }
        };

        self.stats.command_processed(response.is_error());
        self.write_response(&response).await
    }

    async fn write_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stats.bytes_written(bytes.len());
        Ok(())
    }

    async fn write_prompt(&mut self) -> Result<(), ConnectionError> {
        self.stream.write_all(self.prompt.as_bytes()).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(self.prompt.len());
        Ok(())
    }

    /// Reads more data into the buffer. Returns `false` on end of stream.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            return Ok(false);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");
        Ok(true)
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Framing error, such as a line over the size limit
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    prompt: Arc<str>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, prompt);
    if let Err(e) = handler.run().await {
        debug!(client = %addr, error = %e, "Connection ended with error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::{timeout, Duration};
    use tokio_test::io::Builder;

    const PROMPT: &str = "redis> ";

    fn test_addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn new_handler() -> CommandHandler {
        CommandHandler::new(Arc::new(StorageEngine::new()))
    }

    async fn create_test_server() -> (SocketAddr, Arc<StorageEngine>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let storage = Arc::new(StorageEngine::new());
        let stats = Arc::new(ConnectionStats::new());

        let storage_clone = Arc::clone(&storage);
        let stats_clone = Arc::clone(&stats);
        let prompt: Arc<str> = Arc::from(PROMPT);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = CommandHandler::new(Arc::clone(&storage_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(
                    stream,
                    client_addr,
                    handler,
                    stats,
                    Arc::clone(&prompt),
                ));
            }
        });

        (addr, storage, stats)
    }

    /// Reads until the output ends with a prompt and returns what came before it.
    async fn read_until_prompt(client: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 256];

        while !buf.ends_with(PROMPT.as_bytes()) {
            let n = timeout(Duration::from_secs(2), client.read(&mut chunk))
                .await
                .expect("timed out waiting for prompt")
                .unwrap();
            assert!(n > 0, "server closed the connection");
            buf.extend_from_slice(&chunk[..n]);
        }

        buf.truncate(buf.len() - PROMPT.len());
        String::from_utf8(buf).unwrap()
    }

    async fn send(client: &mut TcpStream, line: &str) -> String {
        client.write_all(line.as_bytes()).await.unwrap();
        read_until_prompt(client).await
    }

    #[tokio::test]
    async fn test_prompt_then_response() {
        let stream = Builder::new()
            .write(b"redis> ")
            .read(b"SET a hello\n")
            .write(b"OK\n")
            .write(b"redis> ")
            .read(b"GET a\r\n")
            .write(b"hello\n")
            .write(b"redis> ")
            .build();

        let stats = Arc::new(ConnectionStats::new());
        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            new_handler(),
            Arc::clone(&stats),
            Arc::from(PROMPT),
        );

        handler.run().await.unwrap();

        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 2);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_pipelined_lines_share_one_prompt() {
        let stream = Builder::new()
            .write(b"redis> ")
            .read(b"SET a 1\nSET b 2\nDEL a\n")
            .write(b"OK\nOK\n1\n")
            .write(b"redis> ")
            .build();

        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            new_handler(),
            Arc::new(ConnectionStats::new()),
            Arc::from(PROMPT),
        );
        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        let stream = Builder::new()
            .write(b"redis> ")
            .read(b"PI")
            .write(b"redis> ")
            .read(b"NG\n")
            .write(b"PONG\n")
            .write(b"redis> ")
            .build();

        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            new_handler(),
            Arc::new(ConnectionStats::new()),
            Arc::from(PROMPT),
        );
        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_request_errors_keep_session_open() {
        let stream = Builder::new()
            .write(b"redis> ")
            .read(b"\n")
            .write(b"ERR empty request\n")
            .write(b"redis> ")
            .read(b"GET \xff\n")
            .write(b"ERR invalid UTF-8 in request\n")
            .write(b"redis> ")
            .read(b"FOO bar\n")
            .write(b"ERR unknown command 'FOO'\n")
            .write(b"redis> ")
            .build();

        let stats = Arc::new(ConnectionStats::new());
        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            new_handler(),
            Arc::clone(&stats),
            Arc::from(PROMPT),
        );
        handler.run().await.unwrap();

        assert_eq!(stats.error_responses.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_unterminated_last_line_is_executed() {
        let stream = Builder::new()
            .write(b"redis> ")
            .read(b"PING")
            .write(b"redis> ")
            .write(b"PONG\n")
            .build();

        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            new_handler(),
            Arc::new(ConnectionStats::new()),
            Arc::from(PROMPT),
        );
        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_line_closes_connection() {
        let stream = Builder::new()
            .write(b"redis> ")
            .read(b"SET key aaaaaaaaaaaaaaaaaaaaaaaa")
            .write(b"ERR line too long: 32 bytes (max: 16)\n")
            .build();

        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            new_handler(),
            Arc::new(ConnectionStats::new()),
            Arc::from(PROMPT),
        )
        .with_max_line_size(16);

        let err = handler.run().await.unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::ParseError(ParseError::LineTooLong { size: 32, max: 16 })
        ));
    }

    #[tokio::test]
    async fn test_tcp_session() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        assert_eq!(read_until_prompt(&mut client).await, "");
        assert_eq!(send(&mut client, "SET test test123\n").await, "OK\n");
        assert_eq!(send(&mut client, "SET care care123\n").await, "OK\n");

        let keys = send(&mut client, "KEYS *\n").await;
        let mut keys: Vec<&str> = keys.lines().collect();
        keys.sort();
        assert_eq!(keys, vec!["care", "test"]);

        assert_eq!(send(&mut client, "ZADD z 5 x\n").await, "1\n");
        assert_eq!(send(&mut client, "ZADD z 1 y\n").await, "1\n");
        assert_eq!(send(&mut client, "ZRANGE z 0 10\n").await, "y  1\nx  5\n");

        assert_eq!(
            send(&mut client, "GET z\n").await,
            "ERR WRONGTYPE Operation against a key holding the wrong kind of value\n"
        );
        assert_eq!(send(&mut client, "GET missing\n").await, "(nil)\n");
        assert_eq!(send(&mut client, "DEL test\n").await, "1\n");
        assert_eq!(send(&mut client, "GET test\n").await, "(nil)\n");
    }

    #[tokio::test]
    async fn test_tcp_expire() {
        let (addr, storage, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        read_until_prompt(&mut client).await;

        assert_eq!(send(&mut client, "SET session abc\n").await, "OK\n");
        assert_eq!(send(&mut client, "EXPIRE session 100\n").await, "1\n");
        assert_eq!(send(&mut client, "TTL session\n").await, "100\n");
        assert_eq!(send(&mut client, "EXPIRE session 0\n").await, "1\n");
        assert_eq!(send(&mut client, "GET session\n").await, "(nil)\n");
        assert_eq!(storage.get("session").unwrap(), None);
    }

    #[tokio::test]
    async fn test_tcp_clients_share_store() {
        let (addr, _, _) = create_test_server().await;

        let mut writer = TcpStream::connect(addr).await.unwrap();
        let mut reader = TcpStream::connect(addr).await.unwrap();
        read_until_prompt(&mut writer).await;
        read_until_prompt(&mut reader).await;

        assert_eq!(send(&mut writer, "SET shared value\n").await, "OK\n");
        assert_eq!(send(&mut reader, "GET shared\n").await, "value\n");
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();
        read_until_prompt(&mut client).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        send(&mut client, "PING\n").await;
        send(&mut client, "NOPE\n").await;

        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 2);
        assert_eq!(stats.error_responses.load(Ordering::Relaxed), 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        drop(client);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
