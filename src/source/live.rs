//! Live stream source.
//!
//! A background thread reads text records from a TCP socket, stdin or any
//! reader and forwards parsed samples through a bounded queue. Reads on the
//! tick side wait at most until the deadline.

use std::io::{BufRead, BufReader, Read};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use super::record;
use super::SampleSource;
use crate::buffer::Sample;
use crate::error::{GraphViewError, Result};

/// Samples queued between the reader thread and the tick driver.
pub const DEFAULT_QUEUE_CAPACITY: usize = 65_536;

/// Where a live stream reads from.
pub enum LiveEndpoint {
    /// `host:port` TCP address.
    Tcp(String),
    /// Standard input.
    Stdin,
    /// Arbitrary reader; it can be opened only once.
    Reader(Option<Box<dyn Read + Send>>),
}

impl std::fmt::Debug for LiveEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "Tcp({})", addr),
            Self::Stdin => f.write_str("Stdin"),
            Self::Reader(_) => f.write_str("Reader"),
        }
    }
}

impl LiveEndpoint {
    /// `-` means stdin, anything else a TCP address.
    pub fn parse(address: &str) -> Self {
        match address.trim() {
            "-" => Self::Stdin,
            addr => Self::Tcp(addr.to_string()),
        }
    }
}

#[derive(Debug)]
struct Connection {
    receiver: Receiver<Sample>,
    socket: Option<TcpStream>,
    reader: Option<JoinHandle<()>>,
}

/// Source fed by an external stream.
#[derive(Debug)]
pub struct LiveStream {
    endpoint: LiveEndpoint,
    connect_timeout: Duration,
    queue_capacity: usize,
    max_batch: usize,
    connection: Option<Connection>,
}

impl LiveStream {
    /// Create a stream for `endpoint`.
    pub fn new(endpoint: LiveEndpoint) -> Self {
        Self {
            endpoint,
            connect_timeout: Duration::from_secs(2),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_batch: 4096,
            connection: None,
        }
    }

    /// Stream reading from `reader` on a background thread.
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self::new(LiveEndpoint::Reader(Some(Box::new(reader))))
    }

    /// Time allowed for the TCP connect.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Size of the queue between reader thread and tick driver.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Cap the number of samples returned per read.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }
}

fn connect_tcp(name: &str, address: &str, timeout: Duration) -> Result<TcpStream> {
    let addrs = address
        .to_socket_addrs()
        .map_err(|e| GraphViewError::source_open(name, e))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(GraphViewError::source_open(
        name,
        last_error.map_or_else(|| "address resolved to nothing".to_string(), |e| e.to_string()),
    ))
}

fn spawn_reader(
    name: String,
    input: Box<dyn Read + Send>,
    sender: Sender<Sample>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("graphview-live".to_string())
        .spawn(move || {
            for (idx, line) in BufReader::new(input).split(b'\n').enumerate() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!("{}: read failed: {}", name, e);
                        return;
                    },
                };
                match record::parse_bytes(&line) {
                    Ok(Some(sample)) => {
                        if sender.send(sample).is_err() {
                            // Receiver dropped: the stream was closed.
                            return;
                        }
                    },
                    Ok(None) => {},
                    Err(e) => tracing::warn!("{}: skipping line {}: {}", name, idx + 1, e),
                }
            }
            tracing::info!("{}: end of stream", name);
        })
        .map_err(GraphViewError::from)
}

impl SampleSource for LiveStream {
    fn open(&mut self) -> Result<()> {
        self.close();

        let name = self.describe();
        let (input, socket): (Box<dyn Read + Send>, Option<TcpStream>) = match &mut self.endpoint {
            LiveEndpoint::Tcp(address) => {
                let stream = connect_tcp(&name, address, self.connect_timeout)?;
                let reader = stream
                    .try_clone()
                    .map_err(|e| GraphViewError::source_open(name.as_str(), e))?;
                (Box::new(reader) as Box<dyn Read + Send>, Some(stream))
            },
            LiveEndpoint::Stdin => (Box::new(std::io::stdin()) as Box<dyn Read + Send>, None),
            LiveEndpoint::Reader(reader) => match reader.take() {
                Some(reader) => (reader, None),
                None => return Err(GraphViewError::source_open(name, "reader already consumed")),
            },
        };

        let (sender, receiver) = bounded(self.queue_capacity);
        let reader = spawn_reader(name, input, sender)?;
        self.connection = Some(Connection {
            receiver,
            socket,
            reader: Some(reader),
        });
        tracing::info!("Live stream opened: {}", self.describe());
        Ok(())
    }

    fn read_next_batch(&mut self, deadline: Instant) -> Result<Vec<Sample>> {
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| GraphViewError::disconnected("live stream is not open"))?;

        let first = match connection.receiver.recv_deadline(deadline) {
            Ok(sample) => sample,
            Err(RecvTimeoutError::Timeout) => return Err(GraphViewError::SourceTimeout),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(GraphViewError::disconnected(format!(
                    "{} closed",
                    self.describe()
                )))
            },
        };

        let mut batch = vec![first];
        while batch.len() < self.max_batch {
            match connection.receiver.try_recv() {
                Ok(sample) => batch.push(sample),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(batch)
    }

    fn close(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        if let Some(socket) = connection.socket.take() {
            if let Err(e) = socket.shutdown(Shutdown::Both) {
                tracing::debug!("Socket shutdown: {}", e);
            }
            // Shutdown unblocks the reader; drop the queue so a blocked send fails too.
            drop(connection.receiver);
            if let Some(reader) = connection.reader.take() {
                if reader.join().is_err() {
                    tracing::warn!("Live reader thread panicked");
                }
            }
        }
        // Stdin and generic readers cannot be interrupted; their thread is left
        // to exit on its next send.
        tracing::info!("Live stream closed: {}", self.describe());
    }

    fn describe(&self) -> String {
        match &self.endpoint {
            LiveEndpoint::Tcp(address) => format!("tcp {}", address),
            LiveEndpoint::Stdin => "stdin".to_string(),
            LiveEndpoint::Reader(_) => "stream reader".to_string(),
        }
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::net::TcpListener;

    fn soon(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[test]
    fn drains_reader_then_reports_disconnect() {
        let mut stream = LiveStream::from_reader(Cursor::new("0,0,1\n0.1,0,2\nnoise\n0.2,1,3\n"));
        stream.open().unwrap();

        let mut samples = Vec::new();
        let err = loop {
            match stream.read_next_batch(soon(500)) {
                Ok(batch) => samples.extend(batch),
                Err(e) => break e,
            }
        };
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2], Sample::new(0.2, 1, 3.0));
        assert!(matches!(err, GraphViewError::SourceDisconnected(_)));
    }

    #[test]
    fn non_utf8_line_does_not_end_stream() {
        let mut stream =
            LiveStream::from_reader(Cursor::new(b"0,0,1\n1,0,\xff\n2,0,3\n3,0,4\n".to_vec()));
        stream.open().unwrap();

        let mut samples = Vec::new();
        let err = loop {
            match stream.read_next_batch(soon(500)) {
                Ok(batch) => samples.extend(batch),
                Err(e) => break e,
            }
        };
        assert_eq!(
            samples,
            vec![
                Sample::new(0.0, 0, 1.0),
                Sample::new(2.0, 0, 3.0),
                Sample::new(3.0, 0, 4.0),
            ]
        );
        assert!(matches!(err, GraphViewError::SourceDisconnected(_)));
    }

    #[test]
    fn silent_peer_times_out_within_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let mut stream = LiveStream::new(LiveEndpoint::Tcp(address));
        stream.open().unwrap();
        let (mut peer, _) = listener.accept().unwrap();

        let started = Instant::now();
        let result = stream.read_next_batch(soon(30));
        assert!(matches!(result, Err(GraphViewError::SourceTimeout)));
        assert!(started.elapsed() < Duration::from_millis(500));

        peer.write_all(b"1.5,2,9\n").unwrap();
        let batch = stream.read_next_batch(soon(2_000)).unwrap();
        assert_eq!(batch, vec![Sample::new(1.5, 2, 9.0)]);

        drop(peer);
        assert!(matches!(
            stream.read_next_batch(soon(2_000)),
            Err(GraphViewError::SourceDisconnected(_))
        ));
        stream.close();
    }

    #[test]
    fn refused_connection_fails_to_open() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let mut stream = LiveStream::new(LiveEndpoint::Tcp(address));
        assert!(matches!(stream.open(), Err(GraphViewError::SourceOpen { .. })));
    }

    #[test]
    fn reader_endpoint_opens_once() {
        let mut stream = LiveStream::from_reader(Cursor::new(""));
        stream.open().unwrap();
        stream.close();
        assert!(stream.open().is_err());
    }

    #[test]
    fn endpoint_parsing() {
        assert!(matches!(LiveEndpoint::parse("-"), LiveEndpoint::Stdin));
        assert!(matches!(LiveEndpoint::parse("localhost:9000"), LiveEndpoint::Tcp(a) if a == "localhost:9000"));
    }
}
