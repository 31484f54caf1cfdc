//! Wire socket: raw byte transport over TCP, optionally TLS-wrapped
//!
//! Reads never block for longer than the poll interval so that the worker owning the
//! socket can notice cancellation. Once a socket is closed every further read or send
//! fails with [`Error::InvalidState`].

use crate::config::TlsConfig;
use crate::{Error, Result};
use parking_lot::Mutex;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ClientConnection, RootCertStore, ServerName, StreamOwned};
use std::io::{self, BufReader, ErrorKind, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Byte transport used by a connection's reader and sender workers
pub trait Transport: Send + Sync {
    /// Read up to `max` bytes; `Ok(None)` when nothing arrived within the poll interval
    fn read_data(&self, max: usize) -> Result<Option<Vec<u8>>>;

    /// Write all of `data`
    fn send_data(&self, data: &[u8]) -> Result<()>;

    /// Close the transport; idempotent
    fn close(&self);

    /// Whether the transport is still open
    fn is_alive(&self) -> bool;

    /// Local address of the connection, as seen by this host
    fn local_ip(&self) -> Option<IpAddr> {
        None
    }
}

enum Stream {
    Plain {
        reader: Mutex<TcpStream>,
        writer: Mutex<TcpStream>,
    },
    Tls(Mutex<StreamOwned<ClientConnection, TcpStream>>),
}

/// TCP or TLS socket connected to an IRC server
pub struct WireSocket {
    host: String,
    port: u16,
    alive: AtomicBool,
    stream: Stream,
    /// Handle used to shut the socket down while a worker is blocked on it
    control: TcpStream,
    local_addr: Option<SocketAddr>,
}

impl std::fmt::Debug for WireSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireSocket")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.is_tls())
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl WireSocket {
    /// Open a connection to `host:port`, wrapping it in TLS when `tls` is given
    pub fn connect(
        host: &str,
        port: u16,
        tls: Option<Arc<ClientConfig>>,
        connect_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self> {
        let tcp = open_tcp(host, port, connect_timeout)?;
        tcp.set_nodelay(true)?;
        let control = tcp.try_clone()?;
        let local_addr = tcp.local_addr().ok();

        let stream = match tls {
            Some(config) => {
                let server_name = ServerName::try_from(host).map_err(|e| {
                    Error::Connection(format!("Failed to connect to socket: invalid server name {}: {}", host, e))
                })?;
                let mut conn = ClientConnection::new(config, server_name)?;
                let mut tcp = tcp;
                tcp.set_read_timeout(Some(connect_timeout))?;
                while conn.is_handshaking() {
                    conn.complete_io(&mut tcp)
                        .map_err(|e| Error::Connection(format!("TLS handshake failed: {}", e)))?;
                }
                tcp.set_read_timeout(Some(poll_interval))?;
                Stream::Tls(Mutex::new(StreamOwned::new(conn, tcp)))
            }
            None => {
                tcp.set_read_timeout(Some(poll_interval))?;
                let writer = tcp.try_clone()?;
                Stream::Plain {
                    reader: Mutex::new(tcp),
                    writer: Mutex::new(writer),
                }
            }
        };

        tracing::info!("Connected to {}:{}", host, port);

        Ok(Self {
            host: host.to_string(),
            port,
            alive: AtomicBool::new(true),
            stream,
            control,
            local_addr,
        })
    }

    /// Address this socket was opened against
    pub fn address(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    /// Whether the socket is TLS-wrapped
    pub fn is_tls(&self) -> bool {
        matches!(self.stream, Stream::Tls(_))
    }

    fn ensure_alive(&self, action: &str) -> Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "This socket is not connected to a server; it cannot {}.",
                action
            )))
        }
    }

    fn map_read_error(&self, err: io::Error) -> Result<Option<Vec<u8>>> {
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => Ok(None),
            ErrorKind::InvalidInput | ErrorKind::Unsupported => {
                Err(Error::SocketPoll("Failed to read state of socket.".to_string()))
            }
            _ if !self.is_alive() => Err(Error::InvalidState(
                "This socket was closed while reading.".to_string(),
            )),
            _ => {
                tracing::debug!("Read from {}:{} failed: {}", self.host, self.port, err);
                Err(Error::IncomingTransmission("Failed to read data from server.".to_string()))
            }
        }
    }
}

impl Transport for WireSocket {
    fn read_data(&self, max: usize) -> Result<Option<Vec<u8>>> {
        self.ensure_alive("read data")?;
        let mut buf = vec![0u8; max];
        let read = match &self.stream {
            Stream::Plain { reader, .. } => reader.lock().read(&mut buf),
            Stream::Tls(stream) => stream.lock().read(&mut buf),
        };

        match read {
            Ok(0) => {
                if self.is_alive() {
                    Err(Error::IncomingTransmission("Remote host closed the connection.".to_string()))
                } else {
                    Err(Error::InvalidState("This socket was closed while reading.".to_string()))
                }
            }
            Ok(n) => {
                buf.truncate(n);
                Ok(Some(buf))
            }
            Err(e) => self.map_read_error(e),
        }
    }

    fn send_data(&self, data: &[u8]) -> Result<()> {
        self.ensure_alive("send data")?;
        let written = match &self.stream {
            Stream::Plain { writer, .. } => {
                let mut writer = writer.lock();
                writer.write_all(data).and_then(|_| writer.flush())
            }
            Stream::Tls(stream) => {
                let mut stream = stream.lock();
                stream.write_all(data).and_then(|_| stream.flush())
            }
        };

        written.map_err(|e| {
            tracing::debug!("Write to {}:{} failed: {}", self.host, self.port, e);
            Error::OutgoingTransmission {
                description: "Failed to send data to server.".to_string(),
                message: String::from_utf8_lossy(data).into_owned(),
            }
        })
    }

    fn close(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Stream::Tls(stream) = &self.stream {
            if let Some(mut stream) = stream.try_lock_for(Duration::from_millis(200)) {
                stream.conn.send_close_notify();
                let _ = stream.flush();
            }
        }
        let _ = self.control.shutdown(Shutdown::Both);
        tracing::info!("Closed connection to {}:{}", self.host, self.port);
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn local_ip(&self) -> Option<IpAddr> {
        self.local_addr.map(|addr| addr.ip())
    }
}

impl Drop for WireSocket {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::Connection(format!("Failed to connect to socket: {}", e)))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!("Connection to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(Error::Connection(match last_error {
        Some(e) => format!("Failed to connect to socket: {}", e),
        None => format!("Failed to connect to socket: no addresses found for {}", host),
    }))
}

/// Accepts any server certificate; used when verification is turned off
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// Build the rustls client configuration shared by every TLS connection
pub fn tls_client_config(config: &TlsConfig) -> Result<Arc<ClientConfig>> {
    if !config.verify_certificates {
        tracing::warn!("TLS certificate verification is disabled");
        let client = ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth();
        return Ok(Arc::new(client));
    }

    let mut roots = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let mut rejected = 0;
            for cert in certs {
                if roots.add(&Certificate(cert.0)).is_err() {
                    rejected += 1;
                }
            }
            if rejected > 0 {
                tracing::debug!("Skipped {} unusable system certificates", rejected);
            }
        }
        Err(e) => tracing::warn!("Could not load system certificates: {}", e),
    }

    if let Some(path) = &config.ca_file {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Config(format!("Failed to open CA file {}: {}", path, e)))?;
        let certs = rustls_pemfile::certs(&mut BufReader::new(file))
            .map_err(|e| Error::Config(format!("Failed to parse CA file {}: {}", path, e)))?;
        for der in certs {
            roots
                .add(&Certificate(der))
                .map_err(|e| Error::Config(format!("Invalid CA certificate in {}: {}", path, e)))?;
        }
    }

    let client = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(client))
}
