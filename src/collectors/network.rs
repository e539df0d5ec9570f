//! Bounded UDP listener (syslog-style datagrams, one line per datagram).
//!
//! The socket is owned by the source and closed when it is dropped, whichever
//! way reading ends: record limit, idle timeout, socket error or cancellation.

use super::{LineSource, RawLine};
use crate::cancel::CancelToken;
use crate::error::SourceError;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const MAX_DATAGRAM: usize = 65_507;
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct UdpSource {
    socket: UdpSocket,
    addr: String,
    max_records: usize,
    idle_timeout: Option<Duration>,
}

impl UdpSource {
    pub fn bind(addr: &str, max_records: usize, idle_timeout: Option<Duration>) -> Result<Self, SourceError> {
        let bind_err = |source| SourceError::Bind {
            addr: addr.to_string(),
            source,
        };
        let socket = UdpSocket::bind(addr).map_err(bind_err)?;
        // Short read timeout so the cancel token is polled while idle.
        socket.set_read_timeout(Some(POLL_INTERVAL)).map_err(bind_err)?;
        info!(addr, max_records, "listening for UDP log lines");
        Ok(Self {
            socket,
            addr: addr.to_string(),
            max_records,
            idle_timeout,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

impl LineSource for UdpSource {
    fn id(&self) -> String {
        format!("udp://{}", self.addr)
    }

    fn read_into(&mut self, out: &mut Vec<RawLine>, cancel: &CancelToken) -> Result<(), SourceError> {
        let source_id = self.id();
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut received = 0usize;
        let mut last_datagram = Instant::now();

        while received < self.max_records {
            if cancel.is_cancelled() {
                return Err(SourceError::Cancelled);
            }
            match self.socket.recv_from(&mut buf) {
                Ok((n, _peer)) => {
                    received += 1;
                    last_datagram = Instant::now();
                    let text = String::from_utf8_lossy(&buf[..n]);
                    let text = text.trim();
                    if !text.is_empty() {
                        out.push(RawLine::new(text, source_id.as_str(), received as u64));
                    }
                    if received % 100 == 0 {
                        debug!(received, "udp progress");
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    if let Some(idle) = self.idle_timeout {
                        if last_datagram.elapsed() >= idle {
                            debug!(received, "udp listener idle, stopping");
                            break;
                        }
                    }
                }
                Err(source) => {
                    return Err(SourceError::Receive {
                        addr: self.addr.clone(),
                        received,
                        source,
                    })
                }
            }
        }
        info!(addr = %self.addr, received, "udp listener finished");
        Ok(())
    }
}
