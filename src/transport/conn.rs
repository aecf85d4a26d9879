// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::BytesMut;
use once_cell::sync::Lazy;
use rustls::{
    ClientConfig, DigitallySignedStruct, SignatureScheme,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    pki_types::{CertificateDer, ServerName, UnixTime},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{Instant, timeout_at},
};
use tokio_rustls::{TlsConnector, client::TlsStream};
use tracing::debug;

use crate::{
    error::{ErrorKind, ProbeError, Result},
    transport::framing::ByteSource,
};

/// Immutable description of one probe destination, constructed by a handler
/// adaptor and owned by exactly one session.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    /// Session wall-clock budget, measured from the start of `open`.
    pub timeout: Duration,
    pub tls: Option<TlsParams>,
}

#[derive(Debug, Clone, Default)]
pub struct TlsParams {
    /// Handshake server name; falls back to `Target::host`.
    pub sni: Option<String>,
    /// Single ALPN protocol identifier to advertise, if any.
    pub alpn: Option<String>,
}

impl Target {
    pub fn plain(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
            tls: None,
        }
    }

    pub fn tls(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
            tls: Some(TlsParams::default()),
        }
    }
}

/// Wall-clock deadline carried through every I/O boundary of a session.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(d: Duration) -> Self {
        Self(Instant::now() + d)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// A deadline no further away than `max` from now, never beyond `self`.
    pub fn clamped(&self, max: Duration) -> Self {
        Self(Instant::now() + self.remaining().min(max))
    }
}

/// Run one I/O future under the deadline; expiry maps to `TIMEOUT`.
pub(crate) async fn io_deadline<F, T>(
    label: &'static str,
    fut: F,
    deadline: Deadline,
) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout_at(deadline.instant(), fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(ProbeError::from(e)),
        Err(_) => Err(ProbeError::timeout(label)),
    }
}

/// Probe-grade TLS config: any certificate is accepted (the gateway reports
/// reachability and protocol behaviour, it is not a trust anchor).
static TLS_BASE: Lazy<Arc<ClientConfig>> = Lazy::new(|| {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let cfg = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("ring provider supports the default protocol versions")
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerify))
        .with_no_client_auth();
    Arc::new(cfg)
});

#[derive(Debug)]
struct NoVerify;

impl ServerCertVerifier for NoVerify {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[derive(Debug)]
enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// One byte stream to one target. Exclusively owned by the session runner;
/// `close` runs on every exit path and is idempotent.
#[derive(Debug)]
pub struct Transport {
    stream: Option<Stream>,
    pub deadline: Deadline,
    peer: Option<SocketAddr>,
}

impl Transport {
    /// DNS resolve, TCP connect, optional TLS handshake, all inside the
    /// target's deadline.
    pub async fn open(target: &Target) -> Result<Self> {
        let deadline = Deadline::after(target.timeout);

        let addrs: Vec<SocketAddr> = match timeout_at(
            deadline.instant(),
            tokio::net::lookup_host((target.host.as_str(), target.port)),
        )
        .await
        {
            Err(_) => return Err(ProbeError::timeout("resolve")),
            Ok(Err(_)) => return Err(ProbeError::dns(&target.host)),
            Ok(Ok(iter)) => iter.collect(),
        };
        if addrs.is_empty() {
            return Err(ProbeError::dns(&target.host));
        }

        let mut last_err =
            ProbeError::refused(format!("no address connected for {}", target.host));
        let mut tcp = None;
        for addr in addrs {
            if deadline.expired() {
                return Err(ProbeError::timeout("connect"));
            }
            match io_deadline("connect", TcpStream::connect(addr), deadline).await {
                Ok(s) => {
                    tcp = Some((s, addr));
                    break;
                },
                Err(e) => last_err = e,
            }
        }
        let Some((tcp, addr)) = tcp else {
            return Err(last_err);
        };
        tcp.set_nodelay(true)?;
        debug!(peer = %addr, "connected");

        let stream = match &target.tls {
            None => Stream::Plain(tcp),
            Some(tls) => {
                let config = match &tls.alpn {
                    None => Arc::clone(&TLS_BASE),
                    Some(alpn) => {
                        let mut cfg = (**TLS_BASE).clone();
                        cfg.alpn_protocols = vec![alpn.as_bytes().to_vec()];
                        Arc::new(cfg)
                    },
                };
                let name = tls.sni.clone().unwrap_or_else(|| target.host.clone());
                let server_name = ServerName::try_from(name)
                    .map_err(|_| ProbeError::tls("invalid TLS server name"))?;
                let connector = TlsConnector::from(config);
                match timeout_at(
                    deadline.instant(),
                    connector.connect(server_name, tcp),
                )
                .await
                {
                    Err(_) => return Err(ProbeError::timeout("tls handshake")),
                    Ok(Err(e)) => {
                        return Err(ProbeError::tls(format!("TLS handshake failed: {e}")));
                    },
                    Ok(Ok(s)) => Stream::Tls(Box::new(s)),
                }
            },
        };

        Ok(Self {
            stream: Some(stream),
            deadline,
            peer: Some(addr),
        })
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Write the whole byte sequence or fail; partial flushes never
    /// succeed silently.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let deadline = self.deadline;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ProbeError::new(ErrorKind::ShortRead, "transport closed"))?;
        match stream {
            Stream::Plain(s) => {
                io_deadline("write", s.write_all(bytes), deadline).await?;
                io_deadline("flush", s.flush(), deadline).await
            },
            Stream::Tls(s) => {
                io_deadline("write", s.write_all(bytes), deadline).await?;
                io_deadline("flush", s.flush(), deadline).await
            },
        }
    }

    /// Pull whatever the peer has ready into `buf`. Returns the byte count;
    /// zero means end-of-stream (peer close maps here, never to an error).
    pub async fn read_chunk(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let deadline = self.deadline;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ProbeError::new(ErrorKind::ShortRead, "transport closed"))?;
        buf.reserve(4096);
        match stream {
            Stream::Plain(s) => io_deadline("read", s.read_buf(buf), deadline).await,
            Stream::Tls(s) => io_deadline("read", s.read_buf(buf), deadline).await,
        }
    }

    /// Idempotent; swallows shutdown errors.
    pub async fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            match stream {
                Stream::Plain(mut s) => {
                    let _ = s.shutdown().await;
                },
                Stream::Tls(mut s) => {
                    let _ = s.shutdown().await;
                },
            }
        }
    }
}

impl ByteSource for Transport {
    fn read_some(
        &mut self,
        buf: &mut BytesMut,
    ) -> impl Future<Output = Result<usize>> + Send {
        self.read_chunk(buf)
    }
}
