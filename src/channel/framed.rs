//! Length-prefixed JSON frames over a byte stream, used for the mutual-TLS
//! link between the serving and the home network.

use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_rustls::{TlsAcceptor, TlsConnector};

use super::{ChannelError, SecureLink, SecureReceiver, SecureSender};
use crate::types::messages::SecureEnvelope;
use crate::types::tls::TlsConfig;
use crate::types::wire;

pub const MAX_FRAME_SIZE: usize = 64 * 1024;

pub struct FramedSender<W> {
    writer: Mutex<W>,
}

pub struct FramedReceiver<R> {
    reader: R,
}

impl<W> SecureSender for FramedSender<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, envelope: SecureEnvelope) -> Result<(), ChannelError> {
        let payload = wire::encode(&envelope).map_err(|e| ChannelError::Decode(e.to_string()))?;
        if payload.len() > MAX_FRAME_SIZE {
            return Err(ChannelError::FrameTooLarge(payload.len()));
        }

        let mut writer = self.writer.lock().await;
        writer.write_u32(payload.len() as u32).await?;
        writer.write_all(&payload).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl<R> SecureReceiver for FramedReceiver<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn receive(&mut self) -> Result<SecureEnvelope, ChannelError> {
        let len = match self.reader.read_u32().await {
            Ok(len) => len as usize,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ChannelError::Closed)
            }
            Err(e) => return Err(e.into()),
        };
        if len > MAX_FRAME_SIZE {
            return Err(ChannelError::FrameTooLarge(len));
        }

        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).await?;
        wire::decode(&payload).map_err(|e| ChannelError::Decode(e.to_string()))
    }
}

pub type FramedLink<T> = SecureLink<FramedSender<WriteHalf<T>>, FramedReceiver<ReadHalf<T>>>;

pub fn framed<T>(stream: T, local: &str, peer: &str) -> FramedLink<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = split(stream);
    SecureLink::new(
        local,
        peer,
        FramedSender {
            writer: Mutex::new(writer),
        },
        FramedReceiver { reader },
    )
}

/// Serving network side of the mutual-TLS link.
pub async fn connect_tls(
    addr: &str,
    tls: &TlsConfig,
    local: &str,
    peer: &str,
) -> Result<FramedLink<tokio_rustls::client::TlsStream<TcpStream>>, ChannelError> {
    let connector = TlsConnector::from(tls.build_client_config()?);
    let stream = TcpStream::connect(addr).await?;
    let tls_stream = connector.connect(tls.server_name()?, stream).await?;
    tracing::info!("Secure link to {} established with mTLS ({})", peer, addr);
    Ok(framed(tls_stream, local, peer))
}

/// Home network side: accepts one serving network connection.
pub async fn accept_tls(
    listener: &TcpListener,
    acceptor: &TlsAcceptor,
    local: &str,
    peer: &str,
) -> Result<FramedLink<tokio_rustls::server::TlsStream<TcpStream>>, ChannelError> {
    let (stream, remote_addr) = listener.accept().await?;
    let tls_stream = acceptor.accept(stream).await.map_err(|e| {
        tracing::error!("TLS handshake with {} failed: {}", remote_addr, e);
        ChannelError::Io(e)
    })?;
    tracing::info!("Secure link from {} accepted with mTLS ({})", peer, remote_addr);
    Ok(framed(tls_stream, local, peer))
}
