//! TCP lookup endpoint (spec §4.E): one task per accepted connection,
//! answering length-prefixed lookup requests from the reverse store.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};

use super::{LookupError, FAREWELL_LEN, IPV4_LEN, IPV6_LEN, MAX_REPLY_NAME_LEN};
use crate::store::Store;

/// Accepts connections on `listener` until it errs, spawning one task per
/// connection that serves requests against `store`.
pub async fn serve_lookup(listener: TcpListener, store: Arc<Store>) -> std::io::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(socket, &store).await {
                tracing::debug!(%peer, error = %err, "lookup connection ended");
            }
        });
    }
}

async fn handle_connection(socket: TcpStream, store: &Store) -> Result<(), LookupError> {
    let (read_half, write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);

    loop {
        let mut len_buf = [0u8; 1];
        if reader.read_exact(&mut len_buf).await.is_err() {
            return Ok(()); // peer hung up without a farewell byte
        }
        let len = len_buf[0];

        if len == FAREWELL_LEN {
            return Ok(());
        }

        let ip = read_ip(&mut reader, len).await?;
        let reply = store.get(ip)?;
        write_reply(&mut writer, reply.as_deref()).await?;
    }
}

async fn read_ip<R>(reader: &mut R, len: u8) -> Result<IpAddr, LookupError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match len {
        IPV4_LEN => {
            let mut octets = [0u8; 4];
            reader.read_exact(&mut octets).await?;
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        IPV6_LEN => {
            let mut octets = [0u8; 16];
            reader.read_exact(&mut octets).await?;
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        other => Err(LookupError::BadAddressLength(other)),
    }
}

async fn write_reply<W>(writer: &mut W, name: Option<&str>) -> Result<(), LookupError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    match name {
        None => {
            writer.write_all(&[0u8]).await?;
        }
        Some(name) => {
            let bytes = name.as_bytes();
            let truncated = if bytes.len() > MAX_REPLY_NAME_LEN {
                tracing::warn!(name, len = bytes.len(), "truncating oversize reply name");
                &bytes[..MAX_REPLY_NAME_LEN]
            } else {
                bytes
            };
            writer.write_all(&[truncated.len() as u8]).await?;
            writer.write_all(truncated).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}
