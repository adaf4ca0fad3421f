//! Symmetric TCP lookup client (spec §4.F).

use std::net::{IpAddr, ToSocketAddrs};

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;

use super::{LookupError, FAREWELL_LEN, IPV4_LEN, IPV6_LEN};

/// A connected lookup client, symmetric with `lookup_server`'s framing.
pub struct LookupClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: BufWriter<tokio::net::tcp::OwnedWriteHalf>,
}

impl LookupClient {
    /// Connects to `addr` (e.g. `"127.0.0.1:8888"`).
    pub async fn connect(addr: impl ToSocketAddrs + Send) -> Result<Self, LookupError> {
        let addrs: Vec<_> = addr
            .to_socket_addrs()
            .map_err(LookupError::Io)?
            .collect();
        let addr = addrs
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "no address")))?;
        let socket = TcpStream::connect(addr).await?;
        let (read_half, write_half) = socket.into_split();
        Ok(LookupClient {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }

    /// Looks up `ip`, returning the resolved name or `None` if unknown.
    pub async fn get(&mut self, ip: IpAddr) -> Result<Option<String>, LookupError> {
        let packed = match ip {
            IpAddr::V4(v4) => {
                let mut buf = vec![IPV4_LEN];
                buf.extend_from_slice(&v4.octets());
                buf
            }
            IpAddr::V6(v6) => {
                let mut buf = vec![IPV6_LEN];
                buf.extend_from_slice(&v6.octets());
                buf
            }
        };
        self.writer.write_all(&packed).await?;
        self.writer.flush().await?;

        let mut len_buf = [0u8; 1];
        self.reader.read_exact(&mut len_buf).await?;
        let len = len_buf[0] as usize;
        if len == 0 {
            return Ok(None);
        }

        let mut name_buf = vec![0u8; len];
        self.reader.read_exact(&mut name_buf).await?;
        Ok(Some(String::from_utf8_lossy(&name_buf).into_owned()))
    }

    /// Sends the farewell byte and shuts the connection down.
    pub async fn close(mut self) -> Result<(), LookupError> {
        self.writer.write_all(&[FAREWELL_LEN]).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
