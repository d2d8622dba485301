//! Async Client
//!
//! A small tokio client for the pollkv protocol. It is used by the
//! command-line tool and by the server's end-to-end tests.
//!
//! Requests are written whole; responses are read into a buffer until the
//! codec reports a complete frame.
//!
//! # Example
//!
//! ```no_run
//! use pollkv::client::Client;
//!
//! # async fn demo() -> Result<(), pollkv::client::ClientError> {
//! let mut client = Client::connect("127.0.0.1:1234").await?;
//! client.set("name", "Ariz").await?;
//! assert_eq!(client.get("name").await?.as_deref(), Some(&b"Ariz"[..]));
//! # Ok(())
//! # }
//! ```

use crate::protocol::{decode_response, encode_request_into, ProtocolError, Response, Status};
use bytes::{Buf, Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Initial capacity of the response buffer
const READ_BUFFER_SIZE: usize = 4096;

/// Errors returned by [`Client`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server closed the connection before a full response arrived
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// The server answered with the ERROR status
    #[error("Server error: {0}")]
    Server(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// A connection to a pollkv server.
pub struct Client {
    stream: TcpStream,
    buffer: BytesMut,
}

impl Client {
    /// Connects to a server.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
        })
    }

    /// Sends one request and waits for its response.
    ///
    /// An ERROR status is returned as a normal [`Response`], not as an `Err`.
    pub async fn send<A: AsRef<[u8]>>(&mut self, args: &[A]) -> ClientResult<Response> {
        let mut frame = BytesMut::new();
        encode_request_into(args, &mut frame)?;
        self.stream.write_all(&frame).await?;

        self.read_response().await
    }

    /// Writes every request in a single write, then reads one response per
    /// request, in order.
    pub async fn pipeline<A: AsRef<[u8]>>(
        &mut self,
        requests: &[Vec<A>],
    ) -> ClientResult<Vec<Response>> {
        let mut frames = BytesMut::new();
        for args in requests {
            encode_request_into(args, &mut frames)?;
        }
        self.stream.write_all(&frames).await?;

        let mut responses = Vec::with_capacity(requests.len());
        for _ in requests {
            responses.push(self.read_response().await?);
        }
        Ok(responses)
    }

    /// GET: `None` when the key does not exist.
    pub async fn get(&mut self, key: impl AsRef<[u8]>) -> ClientResult<Option<Bytes>> {
        let response = self.send(&[b"GET".as_slice(), key.as_ref()]).await?;
        match response.status {
            Status::Ok => Ok(Some(response.payload)),
            Status::NotFound => Ok(None),
            Status::Error => Err(server_error(response)),
        }
    }

    /// SET: stores `value` under `key`.
    pub async fn set(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> ClientResult<()> {
        let response = self
            .send(&[b"SET".as_slice(), key.as_ref(), value.as_ref()])
            .await?;
        expect_ok(response)
    }

    /// DEL: succeeds whether or not the key existed.
    pub async fn del(&mut self, key: impl AsRef<[u8]>) -> ClientResult<()> {
        let response = self.send(&[b"DEL".as_slice(), key.as_ref()]).await?;
        expect_ok(response)
    }

    /// Reads the next response frame from the socket.
    pub async fn read_response(&mut self) -> ClientResult<Response> {
        loop {
            if let Some((response, consumed)) = decode_response(&self.buffer)? {
                self.buffer.advance(consumed);
                return Ok(response);
            }

            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                return Err(ClientError::ConnectionClosed);
            }
        }
    }

    /// Writes raw bytes to the socket, bypassing the encoder.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> ClientResult<()> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }
}

fn expect_ok(response: Response) -> ClientResult<()> {
    match response.status {
        Status::Ok => Ok(()),
        _ => Err(server_error(response)),
    }
}

fn server_error(response: Response) -> ClientError {
    ClientError::Server(String::from_utf8_lossy(&response.payload).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_request, encode_response};
    use tokio::net::TcpListener;

    /// A one-connection fake server that replies with canned frames.
    async fn fake_server(
        replies: Vec<Bytes>,
    ) -> (std::net::SocketAddr, tokio::task::JoinHandle<Vec<Vec<Bytes>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = BytesMut::new();
            let mut seen = Vec::new();

            for reply in replies {
                let args = loop {
                    if let Some((args, consumed)) = decode_request(&buf).unwrap() {
                        buf.advance(consumed);
                        break args;
                    }
                    assert!(socket.read_buf(&mut buf).await.unwrap() > 0);
                };
                seen.push(args);
                socket.write_all(&reply).await.unwrap();
            }
            seen
        });

        (addr, handle)
    }

    #[tokio::test]
    async fn test_get_maps_statuses() {
        let (addr, server) = fake_server(vec![
            encode_response(Status::Ok, b"bar").unwrap(),
            encode_response(Status::NotFound, b"").unwrap(),
            encode_response(Status::Error, b"ERR boom").unwrap(),
        ])
        .await;

        let mut client = Client::connect(addr).await.unwrap();
        assert_eq!(client.get("foo").await.unwrap(), Some(Bytes::from("bar")));
        assert_eq!(client.get("foo").await.unwrap(), None);
        match client.get("foo").await {
            Err(ClientError::Server(msg)) => assert_eq!(msg, "ERR boom"),
            other => panic!("expected server error, got {:?}", other),
        }

        let seen = server.await.unwrap();
        assert_eq!(seen[0], vec![Bytes::from("GET"), Bytes::from("foo")]);
    }

    #[tokio::test]
    async fn test_set_sends_three_args() {
        let (addr, server) = fake_server(vec![encode_response(Status::Ok, b"").unwrap()]).await;

        let mut client = Client::connect(addr).await.unwrap();
        client.set("k", "v").await.unwrap();

        let seen = server.await.unwrap();
        assert_eq!(
            seen[0],
            vec![Bytes::from("SET"), Bytes::from("k"), Bytes::from("v")]
        );
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut client = Client::connect(addr).await.unwrap();
        let result = client.read_response().await;
        assert!(matches!(
            result,
            Err(ClientError::ConnectionClosed) | Err(ClientError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_request_rejected_locally() {
        let (addr, _server) = fake_server(vec![]).await;

        let mut client = Client::connect(addr).await.unwrap();
        let big = vec![b'x'; 5000];
        let result = client.send(&[b"SET".as_slice(), b"k", big.as_slice()]).await;
        assert!(matches!(result, Err(ClientError::Protocol(_))));
    }
}
