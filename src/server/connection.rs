//! Per-connection task
//!
//! Drives one client from `hello` to disconnect:
//!
//! 1. Read lines until a `hello` event authenticates the peer
//! 2. Open a live session and answer with `welcome`
//! 3. Multiplex inbound events and the session's outbound queue
//! 4. Leave every room when the socket closes, errors, or idles out

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::live::{LiveService, WatchSession};
use crate::protocol::{next_line, ClientEvent, ServerEvent};
use crate::server::auth::{Authenticator, ConnectionContext, Principal};
use crate::server::config::ServerConfig;
use crate::store::KvStore;

/// Buffered line reader over the read half of a socket
struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    fn new(inner: R, capacity: usize, max_frame_size: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(capacity),
            max_frame_size,
        }
    }

    /// Next non-empty line, or `None` at end of stream
    ///
    /// Cancel safe: bytes already read stay in the buffer.
    async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(line) = next_line(&mut self.buf, self.max_frame_size)? {
                return Ok(Some(line));
            }

            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if !self.buf.is_empty() {
                    tracing::debug!(bytes = self.buf.len(), "Discarding unterminated line at EOF");
                }
                return Ok(None);
            }
        }
    }
}

async fn write_event<W: AsyncWrite + Unpin>(writer: &mut W, event: &ServerEvent) -> Result<()> {
    let frame = event.to_frame()?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// A single client connection
pub struct Connection<T, S: KvStore, A: Authenticator> {
    id: u64,
    io: T,
    peer_addr: SocketAddr,
    config: ServerConfig,
    service: Arc<LiveService<S>>,
    auth: Arc<A>,
}

impl<T, S, A> Connection<T, S, A>
where
    T: AsyncRead + AsyncWrite + Unpin,
    S: KvStore,
    A: Authenticator,
{
    /// Create a new connection
    pub fn new(
        id: u64,
        io: T,
        peer_addr: SocketAddr,
        config: ServerConfig,
        service: Arc<LiveService<S>>,
        auth: Arc<A>,
    ) -> Self {
        Self {
            id,
            io,
            peer_addr,
            config,
            service,
            auth,
        }
    }

    /// Serve the connection until the peer leaves
    ///
    /// A clean close by the peer, or a refused `hello`, is `Ok(())`.
    pub async fn run(self) -> Result<()> {
        let Connection {
            id,
            io,
            peer_addr,
            config,
            service,
            auth,
        } = self;

        let (reader, mut writer) = tokio::io::split(io);
        let mut frames = FrameReader::new(reader, config.read_buffer_size, config.max_frame_size);
        let ctx = ConnectionContext::new(id, peer_addr);

        let hello = tokio::time::timeout(
            config.hello_timeout,
            authenticate(&mut frames, &mut writer, &ctx, auth.as_ref()),
        )
        .await;

        let principal = match hello {
            Ok(Ok(Some(principal))) => principal,
            Ok(Ok(None)) => return Ok(()),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::debug!(conn = id, peer = %peer_addr, "No hello before timeout");
                return Err(Error::HelloTimeout);
            }
        };

        let (mut session, mut outbound) = service.open_session(id, principal.name.clone());

        let result = serve_session(
            &mut frames,
            &mut writer,
            &mut outbound,
            &mut session,
            &service,
            &config,
            principal,
        )
        .await;

        service.close_session(&mut session).await;

        if let Err(Error::Protocol(ref e)) = result {
            // Best effort; the peer may already be gone
            let _ = write_event(&mut writer, &ServerEvent::error(e.to_string())).await;
        }

        result
    }
}

/// Session loop: inbound events, outbound frames and the idle deadline
async fn serve_session<R, W, S>(
    frames: &mut FrameReader<R>,
    writer: &mut W,
    outbound: &mut mpsc::Receiver<Bytes>,
    session: &mut WatchSession,
    service: &LiveService<S>,
    config: &ServerConfig,
    principal: Principal,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: KvStore,
{
    let id = session.id();
    write_event(
        writer,
        &ServerEvent::Welcome {
            principal: principal.name,
            connection: id,
        },
    )
    .await?;

    let idle = tokio::time::sleep(config.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            frame = frames.next_frame() => {
                let Some(line) = frame? else {
                    return Ok(());
                };
                idle.as_mut().reset(Instant::now() + config.idle_timeout);

                let reply = match ClientEvent::parse(&line) {
                    Ok(event) => service.handle(session, event).await,
                    Err(e) => {
                        tracing::debug!(conn = id, error = %e, "Ignoring malformed event");
                        Some(ServerEvent::error(e.to_string()))
                    }
                };

                if let Some(reply) = reply {
                    write_event(writer, &reply).await?;
                }
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    return Ok(());
                };
                writer.write_all(&frame).await?;
                writer.flush().await?;
                idle.as_mut().reset(Instant::now() + config.idle_timeout);
            }
            _ = &mut idle => {
                return Err(Error::IdleTimeout);
            }
        }
    }
}

/// Read events until `hello`; everything before it is refused
async fn authenticate<R, W, A>(
    frames: &mut FrameReader<R>,
    writer: &mut W,
    ctx: &ConnectionContext,
    auth: &A,
) -> Result<Option<Principal>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    A: Authenticator,
{
    loop {
        let Some(line) = frames.next_frame().await? else {
            return Ok(None);
        };

        match ClientEvent::parse(&line) {
            Ok(ClientEvent::Hello { token }) => {
                return match auth.authenticate(ctx, token.as_deref()).await {
                    Some(principal) => {
                        tracing::info!(
                            conn = ctx.connection_id,
                            peer = %ctx.peer_addr,
                            principal = %principal,
                            "Authenticated"
                        );
                        Ok(Some(principal))
                    }
                    None => {
                        tracing::info!(
                            conn = ctx.connection_id,
                            peer = %ctx.peer_addr,
                            "Authentication refused"
                        );
                        write_event(writer, &ServerEvent::error("authentication failed")).await?;
                        Ok(None)
                    }
                };
            }
            Ok(other) => {
                tracing::debug!(
                    conn = ctx.connection_id,
                    event = other.name(),
                    "Event before hello"
                );
                write_event(writer, &ServerEvent::error("not authenticated")).await?;
            }
            Err(e) => {
                write_event(writer, &ServerEvent::error(e.to_string())).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::io::Builder;

    use super::*;
    use crate::server::auth::{AllowAll, StaticTokens};
    use crate::store::MemoryStore;
    use crate::track::{TrackId, TrackRepository};
    use crate::watch::WatchRegistry;

    fn service() -> Arc<LiveService<MemoryStore>> {
        Arc::new(LiveService::new(
            Arc::new(TrackRepository::new(MemoryStore::new())),
            Arc::new(WatchRegistry::new()),
        ))
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_events_before_hello_are_refused() {
        let service = service();
        let mock = Builder::new()
            .read(b"{\"event\":\"list tracks\"}\n")
            .write(b"{\"event\":\"error\",\"data\":{\"message\":\"not authenticated\"}}\n")
            .read(b"{\"event\":\"hello\",\"data\":{\"token\":null}}\n")
            .write(b"{\"event\":\"welcome\",\"data\":{\"principal\":\"anonymous-1\",\"connection\":1}}\n")
            .read(b"{\"event\":\"watch track\",\"data\":{\"trackid\":\"42\"}}\r\n")
            .write(b"{\"event\":\"watching\",\"data\":{\"trackid\":\"42\"}}\n")
            .build();

        let conn = Connection::new(
            1,
            mock,
            peer(),
            ServerConfig::default(),
            Arc::clone(&service),
            Arc::new(AllowAll),
        );
        conn.run().await.unwrap();

        // Disconnect left the room
        assert_eq!(service.registry().room_count().await, 0);
        let stats = service.stats();
        assert_eq!(stats.connections_total, 1);
        assert_eq!(stats.connections_active, 0);
    }

    #[tokio::test]
    async fn test_refused_token_closes_connection() {
        let service = service();
        let mock = Builder::new()
            .read(b"{\"event\":\"hello\",\"data\":{\"token\":\"guess\"}}\n")
            .write(b"{\"event\":\"error\",\"data\":{\"message\":\"authentication failed\"}}\n")
            .build();

        let auth = StaticTokens::new().with_token("s3cret", "sam");
        let conn = Connection::new(
            1,
            mock,
            peer(),
            ServerConfig::default(),
            Arc::clone(&service),
            Arc::new(auth),
        );
        conn.run().await.unwrap();

        assert_eq!(service.stats().connections_total, 0);
    }

    #[tokio::test]
    async fn test_point_split_across_reads() {
        let service = service();
        let mock = Builder::new()
            .read(b"{\"event\":\"hello\",\"data\":{\"token\":\"s3cret\"}}\n")
            .write(b"{\"event\":\"welcome\",\"data\":{\"principal\":\"sam\",\"connection\":3}}\n")
            .read(b"{\"event\":\"watch track\",\"data\":{\"trackid\":\"track:42\"}}\n")
            .write(b"{\"event\":\"watching\",\"data\":{\"trackid\":\"42\"}}\n")
            .read(b"{\"event\":\"new point\",\"data\":{\"lat\":10.0,")
            .read(b"\"lon\":20.0}}\n")
            .build();

        let auth = StaticTokens::new().with_token("s3cret", "sam");
        let conn = Connection::new(
            3,
            mock,
            peer(),
            ServerConfig::default(),
            Arc::clone(&service),
            Arc::new(auth),
        );
        conn.run().await.unwrap();

        let count = service
            .repository()
            .point_count(&TrackId::new("42"))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_hello_timeout() {
        let service = service();
        let (_client, server) = tokio::io::duplex(1024);

        let config = ServerConfig::default().hello_timeout(Duration::from_millis(20));
        let conn = Connection::new(1, server, peer(), config, service, Arc::new(AllowAll));

        assert!(matches!(conn.run().await, Err(Error::HelloTimeout)));
    }

    #[tokio::test]
    async fn test_idle_timeout_closes_session() {
        let service = service();
        let (mut client, server) = tokio::io::duplex(1024);
        client
            .write_all(b"{\"event\":\"hello\",\"data\":{}}\n")
            .await
            .unwrap();

        let config = ServerConfig::default().idle_timeout(Duration::from_millis(20));
        let conn = Connection::new(
            1,
            server,
            peer(),
            config,
            Arc::clone(&service),
            Arc::new(AllowAll),
        );

        assert!(matches!(conn.run().await, Err(Error::IdleTimeout)));
        assert_eq!(service.stats().connections_active, 0);
    }

    #[tokio::test]
    async fn test_oversized_line_is_fatal() {
        let service = service();
        let (mut client, server) = tokio::io::duplex(4096);
        client
            .write_all(b"{\"event\":\"hello\",\"data\":{}}\n")
            .await
            .unwrap();
        client.write_all(&[b'x'; 200]).await.unwrap();

        let config = ServerConfig::default().max_frame_size(100);
        let conn = Connection::new(1, server, peer(), config, service, Arc::new(AllowAll));

        assert!(matches!(
            conn.run().await,
            Err(Error::Protocol(crate::error::ProtocolError::FrameTooLarge { .. }))
        ));
    }
}
