use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use super::{MessageHandler, Transport, TransportError};
use crate::dynamo::protocol::Message;
use crate::membership::types::NodeId;

/// Largest inbound message accepted; a full recovery reply must fit.
pub const MAX_MESSAGE_BYTES: u64 = 16 * 1024 * 1024;

/// Sends each message over a fresh TCP connection to `host:<node port>`.
pub struct TcpTransport {
    host: IpAddr,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(host: IpAddr, connect_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            host,
            connect_timeout,
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, to: NodeId, message: &Message) -> Result<(), TransportError> {
        let line = message.encode()?;
        let addr = to.socket_addr(self.host);

        let mut stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::debug!("Connect to {} failed: {}", addr, e);
                return Err(TransportError::Unreachable(to));
            }
            Err(_) => return Err(TransportError::Timeout(to)),
        };

        let write = async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await?;
            stream.shutdown().await
        };
        match tokio::time::timeout(self.connect_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(TransportError::Io { node: to, source }),
            Err(_) => Err(TransportError::Timeout(to)),
        }
    }
}

/// Accepts connections forever, decoding one message per connection and
/// handing it to `handler` on its own task.
pub async fn serve(
    listener: TcpListener,
    handler: Arc<dyn MessageHandler>,
    read_timeout: Duration,
) -> std::io::Result<()> {
    serve_bounded(listener, handler, read_timeout, MAX_MESSAGE_BYTES).await
}

/// `serve` with an explicit cap on the size of one message line.
pub async fn serve_bounded(
    listener: TcpListener,
    handler: Arc<dyn MessageHandler>,
    read_timeout: Duration,
    max_message_bytes: u64,
) -> std::io::Result<()> {
    tracing::info!("Peer listener on {}", listener.local_addr()?);

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        let handler = handler.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(socket.take(max_message_bytes.saturating_add(1)));
            let mut line = String::new();

            match tokio::time::timeout(read_timeout, reader.read_line(&mut line)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!("Read from {} failed: {}", peer, e);
                    return;
                }
                Err(_) => {
                    tracing::warn!("Read from {} timed out", peer);
                    return;
                }
            }

            if line.len() as u64 > max_message_bytes {
                tracing::warn!("Dropping oversized message from {} (over {} bytes)", peer, max_message_bytes);
                return;
            }

            match Message::decode(&line) {
                Ok(message) => handler.on_message(message).await,
                Err(e) => tracing::warn!("Dropping undecodable message from {}: {}", peer, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamo::protocol::Role;
    use tokio::sync::mpsc;

    struct Collector(mpsc::UnboundedSender<Message>);

    #[async_trait]
    impl MessageHandler for Collector {
        async fn on_message(&self, message: Message) {
            let _ = self.0.send(message);
        }
    }

    #[tokio::test]
    async fn test_send_and_serve_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(serve(
            listener,
            Arc::new(Collector(tx)),
            Duration::from_secs(1),
        ));

        let transport = TcpTransport::new("127.0.0.1".parse().unwrap(), Duration::from_secs(1));
        let message = Message::insert(NodeId(1), "k", "v", Role::Replica, 3);
        transport.send(NodeId(port), &message).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, message);
    }

    #[tokio::test]
    async fn test_send_to_closed_port_fails() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let transport = TcpTransport::new("127.0.0.1".parse().unwrap(), Duration::from_millis(200));
        let message = Message::delete(NodeId(1), "k", Role::Replica);
        assert!(transport.send(NodeId(port), &message).await.is_err());
    }

    #[tokio::test]
    async fn test_garbage_is_dropped_without_dispatch() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(serve(
            listener,
            Arc::new(Collector(tx)),
            Duration::from_secs(1),
        ));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"{not json\n").await.unwrap();
        stream.shutdown().await.unwrap();

        let nothing = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_oversized_message_is_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(serve_bounded(
            listener,
            Arc::new(Collector(tx)),
            Duration::from_secs(1),
            256,
        ));

        let transport = TcpTransport::new("127.0.0.1".parse().unwrap(), Duration::from_secs(1));
        let huge = Message::insert(NodeId(1), "k", &"x".repeat(1024), Role::Replica, 1);
        // The listener may reset the connection mid-write; only delivery matters
        let _ = transport.send(NodeId(port), &huge).await;

        let nothing = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(nothing.is_err());

        // Messages under the cap still go through
        let small = Message::insert(NodeId(1), "k", "v", Role::Replica, 1);
        transport.send(NodeId(port), &small).await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, small);
    }
}
