//! Integration tests for the TCP transport.
//!
//! These spin up a real listener on an ephemeral port and talk to it
//! with a plain `TcpStream`, the same way a terminal client would.

use parley_transport::{TcpTransport, Transport};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_tcp_accept_and_exchange_lines() {
    let mut transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("should have local addr");

    let server_handle = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });

    let client = TcpStream::connect(addr).await.expect("should connect");
    let client_addr = client.local_addr().expect("client addr");
    let conn = server_handle.await.expect("task should complete");

    assert!(conn.id().into_inner() > 0);
    assert_eq!(conn.peer_addr(), client_addr);

    let (mut reader, mut writer) = conn.into_split();
    let (client_read, mut client_write) = client.into_split();
    let mut client_read = BufReader::new(client_read);

    // --- Server sends, client receives ---
    writer
        .send_line("hello from server")
        .await
        .expect("send should succeed");
    let mut line = String::new();
    client_read.read_line(&mut line).await.expect("client read");
    assert_eq!(line, "hello from server\n");

    // --- Client sends, server receives ---
    client_write
        .write_all(b"hello from client\r\n")
        .await
        .expect("client write");
    let received = reader
        .next_line()
        .await
        .expect("recv should succeed")
        .expect("should have a line");
    assert_eq!(received, "hello from client");
}

#[tokio::test]
async fn test_tcp_next_line_returns_none_on_client_close() {
    let mut transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("should have local addr");

    let server_handle = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });

    let client = TcpStream::connect(addr).await.expect("should connect");
    let conn = server_handle.await.expect("task should complete");
    let (mut reader, _writer) = conn.into_split();

    drop(client);

    let result = reader.next_line().await.expect("recv should not error");
    assert!(result.is_none(), "should return None on client close");
}

#[tokio::test]
async fn test_tcp_connection_ids_are_unique() {
    let mut transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("should have local addr");

    let _a = TcpStream::connect(addr).await.expect("connect a");
    let _b = TcpStream::connect(addr).await.expect("connect b");

    let first = transport.accept().await.expect("accept a");
    let second = transport.accept().await.expect("accept b");
    assert_ne!(first.id(), second.id());
}

#[tokio::test]
async fn test_tcp_bind_conflict_is_bind_error() {
    let transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("local addr").to_string();

    let err = match TcpTransport::bind(&addr).await {
        Ok(_) => panic!("second bind on {addr} should fail"),
        Err(err) => err,
    };
    assert!(matches!(err, parley_transport::TransportError::Bind { .. }));
}
