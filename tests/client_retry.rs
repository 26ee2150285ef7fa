#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Retry exhaustion: a client talking to a server that never answers must
//! resend HELLO a bounded number of times, then give up with a GOODBYE and
//! terminate instead of waiting forever.

use std::io;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use uap_protocol::config::ClientConfig;
use uap_protocol::core::message::{Command, Message};
use uap_protocol::protocol::client::Client;

#[tokio::test]
async fn hello_retry_exhaustion_terminates_with_goodbye() {
    // Bound but never reply.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server = silent.local_addr().unwrap();

    let max_retries = 2;
    let config = ClientConfig {
        address: server.to_string(),
        response_timeout: Duration::from_millis(80),
        max_retries,
    };
    let input = tokio_stream::iter(Vec::<io::Result<String>>::new());

    let client = Client::connect(1234, input, config).await.unwrap();
    let run = tokio::spawn(client.run());

    // Initial HELLO plus one resend per tolerated timeout, then GOODBYE.
    let mut received = Vec::new();
    let mut buf = [0u8; 2048];
    for _ in 0..(max_retries + 2) {
        let (n, _) = timeout(Duration::from_secs(2), silent.recv_from(&mut buf))
            .await
            .expect("client stopped sending early")
            .unwrap();
        received.push(Message::from_bytes(&buf[..n]).unwrap());
    }

    timeout(Duration::from_secs(2), run)
        .await
        .expect("client must terminate after exhausting retries")
        .unwrap()
        .unwrap();

    assert_eq!(received.len() as u32, max_retries + 2);
    let (goodbye, hellos) = received.split_last().unwrap();
    for hello in hellos {
        assert_eq!(hello.header.command, Command::Hello);
        assert_eq!(hello.header.sequence, 0);
        assert_eq!(hello.header.session_id, 1234);
    }
    assert_eq!(goodbye.header.command, Command::Goodbye);
    assert_eq!(goodbye.header.session_id, 1234);

    // Nothing after the GOODBYE: the machine never re-enters HELLO_WAIT.
    assert!(
        timeout(Duration::from_millis(300), silent.recv_from(&mut buf))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn server_goodbye_closes_the_client_immediately() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server = socket.local_addr().unwrap();

    let config = ClientConfig {
        address: server.to_string(),
        response_timeout: Duration::from_secs(2),
        max_retries: 3,
    };
    let input = tokio_stream::iter(Vec::<io::Result<String>>::new());
    let client = Client::connect(55, input, config).await.unwrap();
    let run = tokio::spawn(client.run());

    // Receive the HELLO, answer with GOODBYE instead of HELLO.
    let mut buf = [0u8; 2048];
    let (n, peer) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let hello = Message::from_bytes(&buf[..n]).unwrap();
    assert_eq!(hello.header.command, Command::Hello);

    socket
        .send_to(&Message::goodbye(55, 0, 1).to_bytes(), peer)
        .await
        .unwrap();

    // The client closes from HELLO_WAIT without sending anything further.
    timeout(Duration::from_secs(2), run)
        .await
        .expect("client must close on server GOODBYE")
        .unwrap()
        .unwrap();
    assert!(
        timeout(Duration::from_millis(300), socket.recv_from(&mut buf))
            .await
            .is_err()
    );
}
