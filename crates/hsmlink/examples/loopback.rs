//! In-process request/response exchange over the memory pair transport.
//!
//! Run with:
//!   cargo run --example loopback

use hsmlink::session::{ClientConfig, ClientSession, ServerConfig, ServerSession};
use hsmlink::transport::mem;
use hsmlink::wire::MAGIC_NATIVE;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (client_end, server_end) = mem::pair();
    let mut client = ClientSession::new(client_end, ClientConfig { client_id: 7 });
    let mut server = ServerSession::new(server_end, ServerConfig::default());
    client.init()?;
    server.init()?;

    let seq = client
        .send_request(MAGIC_NATIVE, 1, b"hello hsm")?
        .expect("request mailbox slot should be free");
    println!("client sent request seq={seq}");

    let mut buf = [0u8; 64];
    let request = server
        .recv_request(&mut buf)?
        .expect("request should be buffered");
    println!(
        "server got kind={} seq={} client_id={} payload={:?}",
        request.kind,
        request.seq,
        request.client_id,
        std::str::from_utf8(&buf[..request.len])?
    );

    // Echo back under the requester's magic with status 0.
    server
        .send_response(request.magic, request.kind, None, 0, &buf[..request.len])?
        .expect("response mailbox slot should be free");

    let mut reply = [0u8; 64];
    let response = client
        .recv_response(&mut reply)?
        .expect("response should be buffered");
    println!(
        "client got seq={} status={} payload={:?}",
        response.seq,
        response.status,
        std::str::from_utf8(&reply[..response.len])?
    );

    client.cleanup()?;
    server.cleanup()?;
    Ok(())
}
