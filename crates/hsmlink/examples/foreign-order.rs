//! Per-packet byte-order negotiation in action.
//!
//! The client stamps the swapped magic, which makes every packet it emits
//! byte-identical to one produced by a host of the opposite byte order.
//! The server never checks: it reads the magic it was given and translates
//! the remaining header fields through it, so the exchange still correlates.
//!
//! Run with:
//!   cargo run --example foreign-order

use hsmlink::session::{ClientConfig, ClientSession, ServerConfig, ServerSession};
use hsmlink::transport::mem;
use hsmlink::wire::{same_byte_order, MAGIC_SWAPPED};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (client_end, server_end) = mem::pair();
    let mut client = ClientSession::new(client_end, ClientConfig { client_id: 0x0102 });
    let mut server = ServerSession::new(server_end, ServerConfig::default());
    client.init()?;
    server.init()?;

    let seq = client
        .send_request(MAGIC_SWAPPED, 0x0304, b"cross-order ping")?
        .expect("request mailbox slot should be free");

    let mut buf = [0u8; 64];
    let request = server
        .recv_request(&mut buf)?
        .expect("request should be buffered");
    println!(
        "server sees a {} packet: kind={:#06x} seq={} client_id={:#06x}",
        if same_byte_order(request.magic) {
            "native-order"
        } else {
            "foreign-order"
        },
        request.kind,
        request.seq,
        request.client_id,
    );
    assert_eq!(request.kind, 0x0304);
    assert_eq!(request.seq, seq);
    assert_eq!(request.client_id, 0x0102);

    // Replying under the request's magic puts the response fields back
    // into the requester's byte order.
    server
        .send_response(request.magic, request.kind, None, 0, &buf[..request.len])?
        .expect("response mailbox slot should be free");

    let mut reply = [0u8; 64];
    let response = client
        .recv_response(&mut reply)?
        .expect("response should be buffered");
    assert_eq!(response.seq, seq);
    println!(
        "client correlated seq={} status={} payload={:?}",
        response.seq,
        response.status,
        std::str::from_utf8(&reply[..response.len])?
    );

    client.cleanup()?;
    server.cleanup()?;
    Ok(())
}
