use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hsmlink_session::{ServerConfig, ServerSession, SessionError};
use hsmlink_transport::UnixDgramServer;
use hsmlink_wire::MAX_PAYLOAD;

use crate::cmd::ServeArgs;
use crate::exit::{session_error, CliError, CliResult, SUCCESS};
use crate::output::{byte_order_name, OutputFormat};

/// Request kinds understood by the built-in handler.
pub const KIND_ECHO: u16 = 1;
pub const KIND_IDENTIFY: u16 = 2;

/// Status stamped on replies to any other kind.
pub const STATUS_UNKNOWN_KIND: u16 = 1;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

enum RecvDisposition {
    Drop(SessionError),
    Fatal(CliError),
}

pub fn run(args: ServeArgs, _format: OutputFormat) -> CliResult<i32> {
    let mut session = ServerSession::new(
        UnixDgramServer::new(&args.path),
        ServerConfig::default(),
    );
    session
        .init()
        .map_err(|err| session_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    tracing::info!(path = %args.path.display(), server_id = %args.server_id, "serving");

    let mut payload = vec![0u8; MAX_PAYLOAD];
    while running.load(Ordering::SeqCst) {
        let request = match session.recv_request(&mut payload) {
            Ok(Some(request)) => request,
            Ok(None) => {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(err) => match classify_recv_error(err) {
                RecvDisposition::Drop(err) => {
                    tracing::warn!(error = %err, "dropping packet");
                    continue;
                }
                RecvDisposition::Fatal(cli_err) => return Err(cli_err),
            },
        };

        tracing::info!(
            kind = request.kind,
            seq = request.seq,
            client_id = request.client_id,
            order = byte_order_name(request.magic),
            size = request.len,
            "request"
        );

        let (status, reply) = answer(request.kind, &payload[..request.len], &args.server_id);

        // Reply under the requester's magic so a foreign-order peer reads
        // the header fields natively.
        while session
            .send_response(request.magic, request.kind, None, status, &reply)
            .map_err(|err| session_error("reply failed", err))?
            .is_none()
        {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        if args.once {
            break;
        }
    }

    session
        .cleanup()
        .map_err(|err| session_error("cleanup failed", err))?;
    Ok(SUCCESS)
}

/// Built-in demo handler: echo the payload, identify the server, or
/// reject the kind with a nonzero status and an empty payload.
fn answer(kind: u16, payload: &[u8], server_id: &str) -> (u16, Vec<u8>) {
    match kind {
        KIND_ECHO => (0, payload.to_vec()),
        KIND_IDENTIFY => (0, server_id.as_bytes().to_vec()),
        _ => (STATUS_UNKNOWN_KIND, Vec::new()),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

fn classify_recv_error(err: SessionError) -> RecvDisposition {
    match err {
        // Junk shorter than a header or bigger than the reply buffer came
        // off the wire, not from this process; keep serving.
        SessionError::Malformed { .. } | SessionError::BufferTooSmall { .. } => {
            RecvDisposition::Drop(err)
        }
        err => RecvDisposition::Fatal(session_error("receive failed", err)),
    }
}
