use std::fs;
use std::time::{Duration, Instant};

use hsmlink_session::{ClientConfig, ClientSession, Response, SessionError};
use hsmlink_transport::{ClientTransport, TransportError, UnixDgramClient};
use hsmlink_wire::{MAGIC_NATIVE, MAX_PAYLOAD};

use crate::cmd::RequestArgs;
use crate::exit::{session_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_reply, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(1);
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(args: RequestArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;
    let payload = resolve_payload(&args)?;
    let deadline = Instant::now() + timeout;

    let mut session = ClientSession::new(
        UnixDgramClient::new(&args.path),
        ClientConfig {
            client_id: args.client_id,
        },
    );
    init_with_deadline(&mut session, deadline)?;

    let seq = loop {
        match session.send_request(MAGIC_NATIVE, args.kind, &payload) {
            Ok(Some(seq)) => break seq,
            Ok(None) => poll_wait(deadline, "send capacity")?,
            Err(err) => return Err(session_error("send failed", err)),
        }
    };
    tracing::debug!(seq, kind = args.kind, size = payload.len(), "request sent");

    let mut reply = vec![0u8; MAX_PAYLOAD];
    let response = await_response(&mut session, seq, &mut reply, deadline)?;

    session
        .cleanup()
        .map_err(|err| session_error("cleanup failed", err))?;

    print_reply(&response, &reply[..response.len], format);
    Ok(if response.status == 0 { SUCCESS } else { FAILURE })
}

/// Poll until the response matching `seq` arrives. The session itself does
/// not correlate sequences, so stale or unsolicited packets are discarded
/// here.
fn await_response<T: ClientTransport>(
    session: &mut ClientSession<T>,
    seq: u16,
    buf: &mut [u8],
    deadline: Instant,
) -> CliResult<Response> {
    loop {
        match session.recv_response(buf) {
            Ok(Some(response)) if response.seq == seq => return Ok(response),
            Ok(Some(response)) => {
                tracing::warn!(
                    seq = response.seq,
                    expected = seq,
                    "discarding uncorrelated response"
                );
            }
            Ok(None) => poll_wait(deadline, "a response")?,
            Err(err) => return Err(session_error("receive failed", err)),
        }
    }
}

fn init_with_deadline(
    session: &mut ClientSession<UnixDgramClient>,
    deadline: Instant,
) -> CliResult<()> {
    loop {
        match session.init() {
            Ok(()) => return Ok(()),
            Err(err) if !is_retryable_connect_error(&err) => {
                return Err(session_error("connect failed", err));
            }
            Err(err) => {
                if Instant::now() >= deadline {
                    return Err(CliError::new(TIMEOUT, format!("connect timed out: {err}")));
                }
                std::thread::sleep(CONNECT_RETRY_INTERVAL);
            }
        }
    }
}

// A server that has not bound its socket yet looks like NotFound or
// ConnectionRefused; anything else is a real failure.
fn is_retryable_connect_error(err: &SessionError) -> bool {
    match err {
        SessionError::Init(TransportError::Connect { source, .. }) => {
            source.kind() == std::io::ErrorKind::NotFound
                || source.kind() == std::io::ErrorKind::ConnectionRefused
        }
        _ => false,
    }
}

fn poll_wait(deadline: Instant, waiting_for: &str) -> CliResult<()> {
    if Instant::now() >= deadline {
        return Err(CliError::new(
            TIMEOUT,
            format!("timed out waiting for {waiting_for}"),
        ));
    }
    std::thread::sleep(POLL_INTERVAL);
    Ok(())
}

fn resolve_payload(args: &RequestArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    Ok(Vec::new())
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "--hex needs an even number of digits"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("--hex is not valid hex: {input}")))
        })
        .collect()
}

fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported timeout unit: {unit}"),
        )),
    }
}
