use serde::Serialize;

use hsmlink_session::{ClientConfig, ClientSession, ServerConfig, ServerSession};
use hsmlink_transport::mem;
use hsmlink_wire::MAGIC_NATIVE;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Info,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    schema_id: &'static str,
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(_args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = vec![
        platform_transport_check(),
        temp_dir_writable_check(),
        wire_constants_check(),
        memory_loopback_check(),
        compiled_features_check(),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };

    let output = DoctorOutput {
        schema_id: "https://schemas.3leaps.dev/hsmlink/cli/v1/doctor-report.schema.json",
        checks,
        overall,
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("hsmlink doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<22} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Info => "INFO",
    }
}

fn platform_transport_check() -> CheckResult {
    #[cfg(unix)]
    {
        CheckResult {
            name: "platform_transport".to_string(),
            status: CheckStatus::Pass,
            detail: "Unix datagram sockets available".to_string(),
        }
    }

    #[cfg(not(unix))]
    {
        CheckResult {
            name: "platform_transport".to_string(),
            status: CheckStatus::Fail,
            detail: "no datagram socket backend on this platform".to_string(),
        }
    }
}

fn temp_dir_writable_check() -> CheckResult {
    #[cfg(unix)]
    {
        use std::path::PathBuf;

        use hsmlink_transport::{ServerTransport, UnixDgramServer};

        let dir = PathBuf::from(format!(
            "/tmp/hsmlink-doctor-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default()
        ));
        let _ = std::fs::create_dir_all(&dir);
        let mut server = UnixDgramServer::new(dir.join("doctor.sock"));
        let result = server.init();
        let _ = server.cleanup();
        let _ = std::fs::remove_dir_all(&dir);

        match result {
            Ok(()) => CheckResult {
                name: "temp_dir_writable".to_string(),
                status: CheckStatus::Pass,
                detail: "/tmp datagram socket bind succeeded".to_string(),
            },
            Err(err) => CheckResult {
                name: "temp_dir_writable".to_string(),
                status: CheckStatus::Fail,
                detail: format!("/tmp datagram socket bind failed: {err}"),
            },
        }
    }

    #[cfg(not(unix))]
    {
        CheckResult {
            name: "temp_dir_writable".to_string(),
            status: CheckStatus::Fail,
            detail: "temp socket probe needs datagram socket support".to_string(),
        }
    }
}

fn wire_constants_check() -> CheckResult {
    use hsmlink_wire::{same_byte_order, HEADER_LEN, MAGIC_SWAPPED, MAX_PAYLOAD, MTU};

    let consistent = HEADER_LEN + MAX_PAYLOAD == MTU
        && MAGIC_NATIVE != MAGIC_SWAPPED
        && same_byte_order(MAGIC_NATIVE)
        && !same_byte_order(MAGIC_SWAPPED);

    if consistent {
        CheckResult {
            name: "wire_constants".to_string(),
            status: CheckStatus::Pass,
            detail: format!(
                "header {HEADER_LEN}B + payload {MAX_PAYLOAD}B = mtu {MTU}B, magics distinct"
            ),
        }
    } else {
        CheckResult {
            name: "wire_constants".to_string(),
            status: CheckStatus::Fail,
            detail: "wire constants are inconsistent".to_string(),
        }
    }
}

fn memory_loopback_check() -> CheckResult {
    match memory_loopback() {
        Ok(()) => CheckResult {
            name: "memory_loopback".to_string(),
            status: CheckStatus::Pass,
            detail: "request/response exchange over the memory pair succeeded".to_string(),
        },
        Err(detail) => CheckResult {
            name: "memory_loopback".to_string(),
            status: CheckStatus::Fail,
            detail,
        },
    }
}

fn memory_loopback() -> Result<(), String> {
    let (client_end, server_end) = mem::pair();
    let mut client = ClientSession::new(client_end, ClientConfig { client_id: 1 });
    let mut server = ServerSession::new(server_end, ServerConfig::default());
    client
        .init()
        .map_err(|err| format!("client init failed: {err}"))?;
    server
        .init()
        .map_err(|err| format!("server init failed: {err}"))?;

    let seq = client
        .send_request(MAGIC_NATIVE, 1, b"ping")
        .map_err(|err| format!("send failed: {err}"))?
        .ok_or("request slot unexpectedly occupied")?;

    let mut buf = [0u8; 16];
    let request = server
        .recv_request(&mut buf)
        .map_err(|err| format!("server receive failed: {err}"))?
        .ok_or("request not delivered")?;

    server
        .send_response(request.magic, request.kind, None, 0, &buf[..request.len])
        .map_err(|err| format!("reply failed: {err}"))?
        .ok_or("response slot unexpectedly occupied")?;

    let mut reply = [0u8; 16];
    let response = client
        .recv_response(&mut reply)
        .map_err(|err| format!("client receive failed: {err}"))?
        .ok_or("response not delivered")?;

    if response.seq != seq || &reply[..response.len] != b"ping" {
        return Err("echoed reply did not match the request".to_string());
    }
    Ok(())
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "cli") {
        features.push("cli");
    }

    CheckResult {
        name: "compiled_features".to_string(),
        status: CheckStatus::Info,
        detail: features.join(", "),
    }
}
