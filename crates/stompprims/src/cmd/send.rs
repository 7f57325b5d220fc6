use std::fs;

use stompprims_client::connect;
use stompprims_frame::Headers;
use tracing::warn;

use crate::cmd::SendArgs;
use crate::exit::{client_error, io_error, CliResult, SUCCESS};
use crate::output::{print_send, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = args.broker.timeout()?;
    let body = resolve_body(&args)?;
    let headers: Headers = args.headers.iter().cloned().collect();

    let conn = connect(args.broker.config(), timeout)
        .map_err(|err| client_error("connect failed", err))?;

    let size = body.len();
    let receipt = conn.send_with_headers(&args.destination, body, headers);
    let disconnected = conn.disconnect(timeout);
    let confirmed = !conn.pending_receipts().contains(&receipt.to_string());
    conn.stop();
    conn.join();

    if let Err(err) = disconnected {
        if !confirmed {
            return Err(client_error("disconnect failed", err));
        }
        warn!(%err, "broker did not confirm DISCONNECT");
    }

    print_send(&args.destination, receipt, size, confirmed, format);
    Ok(SUCCESS)
}

fn resolve_body(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}
