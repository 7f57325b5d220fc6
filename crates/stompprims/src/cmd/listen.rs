use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use stompprims_client::connect;
use tracing::info;

use crate::cmd::ListenArgs;
use crate::exit::{client_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

const POLL: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let timeout = args.broker.timeout()?;
    let conn = connect(args.broker.config(), timeout)
        .map_err(|err| client_error("connect failed", err))?;

    let (tx, rx) = mpsc::channel();
    conn.on_message(move |message| {
        let _ = tx.send(message.clone());
    });
    conn.on_error(|frame| {
        eprintln!(
            "broker error: {}",
            frame.header("message").unwrap_or("(no message)")
        );
    });
    let subscription = conn.subscribe(&args.destination);
    info!(destination = %args.destination, subscription, "listening");

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let message = match rx.recv_timeout(POLL) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        print_message(&message, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    if let Err(err) = conn.disconnect(timeout) {
        info!(%err, "disconnect not confirmed");
    }
    conn.stop();
    conn.join();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
