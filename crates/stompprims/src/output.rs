use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use stompprims_client::Message;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    destination: &'a str,
    message_id: Option<&'a str>,
    subscription: Option<&'a str>,
    headers: Vec<(&'a str, &'a str)>,
    body_size: usize,
    body: String,
    timestamp: String,
}

pub fn print_message(message: &Message, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                destination: &message.destination,
                message_id: message.headers.get("message-id"),
                subscription: message.headers.get("subscription"),
                headers: message.headers.iter().collect(),
                body_size: message.body.len(),
                body: body_preview(message.body.as_ref()),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DESTINATION", "MESSAGE-ID", "SIZE", "BODY"])
                .add_row(vec![
                    message.destination.clone(),
                    message.headers.get("message-id").unwrap_or("-").to_string(),
                    message.body.len().to_string(),
                    body_preview(message.body.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "destination={} message-id={} size={} body={}",
                message.destination,
                message.headers.get("message-id").unwrap_or("-"),
                message.body.len(),
                body_preview(message.body.as_ref())
            );
        }
        OutputFormat::Raw => {
            print_raw(message.body.as_ref());
        }
    }
}

#[derive(Serialize)]
struct SendOutput<'a> {
    destination: &'a str,
    receipt: u64,
    body_size: usize,
    confirmed: bool,
}

pub fn print_send(destination: &str, receipt: u64, body_size: usize, confirmed: bool, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SendOutput {
                destination,
                receipt,
                body_size,
                confirmed,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DESTINATION", "RECEIPT", "SIZE", "CONFIRMED"])
                .add_row(vec![
                    destination.to_string(),
                    receipt.to_string(),
                    body_size.to_string(),
                    confirmed.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!(
                "destination={destination} receipt={receipt} size={body_size} confirmed={confirmed}"
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn body_preview(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", body.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
