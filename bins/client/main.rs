use order_stream::action::ACTION_COMPLETE;
use order_stream::client::{ClientConnection, ClientId, ClientSink, WsClient};
use order_stream::errors::{CliError, ClientError};
use order_stream::order::Order;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use structopt::StructOpt;

/// Command-line options for the viewer
#[derive(Debug, StructOpt)]
#[structopt(name = "order_client", about = "Live viewer for pizza order updates")]
struct Opt {
    /// Server URL, e.g., ws://127.0.0.1:8080/ws
    #[structopt(short, long, default_value = "ws://127.0.0.1:8080/ws")]
    server_url: String,

    /// Write timeout in milliseconds
    #[structopt(short, long, default_value = "5000")]
    write_timeout_ms: u64,
}

/// Formats one order update for the terminal
fn format_order(order: &Order) -> String {
    format!(
        "[{:?}] {} | {} for {} | {} | {}",
        order.status, order.id, order.pizza, order.customer_name, order.address, order.phone_number
    )
}

/// Builds the JSON payload for a `complete` command
fn complete_payload(order_id: &str) -> String {
    serde_json::json!({ "action": ACTION_COMPLETE, "orderId": order_id }).to_string()
}

/// Prints incoming orders until the connection drops
fn spawn_reader(conn: Arc<WsClient>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        loop {
            match conn.poll_text() {
                Ok(Some(text)) => match serde_json::from_str::<Order>(&text) {
                    Ok(order) => println!("{}", format_order(&order)),
                    Err(_) => println!("? {}", text),
                },
                Ok(None) => continue,
                Err(ClientError::Closed) => {
                    println!("Server closed connection");
                    break;
                }
                Err(e) => {
                    eprintln!("Connection lost: {}", e);
                    break;
                }
            }
        }
    })
}

fn main() -> Result<(), CliError> {
    let opt = Opt::from_args();

    let conn = Arc::new(WsClient::connect(
        ClientId(0),
        &opt.server_url,
        Duration::from_millis(opt.write_timeout_ms),
        Duration::from_millis(100),
    )?);
    println!("Connected to {}", opt.server_url);
    println!("Commands: complete <orderId> | exit");

    let reader = spawn_reader(conn.clone());

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| CliError::GeneralError(e.to_string()))?;
        let mut parts = line.split_whitespace();

        match (parts.next(), parts.next()) {
            (None, _) => {}
            (Some(cmd), _) if cmd.eq_ignore_ascii_case("exit") => break,
            (Some(cmd), Some(order_id)) if cmd.eq_ignore_ascii_case("complete") => {
                conn.send_text(&complete_payload(order_id))?;
            }
            _ => println!("Unknown command: {}", line.trim()),
        }
        io::stdout()
            .flush()
            .map_err(|e| CliError::GeneralError(e.to_string()))?;
    }

    println!("Exiting client.");
    conn.close();
    reader.join().ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_stream::order::OrderStatus;

    #[test]
    fn test_complete_payload() {
        let payload = complete_payload("order_7");
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["action"], "complete");
        assert_eq!(value["orderId"], "order_7");
    }

    #[test]
    fn test_format_order() {
        let order = Order {
            id: "order_1".into(),
            pizza: "Veggie".into(),
            customer_name: "Sam Lee".into(),
            address: "1 Main St".into(),
            phone_number: "(555) 100-0001".into(),
            status: OrderStatus::Done,
            timestamp: "2024-01-01T00:00:00Z".into(),
        };
        let line = format_order(&order);
        assert!(line.starts_with("[Done] order_1"));
        assert!(line.contains("Veggie for Sam Lee"));
    }

    #[test]
    fn test_connect_no_server() {
        let result = WsClient::connect(
            ClientId(0),
            "ws://127.0.0.1:1/ws",
            Duration::from_millis(100),
            Duration::from_millis(100),
        );
        assert!(result.is_err());
    }
}
