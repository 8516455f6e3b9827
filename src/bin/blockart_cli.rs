// blockart-cli — thin JSON-RPC client for a running ink-miner.
//
// Usage: blockart-cli <method> [params...]

use std::env;

use colored::*;

fn print_usage() {
    println!("{}", "  ___ _            _       _         _   ".bright_magenta());
    println!("{}", " | _ ) |___  __ _ | |__   /_\\  _ _ __| |_ ".bright_magenta());
    println!("{}", " | _ \\ / _ \\/ _` | | / /  / _ \\| '_/ _|  _|".bright_magenta().bold());
    println!("{}", " |___/_\\___/\\__,_|_|_\\_\\ /_/ \\_\\_| \\__|\\__|".bright_magenta().bold());
    println!();
    println!("{}", "  Usage: blockart-cli <command> [args...]".bright_yellow().bold());
    println!();
    println!("{}", "  Commands:".bright_white().bold());
    println!("  {} {:<46} {}", "❯".bright_black(), "open_canvas".bright_green(), "Get the canvas bounds".white());
    println!(
        "  {} {:<46} {}",
        "❯".bright_black(),
        "add_shape <validate_num> <d> <fill> <stroke>".bright_green(),
        "Draw a shape".white()
    );
    println!(
        "  {} {:<46} {}",
        "❯".bright_black(),
        "delete_shape <validate_num> <shape_hash>".bright_green(),
        "Erase a shape".white()
    );
    println!("  {} {:<46} {}", "❯".bright_black(), "get_ink".bright_green(), "Get remaining ink".white());
    println!(
        "  {} {:<46} {}",
        "❯".bright_black(),
        "get_svg_string <shape_hash>".bright_green(),
        "Get a shape's SVG fragment".white()
    );
    println!(
        "  {} {:<46} {}",
        "❯".bright_black(),
        "get_shapes <block_hash>".bright_green(),
        "List shape hashes added in a block".white()
    );
    println!("  {} {:<46} {}", "❯".bright_black(), "get_genesis_block".bright_green(), "Get the genesis block hash".white());
    println!(
        "  {} {:<46} {}",
        "❯".bright_black(),
        "get_children <block_hash>".bright_green(),
        "List a block's children".white()
    );
    println!("  {} {:<46} {}", "❯".bright_black(), "close_canvas".bright_green(), "Disconnect".white());
    println!();
}

fn load_auth_token(data_dir: &str) -> Option<String> {
    std::fs::read_to_string(std::path::Path::new(data_dir).join("rpc.cookie"))
        .ok()
        .map(|s| s.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let method = &args[1];
    let params: Vec<serde_json::Value> = args[2..]
        .iter()
        .map(|arg| {
            if let Ok(n) = arg.parse::<u64>() {
                serde_json::json!(n)
            } else {
                serde_json::json!(arg)
            }
        })
        .collect();

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let rpc_port = std::env::var("BLOCKART_RPC_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(blockart::config::RPC_PORT);
    let data_dir = std::env::var("BLOCKART_DATA_DIR").unwrap_or_else(|_| blockart::config::default_data_dir().to_string_lossy().into_owned());

    let token = load_auth_token(&data_dir).unwrap_or_else(|| {
        eprintln!(
            "{} no RPC auth token found at {}/rpc.cookie — is ink-miner running?",
            "error:".bright_red().bold(),
            data_dir
        );
        std::process::exit(1);
    });

    let addr = format!("{}:{}", blockart::config::RPC_BIND_ADDRESS, rpc_port);
    let mut stream = match TcpStream::connect(&addr).await {
        Ok(s) => s,
        Err(_) => {
            eprintln!("{} cannot connect to ink-miner at {}", "error:".bright_red().bold(), addr);
            eprintln!("Is the daemon running? Start it with: {}", "ink-miner".bright_yellow().bold());
            std::process::exit(1);
        }
    };

    let request_body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1,
    });

    let body = serde_json::to_string(&request_body)?;
    let http_request = format!(
        "POST / HTTP/1.1\r\nHost: 127.0.0.1\r\nAuthorization: Bearer {token}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body,
    );

    stream.write_all(http_request.as_bytes()).await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    let response_str = String::from_utf8_lossy(&response);

    if let Some(body_start) = response_str.find("\r\n\r\n") {
        let json_body = &response_str[body_start + 4..];
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(json_body) {
            if let Some(result) = parsed.get("result") {
                println!("{}", serde_json::to_string_pretty(result)?.bright_white());
            } else if let Some(error) = parsed.get("error") {
                eprintln!("{} {}", "Error:".bright_red().bold(), serde_json::to_string_pretty(error)?);
            }
        } else {
            println!("{}", json_body);
        }
    }

    Ok(())
}
