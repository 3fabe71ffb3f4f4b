//! CLI tool to issue a caller token for development/testing
//!
//! Usage: TOKEN_SECRET=<secret> cargo run --bin issue-token -- <user> [role...]

use std::env;
use vue_page::{config::AppConfig, token::TokenManager};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <user> [role...]", args[0]);
        std::process::exit(1);
    }

    if env::var("TOKEN_SECRET").is_err() {
        eprintln!("TOKEN_SECRET must be set to the secret of the running server");
        std::process::exit(1);
    }

    let token_manager = TokenManager::new(&AppConfig::get().token.secret);

    match token_manager.create_token(&args[1], &args[2..]) {
        Ok(token) => {
            println!("{token}");
        }
        Err(e) => {
            eprintln!("Failed to create token: {e:#}");
            std::process::exit(1);
        }
    }
}
