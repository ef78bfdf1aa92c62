//! Print a bcrypt hash for ADMIN_HASH_PASSWORD.

use bcrypt::{hash, DEFAULT_COST};
use std::env;

fn main() {
    let password = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: hash-password <PASSWORD>");
        std::process::exit(1);
    });

    if password.is_empty() {
        eprintln!("Password must not be empty");
        std::process::exit(1);
    }

    match hash(&password, DEFAULT_COST) {
        Ok(hashed) => {
            println!("# Admin login for portfolio-cms (bcrypt cost {})", DEFAULT_COST);
            println!("ADMIN_HASH_PASSWORD={}", hashed);
        }
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    }
}
