//! Minimal host harness for exercising the verification engine from a
//! terminal, the way `pamtester` exercises a real PAM module. Not part of
//! the library's public contract — see SPEC_FULL.md §4.13.

use std::io::{self, Write};

use pamtotp::engine::options::ModuleOptions;
use pamtotp::{authenticate, Conversation, HostIdentity, Verdict};

struct StdinConversation;

impl Conversation for StdinConversation {
    fn prompt_for_code(&mut self) -> Option<String> {
        print!("Verification code: ");
        io::stdout().flush().ok()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line).ok()?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let username = std::env::var("USER").unwrap_or_else(|_| "demo".to_string());
    let home_dir = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    let uid = nix::unistd::getuid().as_raw();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = ModuleOptions::parse(args.iter().map(String::as_str))?;

    let identity = HostIdentity { username, uid, home_dir };
    let now_secs = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH)?.as_secs();

    match authenticate(&identity, &options, &mut StdinConversation, now_secs) {
        Verdict::Granted => {
            println!("access granted");
            Ok(())
        }
        Verdict::Denied { kind } => {
            println!("access denied ({kind})");
            std::process::exit(1);
        }
    }
}
