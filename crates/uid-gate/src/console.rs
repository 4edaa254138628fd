use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use admin_commands::{dispatch, COMMANDS};
use whitelist_store::WhitelistStore;

/// Start the admin console on its own OS thread, reading commands from
/// stdin until it is closed or `exit` is entered.
pub fn spawn(store: Arc<WhitelistStore>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("admin-console".to_string())
        .spawn(move || {
            info!("admin console ready; type `help` for commands");
            let stdin = io::stdin();
            let stdout = io::stdout();
            if let Err(err) = run(&store, stdin.lock(), stdout.lock()) {
                warn!(%err, "admin console stopped");
            }
        })
}

/// Read one command per line from `input` and write each reply to `output`.
pub fn run<R: BufRead, W: Write>(
    store: &WhitelistStore,
    input: R,
    mut output: W,
) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            continue;
        };
        let name = name.trim_start_matches('/');
        let argument = parts.next();

        match name {
            "help" => write_help(&mut output)?,
            "exit" | "quit" => break,
            _ => match dispatch(store, name, argument) {
                Ok(reply) => writeln!(output, "{reply}")?,
                Err(err) => writeln!(output, "error: {err} (type `help` for commands)")?,
            },
        }
        output.flush()?;
    }
    Ok(())
}

fn write_help<W: Write>(output: &mut W) -> io::Result<()> {
    writeln!(output, "Commands:")?;
    for command in COMMANDS {
        writeln!(output, "  {:<16} {}", command.usage(), command.description)?;
    }
    writeln!(output, "  {:<16} Stop the console", "exit")
}
