//! Hook command handler.

use mnemos::cli::{HOOK_DRAIN_TIMEOUT, build_coordinator, hook_handler, run_hook};
use mnemos::config::MnemosConfig;
use mnemos::hooks::empty_response;
use std::io::{self, Read};
use std::sync::Arc;

use super::HookEvent;

/// Hook command.
///
/// Always prints a JSON reply; setup failures are logged and answered with
/// `{}` so the host session carries on.
pub async fn cmd_hook(
    event: HookEvent,
    config: &MnemosConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let event = mnemos::hooks::HookEvent::from(event);
    let input = read_hook_input()?;

    let coordinator = match build_coordinator(config) {
        Ok(coordinator) => Arc::new(coordinator),
        Err(e) => {
            tracing::warn!(hook = event.as_str(), error = %e, "Hook setup failed");
            println!("{}", empty_response());
            return Ok(());
        },
    };

    let handler = hook_handler(event, Arc::clone(&coordinator), config);
    let reply = run_hook(handler.as_ref(), &coordinator, &input, HOOK_DRAIN_TIMEOUT).await;
    println!("{reply}");

    Ok(())
}

/// Reads hook input from stdin.
fn read_hook_input() -> Result<String, Box<dyn std::error::Error>> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    if input.trim().is_empty() {
        Ok("{}".to_string())
    } else {
        Ok(input)
    }
}
