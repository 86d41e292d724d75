//! Status output for wsconnect
//!
//! Everything here goes to stderr so stdout carries only received messages.

use colored::Colorize;

/// Print the line shown once the WebSocket is open
pub fn print_connected(target: &str, proxy: &str, silent: bool) {
    if silent {
        return;
    }

    eprintln!(
        "{} {} {} {}",
        "Connected".green().bold(),
        target.white().bold(),
        "via".truecolor(150, 150, 150),
        proxy.truecolor(150, 150, 150)
    );
}

/// Print the line shown after the session ends
pub fn print_closed(received: usize, silent: bool) {
    if silent {
        return;
    }

    let noun = if received == 1 { "message" } else { "messages" };
    eprintln!(
        "{} {}",
        "Closed".yellow().bold(),
        format!("({} {} received)", received, noun).truecolor(150, 150, 150)
    );
}
