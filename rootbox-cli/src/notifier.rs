//! Terminal front end for flash notifications.

use rootbox_core::{Notice, Notifier};
use std::io::{self, BufRead, Write};

pub struct ConsoleNotifier {
    assume_yes: bool,
}

impl ConsoleNotifier {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Notifier for ConsoleNotifier {
    fn progress(&self, label: &str) {
        log::info!("{}", label);
    }

    fn notify(&self, notice: &Notice) {
        eprintln!("{}", notice);
    }

    fn offer_reboot(&self) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("Installation complete. Reboot now? [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(err) => {
                log::warn!("cannot read answer: {}", err);
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
