use std::io::{self, Write};

use console::style;
use dialoguer::Confirm;

pub fn set_color(enabled: bool) {
    console::set_colors_enabled(enabled);
    console::set_colors_enabled_stderr(enabled);
}

pub fn info(message: &str) {
    let _ = writeln!(io::stderr(), "{}", message);
}

pub fn success(message: &str) {
    let _ = writeln!(io::stderr(), "{}", style(message).green());
}

pub fn warn(message: &str) {
    let _ = writeln!(io::stderr(), "{}", style(message).yellow());
}

pub fn error(message: &str) {
    let _ = writeln!(io::stderr(), "{}", style(message).red());
}

/// Heading for a section of a text report on stdout.
pub fn heading(title: &str) {
    println!("{}", style(title).bold());
}

pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool, dialoguer::Error> {
    if assume_yes {
        return Ok(true);
    }

    Confirm::new().with_prompt(prompt).default(false).interact()
}
