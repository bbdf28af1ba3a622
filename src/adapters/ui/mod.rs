pub mod banner;
pub mod cli;
pub mod progress;
pub mod report;
pub mod tui;

/// Prints the welcome banner. Call once at startup, for interactive runs only.
pub fn init_ui(title: &str) {
    banner::print_welcome(title);
}
