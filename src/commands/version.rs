//! Command: print version information.

/// Version stamped by `build.rs`, falling back to the crate version.
#[must_use]
pub const fn version() -> &'static str {
    match option_env!("DOTFILES_VERSION") {
        Some(version) => version,
        None => env!("CARGO_PKG_VERSION"),
    }
}

/// Print the dotfiles version to stdout.
pub fn run() {
    println!("dotfiles {}", version());
}
