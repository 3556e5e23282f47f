//! Version command implementation.

/// Execute the version command.
pub fn execute() {
    let build = if cfg!(debug_assertions) {
        "dev"
    } else {
        "release"
    };
    println!("cms-migrate {} ({build})", env!("CARGO_PKG_VERSION"));
}
