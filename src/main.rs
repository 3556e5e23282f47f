//! `cms-migrate` - Export and import CMS content between instances.
//!
//! Exports bundle entries and their media into a `.tar.gz`; imports
//! deduplicate media by hash and remap media ids in the destination.

use cms_migrate::run;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
