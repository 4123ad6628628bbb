//! Run with: cargo run --package server --bin generate-types --features typescript

use std::fs;
use std::path::Path;

fn main() {
    println!("Generating TypeScript types...");

    let out_dir = Path::new("bindings");

    if let Err(e) = fs::create_dir_all(out_dir) {
        eprintln!("Failed to create output directory: {}", e);
        std::process::exit(1);
    }

    #[cfg(feature = "typescript")]
    {
        use ts_rs::TS;

        events::Level::export_all_to(out_dir).expect("Failed to export Level");
        events::ProgressEvent::export_all_to(out_dir).expect("Failed to export ProgressEvent");

        phasestream_core::PreconditionRef::export_all_to(out_dir)
            .expect("Failed to export PreconditionRef");
        phasestream_core::PhaseEntry::export_all_to(out_dir).expect("Failed to export PhaseEntry");
        phasestream_core::PhaseRegistry::export_all_to(out_dir)
            .expect("Failed to export PhaseRegistry");

        orchestrator::TestRunRequest::export_all_to(out_dir)
            .expect("Failed to export TestRunRequest");
    }

    println!("TypeScript types generated in {}", out_dir.display());
}
