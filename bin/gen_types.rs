//! Print TypeScript declarations for the API payload types.
//!
//! Usage: cargo run --bin gen_types --features ts-rs [-- <output.ts>]

use dealscope::forecast::TimelinePhase;
use dealscope::scenario::UsageBreakdownItem;
use dealscope::CreditPricingItem;
use dealscope::TS;

fn main() -> std::io::Result<()> {
    let mut out = String::from("// Generated by gen_types. Do not edit.\n\n");
    for decl in [
        CreditPricingItem::decl(),
        UsageBreakdownItem::decl(),
        TimelinePhase::decl(),
    ] {
        out.push_str("export ");
        out.push_str(&decl);
        out.push_str("\n\n");
    }

    match std::env::args().nth(1) {
        Some(path) => {
            std::fs::write(&path, out)?;
            eprintln!("Wrote {}", path);
        }
        None => print!("{}", out),
    }
    Ok(())
}
