//! Intervals command implementation.

use crate::display::format_duration;
use candela_lib::prelude::*;

/// Print every supported interval with its duration.
pub(crate) fn list_intervals() {
    println!("{:<10} {:>10} {:>12}", "INTERVAL", "SECONDS", "DURATION");
    println!("{}", "-".repeat(34));

    for interval in Interval::all() {
        println!(
            "{:<10} {:>10} {:>12}",
            interval.as_str(),
            interval.seconds(),
            format_duration(interval.seconds()),
        );
    }

    println!("\nTotal: {} intervals", Interval::all().len());
}
