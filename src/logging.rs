// SPDX-FileCopyrightText: 2026 lineot contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Structured logging setup shared by the demo binaries. A thin wrapper
//! around `tracing-subscriber`'s fmt layer, initialized once from `main`.

use time;

use tracing_subscriber::{fmt, FmtSubscriber};

/// Installs the global `tracing` subscriber. `debug` selects `DEBUG` vs
/// `INFO` as the max level, matching the demo binaries' `--debug` flag.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed, or if the
/// local UTC offset cannot be determined at the OS level.
pub fn initialize(debug: bool) {
    let timer = time::format_description::parse("[hour]:[minute]:[second]")
        .expect("Could not create time format description");
    let time_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = fmt::time::OffsetTime::new(time_offset, timer);

    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        // .pretty()
        .with_max_level(level)
        // .with_thread_names(true)
        .with_thread_ids(true)
        .with_timer(timer)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default log subscriber failed");
}
