// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::net::SocketAddr;

use clap::Parser;

/// Command line options, each with an environment variable fallback.
#[derive(Parser, Debug, Clone)]
#[command(name = "tracker-server", about = "Habit tracker HTTP service")]
pub struct ServerConfig {
    /// SQLite database URL; the file is created when missing.
    #[arg(long, env = "TRACKER_DATABASE_URL", default_value = "sqlite://database/tracker.db")]
    pub database_url: String,

    #[arg(long = "bind", env = "TRACKER_BIND", default_value = "0.0.0.0:3000")]
    pub bind_addr: SocketAddr,

    /// How many change events a slow subscriber may lag behind before it is
    /// told to resync.
    #[arg(long, env = "TRACKER_EVENT_CAPACITY", default_value_t = 64)]
    pub event_capacity: usize,
}
