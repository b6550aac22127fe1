// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

pub mod api;
pub mod assets;
pub mod channel;
pub mod config;
pub mod m3u;
pub mod player;
pub mod server;
pub mod session;
pub mod state;
pub mod timer;
pub mod tui;
pub mod view;

pub use channel::Channel;
pub use config::Config;
pub use session::SessionManager;
pub use tui::run_tui;
