mod command;
mod feeders;
pub mod html;
mod styles;
mod transcript;
mod tui;
mod view;

pub use feeders::spawn_tui_feeders;
pub use tui::{TuiActor, TuiMsg, TuiSettings, restore_terminal};
