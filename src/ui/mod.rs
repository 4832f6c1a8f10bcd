//! User interface rendering and input handling.
//!
//! - **target**: the `RenderTarget` trait plus in-memory and plain-text targets
//! - **renderer**: full-screen crossterm viewer with a status bar
//! - **keymapper**: keyboard input to VT byte sequence mapping

pub mod keymapper;
pub mod renderer;
pub mod target;

pub use keymapper::*;
pub use renderer::{Renderer, StatusInfo};
pub use target::*;
