//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout, status bar, overlays
//! - `input`: keyboard handling
//! - `styles`: colors and text styles
//! - `tabs`: Data, Summary and Charts tab content

pub mod input;
pub mod render;
pub mod styles;
pub mod tabs;
