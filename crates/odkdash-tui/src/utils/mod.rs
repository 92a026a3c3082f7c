//! Utility functions for formatting values and drawing text-mode plots.

pub mod format;

pub use format::{
    box_line, density_strip, format_number, format_optional, share_bar, truncate_string,
};
