//! Semantic color palette.

use owo_colors::{OwoColorize, Style};

/// Styling by meaning rather than by color.
pub trait SemanticStyle {
    fn success(&self) -> String;
    fn error(&self) -> String;
    fn warning(&self) -> String;
    fn muted(&self) -> String;
    fn header(&self) -> String;
}

fn paint<T: std::fmt::Display + ?Sized>(value: &T, style: Style) -> String {
    if super::no_color() {
        value.to_string()
    } else {
        value.style(style).to_string()
    }
}

impl<T: std::fmt::Display + ?Sized> SemanticStyle for T {
    fn success(&self) -> String {
        paint(self, Style::new().green().bold())
    }

    fn error(&self) -> String {
        paint(self, Style::new().red().bold())
    }

    fn warning(&self) -> String {
        paint(self, Style::new().yellow())
    }

    fn muted(&self) -> String {
        paint(self, Style::new().dimmed())
    }

    fn header(&self) -> String {
        paint(self, Style::new().bold())
    }
}
