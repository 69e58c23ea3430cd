//! Debug visualization hooks.
//!
//! The AI draws through a [`DebugSink`] supplied by the host, so it never
//! depends on a renderer. [`RecordingSink`] keeps the calls for tests and
//! headless dumps.

use glam::Vec2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugColor {
    White,
    Green,
    Yellow,
    Orange,
    Red,
    Blue,
}

pub trait DebugSink {
    fn text(&mut self, at: Vec2, text: &str, color: DebugColor);
    fn line(&mut self, from: Vec2, to: Vec2, color: DebugColor);
    fn rect(&mut self, min: Vec2, max: Vec2, color: DebugColor);
}

#[derive(Clone, Debug, PartialEq)]
pub enum DebugCommand {
    Text {
        at: Vec2,
        text: String,
        color: DebugColor,
    },
    Line {
        from: Vec2,
        to: Vec2,
        color: DebugColor,
    },
    Rect {
        min: Vec2,
        max: Vec2,
        color: DebugColor,
    },
}

/// Sink that stores every call
#[derive(Default, Debug)]
pub struct RecordingSink {
    pub commands: Vec<DebugCommand>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DebugCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl DebugSink for RecordingSink {
    fn text(&mut self, at: Vec2, text: &str, color: DebugColor) {
        self.commands.push(DebugCommand::Text {
            at,
            text: text.to_owned(),
            color,
        });
    }

    fn line(&mut self, from: Vec2, to: Vec2, color: DebugColor) {
        self.commands.push(DebugCommand::Line { from, to, color });
    }

    fn rect(&mut self, min: Vec2, max: Vec2, color: DebugColor) {
        self.commands.push(DebugCommand::Rect { min, max, color });
    }
}
