//! Pipeline stage labels.

use std::fmt;

/// Stages run for every intercepted request, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decode,
    Guard,
    Prepare,
    Forward,
    Headers,
    Body,
    Sweep,
    Respond,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::Guard => "guard",
            Stage::Prepare => "prepare",
            Stage::Forward => "forward",
            Stage::Headers => "headers",
            Stage::Body => "body",
            Stage::Sweep => "sweep",
            Stage::Respond => "respond",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
