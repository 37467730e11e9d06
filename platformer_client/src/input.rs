//! Input handling.
//!
//! A windowing layer would sample key state every frame. The core only needs
//! the per-frame movement intent and a way to learn that the user quit.

use platformer_shared::physics::MoveIntent;

/// User input state at a moment in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

impl InputState {
    pub fn intent(self) -> MoveIntent {
        MoveIntent {
            left: self.left,
            right: self.right,
            jump: self.jump,
        }
    }
}

/// Per-frame input provider driven by the run loop.
pub trait InputSource {
    /// Samples input for the next frame. `None` means the user quit.
    fn poll(&mut self) -> Option<InputState>;
}

/// Replays a fixed list of frames, then quits.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    frames: std::collections::VecDeque<InputState>,
}

impl ScriptedInput {
    pub fn new(frames: impl IntoIterator<Item = InputState>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// `count` idle frames.
    pub fn idle(count: usize) -> Self {
        Self::new(std::iter::repeat(InputState::default()).take(count))
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Option<InputState> {
        self.frames.pop_front()
    }
}
