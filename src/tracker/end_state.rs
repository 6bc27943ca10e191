/// Consumption state of one end (start or end) of a track segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndState {
    /// Free to be linked by a segment-level pass
    #[default]
    Open,
    /// Taken by an accepted split, merge or gap-closing edge
    Consumed,
}

impl EndState {
    #[inline]
    pub fn is_open(self) -> bool {
        self == EndState::Open
    }

    /// Transition `Open -> Consumed`. Returns `false` if already consumed.
    #[inline]
    pub fn consume(&mut self) -> bool {
        let was_open = self.is_open();
        *self = EndState::Consumed;
        was_open
    }
}
