use crate::yaml::node::Sequence;

/// Walks the mapping elements of a sequence in order, skipping scalars and
/// nested sequences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingCursor {
    next: usize,
}

impl MappingCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next mapping element, or `None` once they run out.
    pub fn next_index(&mut self, sequence: &Sequence) -> Option<usize> {
        let (index, _) = sequence.nth_mapping(self.next)?;
        self.next = index + 1;
        Some(index)
    }

    /// Position the next search starts from.
    pub fn position(&self) -> usize {
        self.next
    }
}
