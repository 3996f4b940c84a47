use std::fmt;

/// Opaque label, marking a position in an instruction list
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SynLabel(usize);

impl SynLabel {
    pub const START: SynLabel = SynLabel(0);

    pub fn next(&self) -> SynLabel {
        SynLabel(self.0 + 1)
    }
}

/// Generates new labels
pub trait LabelGenerator<Label> {
    /// Generate a fresh label
    fn fresh_label(&mut self) -> Label;
}

/// Sequential source of [`SynLabel`]s
///
/// Labels spliced into an existing body must come from a generator built with `after`, so that
/// they never collide with the labels already there.
#[derive(Clone, Debug)]
pub struct SynLabelGenerator(SynLabel);

impl SynLabelGenerator {
    pub fn new(start: SynLabel) -> SynLabelGenerator {
        SynLabelGenerator(start)
    }

    /// Generator whose labels are all strictly larger than any of the ones given
    pub fn after<'a>(used: impl IntoIterator<Item = &'a SynLabel>) -> SynLabelGenerator {
        let start = used
            .into_iter()
            .max()
            .map_or(SynLabel::START, SynLabel::next);
        SynLabelGenerator(start)
    }
}

impl LabelGenerator<SynLabel> for SynLabelGenerator {
    fn fresh_label(&mut self) -> SynLabel {
        let label = self.0;
        self.0 = label.next();
        label
    }
}

impl fmt::Debug for SynLabel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}
