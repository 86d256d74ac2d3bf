/// Collation direction of a single key part
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Ascending
    Asc,
    /// Descending
    Desc,
    /// Ascending, ASCII letters compared as upper case
    AscIgnoreCase,
    /// Descending, ASCII letters compared as upper case
    DescIgnoreCase,
}

impl Direction {
    pub(crate) fn is_descending(&self) -> bool {
        matches!(self, Direction::Desc | Direction::DescIgnoreCase)
    }

    pub(crate) fn ignores_case(&self) -> bool {
        matches!(self, Direction::AscIgnoreCase | Direction::DescIgnoreCase)
    }
}
