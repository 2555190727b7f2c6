/// State carried while a statement is written.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Number of placeholders written so far.
    pub counter: u32,
}
