/// Source position attached to AST nodes and errors. The lexer hands the
/// builder one of these per production; columns are not tracked because
/// diagnostics in Quartz cite whole lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugLoc {
    pub line: usize,
}

impl DebugLoc {
    pub fn line(line: usize) -> Option<Self> {
        Some(DebugLoc { line })
    }
}
