/// What to do when a symbol declares more auxiliary records than the table holds
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AuxPolicy {
    /// Stop at the end of the table and keep every symbol decoded so far
    #[default]
    Lenient,
    /// Fail with [`Error::MalformedAuxCount`](crate::error::Error::MalformedAuxCount)
    Strict,
}

/// Parsing Options structure for the COFF symbol reader
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ParseOptions {
    /// How auxiliary records running past the end of the symbol table are treated.
    /// Default: [`AuxPolicy::Lenient`]
    pub aux_policy: AuxPolicy,
}

impl ParseOptions {
    /// Returns parse options that reject truncated auxiliary records
    pub fn strict() -> Self {
        ParseOptions {
            aux_policy: AuxPolicy::Strict,
        }
    }
}
