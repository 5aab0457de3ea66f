use crate::packet::FecScheme;

#[derive(Debug, thiserror::Error)]
pub enum ComposeErrorValue {
    #[error("packet has no {0} fields")]
    MissingFields(&'static str),
    #[error("{field} value {value} does not fit, max is {max}")]
    FieldOverflow {
        field: &'static str,
        value: usize,
        max: usize,
    },
    #[error("composer is for {expected}, packet is {actual}")]
    SchemeMismatch {
        expected: FecScheme,
        actual: FecScheme,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct ComposeError {
    pub value: ComposeErrorValue,
}

impl From<ComposeErrorValue> for ComposeError {
    fn from(val: ComposeErrorValue) -> Self {
        Self { value: val }
    }
}
