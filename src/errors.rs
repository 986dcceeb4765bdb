use thiserror::Error;

pub type UnifixResult<T, E = UnifixError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum UnifixError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed token dump: dangling ids, missing attributes, and friends.
    #[error("malformed dump: {0}")]
    Dump(String),

    /// Structural violation in the recovered program (break with no
    /// enclosing loop, nested switch, unexpected statement kind).
    /// These are never caught inside the pipeline.
    #[error("structural error: {0}")]
    Structure(String),

    #[error("{0}")]
    Msg(String),
}

impl From<&str> for UnifixError {
    fn from(s: &str) -> Self {
        UnifixError::Msg(s.to_owned())
    }
}

impl From<String> for UnifixError {
    fn from(s: String) -> Self {
        UnifixError::Msg(s)
    }
}

#[test]
fn io_conversion_retains_message() {
    let e = std::io::Error::other("boom!");
    let u: UnifixError = e.into();
    assert!(matches!(u, UnifixError::Io(_)));
    assert!(u.to_string().contains("boom"));
}

#[test]
fn simple_string_into_msg() {
    let u: UnifixError = "plain msg".into();
    assert!(matches!(u, UnifixError::Msg(s) if s == "plain msg"));
}

#[test]
fn structure_errors_carry_context() {
    let u = UnifixError::Structure("break outside of a loop".into());
    assert!(u.to_string().contains("break outside"));
}
