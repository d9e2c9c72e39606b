use std::collections::BTreeMap;
use std::fmt;

/// A rendered view of an [`Entry`](crate::entry::Entry) for use in error messages.
///
/// Sorted by key so that error text is stable across runs regardless of the
/// underlying `IndexMap`'s insertion order.
#[derive(Debug, Clone)]
pub struct EntrySnapshot(BTreeMap<String, String>);

impl EntrySnapshot {
    pub fn new(entry: &crate::entry::Entry) -> Self {
        Self(entry.iter().map(|(k, v)| (k.as_str().to_owned(), v.clone())).collect())
    }
}

impl fmt::Display for EntrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v:?}")?;
        }
        write!(f, "}}")
    }
}

/// Every way a KAON schema run can fail.
///
/// `SchemaError` and `IOError` are reported while *loading* schema or constraints
/// files, before any action has executed. The rest are raised while *executing*
/// the schema and always abort the whole run - KAON has no partial-output mode.
#[derive(Debug, thiserror::Error)]
pub enum KaonError {
    /// Structural or type violation in a schema or constraints file.
    #[error("schema error at `{path}`: {message}")]
    SchemaError { path: String, message: String },

    /// The `id` template of an action could not be interpolated against one of its entries.
    #[error("action `{action}` failed: could not interpolate id template `{template}` for entry {entry}")]
    MissingPlaceholderInId {
        action: String,
        template: String,
        entry: EntrySnapshot,
    },

    /// A subprocess output line did not split into the expected number of fields.
    #[error(
        "action `{action}` failed: expected {expected} field(s) from `execute`, got {got} in line `{line}`"
    )]
    ExecuteArityError {
        action: String,
        expected: usize,
        got: usize,
        line: String,
    },

    /// A subprocess invoked by `execute` exited with a non-zero status.
    #[error("action `{action}` failed: command `{command}` exited with status {status}")]
    ExecuteProcessError {
        action: String,
        command: String,
        status: i32,
    },

    /// A subprocess invoked by `execute` could not be spawned at all.
    #[error("action `{action}` failed: could not run command `{command}`: {source}")]
    ExecuteSpawnError {
        action: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A schema or constraints file could not be read.
    #[error("could not read `{path}`: {source}")]
    IOError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, KaonError>;
