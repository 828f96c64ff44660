use std::fmt;

/// Rejected user input. Raised before any network call; never changes state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Fewer than two distinct fields selected for matching.
    TooFewColumns { selected: usize },
    /// A field name that the dataset does not contain.
    UnknownColumn(String),
    /// Upload contained no files.
    NoFiles,
    /// More than two files in one upload.
    TooManyFiles(usize),
    /// Two-file upload with different extensions.
    MixedExtensions { first: String, second: String },
    /// Extension other than csv / xlsx / xls.
    UnsupportedFile(String),
    /// Target column already claimed by another source column.
    TargetAlreadyMapped { target: String, source: String },
    /// Mapping completed while some source columns were still unmapped.
    UnmappedColumns(Vec<String>),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewColumns { selected } => {
                write!(f, "select at least 2 columns for matching ({selected} selected)")
            }
            Self::UnknownColumn(name) => write!(f, "unknown column '{name}'"),
            Self::NoFiles => write!(f, "no file uploaded"),
            Self::TooManyFiles(n) => write!(f, "at most 2 files can be uploaded, got {n}"),
            Self::MixedExtensions { first, second } => {
                write!(f, "all files must have the same extension (.{first} vs .{second})")
            }
            Self::UnsupportedFile(name) => {
                write!(f, "unsupported file '{name}': only CSV and Excel files are supported")
            }
            Self::TargetAlreadyMapped { target, source } => {
                write!(f, "column \"{target}\" is already mapped to \"{source}\"")
            }
            Self::UnmappedColumns(cols) => {
                write!(f, "please map all columns. Missing mappings for: {}", cols.join(", "))
            }
        }
    }
}

impl std::error::Error for ValidationError {}
