use thiserror::Error;

/// Failures while turning a workbook into player/referee tables.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("workbook not found: {path}")]
    WorkbookMissing { path: String },

    #[error("unable to read workbook {path}: {message}")]
    WorkbookUnreadable { path: String, message: String },

    #[error("sheet {sheet} has no header row")]
    EmptySheet { sheet: String },

    #[error("sheet {sheet}: no column matches {field}")]
    MissingColumn { sheet: String, field: &'static str },

    #[error("workbook has no team sheets")]
    NoTeams,
}

/// Failures of a single shortlist computation. None of these are retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolError {
    #[error("home and away team are the same: {0}")]
    SameTeam(String),

    #[error("unknown team: {0}")]
    UnknownTeam(String),

    #[error(
        "not enough eligible players for {team}: {eligible} eligible, \
         {excluded_by_minutes} below the minutes threshold, {excluded_by_user} excluded by hand"
    )]
    InsufficientPool {
        team: String,
        eligible: usize,
        excluded_by_minutes: usize,
        excluded_by_user: usize,
    },
}
