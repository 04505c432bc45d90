use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Parsing error: {message}")]
    Parse { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Already exists: {resource}")]
    AlreadyExists { resource: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{op}: {source}")]
    Dispatch {
        op: &'static str,
        #[source]
        source: Box<AppError>,
    },

    #[error("{op}: {source}")]
    Op {
        op: &'static str,
        #[source]
        source: Box<AppError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Tag an error with the operation it surfaced from.
    pub fn at(op: &'static str, err: AppError) -> Self {
        AppError::Op {
            op,
            source: Box::new(err),
        }
    }

    pub fn dispatch(op: &'static str, err: AppError) -> Self {
        AppError::Dispatch {
            op,
            source: Box::new(err),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn already_exists(resource: impl Into<String>) -> Self {
        AppError::AlreadyExists {
            resource: resource.into(),
        }
    }

    /// Innermost error beneath any operation or dispatch wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Op { source, .. } | AppError::Dispatch { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), AppError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self.root(), AppError::AlreadyExists { .. })
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::not_found("row"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::already_exists(db.message().to_string())
            }
            other => AppError::Store(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Fetch(err.to_string())
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::Email(err.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(err: lettre::address::AddressError) -> Self {
        AppError::Email(format!("invalid address: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        AppError::Email(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
