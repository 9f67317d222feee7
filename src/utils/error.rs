use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlueGuardError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Model artifact error at {path}: {message}")]
    ArtifactError { path: String, message: String },

    #[error("Agent '{agent}' declares features {declared:?} but its model expects {model:?}")]
    FeatureMismatch {
        agent: String,
        declared: Vec<String>,
        model: Vec<String>,
    },

    #[error("Agent registry error: {message}")]
    RegistryError { message: String },

    #[error("Zone data error at {path}: {message}")]
    ZoneDataError { path: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Data,
    Configuration,
    Model,
    Geospatial,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BlueGuardError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BlueGuardError::IoError(_) | BlueGuardError::ZipError(_) => ErrorCategory::Io,
            BlueGuardError::CsvError(_) | BlueGuardError::SerializationError(_) => {
                ErrorCategory::Data
            }
            BlueGuardError::ConfigValidationError { .. }
            | BlueGuardError::InvalidConfigValueError { .. }
            | BlueGuardError::MissingConfigError { .. } => ErrorCategory::Configuration,
            BlueGuardError::ArtifactError { .. }
            | BlueGuardError::FeatureMismatch { .. }
            | BlueGuardError::RegistryError { .. } => ErrorCategory::Model,
            BlueGuardError::ZoneDataError { .. } => ErrorCategory::Geospatial,
            BlueGuardError::ProcessingError { .. } | BlueGuardError::ValidationError { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Processing => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Io | ErrorCategory::Model | ErrorCategory::Geospatial => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BlueGuardError::IoError(_) => "Check that the path exists and is readable/writable",
            BlueGuardError::ZipError(_) => "Check free disk space or disable load.compression",
            BlueGuardError::CsvError(_) => {
                "Make sure the input file is valid CSV with a header row"
            }
            BlueGuardError::SerializationError(_) => "Make sure the input is valid JSON",
            BlueGuardError::ConfigValidationError { .. }
            | BlueGuardError::InvalidConfigValueError { .. }
            | BlueGuardError::MissingConfigError { .. } => {
                "Review the TOML configuration file against blueguard.toml"
            }
            BlueGuardError::ArtifactError { .. } => {
                "Make sure each agent directory holds a *model*.json artifact"
            }
            BlueGuardError::FeatureMismatch { .. } => {
                "Fix the declared feature list or set reconcile_features = true for this agent"
            }
            BlueGuardError::RegistryError { .. } => {
                "Use unique agent keys and mark at most one agent as default"
            }
            BlueGuardError::ZoneDataError { .. } => {
                "Zone files must be WGS84 GeoJSON FeatureCollections of polygons"
            }
            BlueGuardError::ProcessingError { .. } | BlueGuardError::ValidationError { .. } => {
                "Inspect the offending records and run again"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Io => format!("File system problem: {}", self),
            ErrorCategory::Data => format!("Input data could not be read: {}", self),
            ErrorCategory::Configuration => format!("Configuration is invalid: {}", self),
            ErrorCategory::Model => format!("Model agents could not be loaded: {}", self),
            ErrorCategory::Geospatial => format!("Zone data could not be loaded: {}", self),
            ErrorCategory::Processing => format!("Processing failed: {}", self),
        }
    }
}

impl ErrorSeverity {
    /// CLI 退出碼：Low 視為成功
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, BlueGuardError>;
