use thiserror::Error;

use crate::domain::catalog::PackageKey;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown package `{}`", package_key.0)]
    UnknownPackage { package_key: PackageKey },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("tenant failure: {0}")]
    Tenant(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. } | Self::Internal { correlation_id, .. } => {
                correlation_id
            }
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Validation(message) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Tenant(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::catalog::PackageKey;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn unknown_package_message_names_the_key() {
        let error = DomainError::UnknownPackage { package_key: PackageKey::from("gala") };
        assert_eq!(error.to_string(), "unknown package `gala`");
    }

    #[test]
    fn validation_error_keeps_its_message() {
        let interface =
            ApplicationError::Validation("bad tenant id".to_owned()).into_interface("req-2");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref message, .. } if message == "bad tenant id"
        ));
        assert_eq!(interface.correlation_id(), "req-2");
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn tenant_error_maps_to_internal() {
        let interface =
            ApplicationError::Tenant("catalog missing".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
