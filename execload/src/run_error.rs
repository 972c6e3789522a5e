use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e) | Self::RuntimeError(e) => e,
        }
    }
}

impl From<execload_core::Error> for RunError {
    fn from(err: execload_core::Error) -> Self {
        if err.is_invalid_input() {
            Self::InvalidInput(anyhow::Error::new(err).context("invalid configuration"))
        } else {
            Self::RuntimeError(anyhow::Error::new(err).context("run failed"))
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.anyhow())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use execload_core::ConfigurationError;

    #[test]
    fn configuration_errors_are_invalid_input() {
        let err = RunError::from(execload_core::Error::from(ConfigurationError::ZeroRate));
        assert_eq!(err.exit_code(), ExitCode::InvalidInput);
        assert!(err.to_string().contains("RATE"));
    }

    #[test]
    fn other_errors_are_runtime_errors() {
        let err = RunError::from(execload_core::Error::MetricsStillShared);
        assert_eq!(err.exit_code(), ExitCode::RuntimeError);
        assert!(err.to_string().starts_with("run failed"));
    }
}
