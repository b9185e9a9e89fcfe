use thiserror::Error;

/// Top-level error type for the stabilizer crates.
///
/// Runtime errors are recovered inside the control loop (the tick never
/// fails); they surface to the host only through logged warnings and these
/// values in accessor results.
#[derive(Debug, Error)]
pub enum StabilizerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Net normal force {net_force:.3} N too low for a valid ZMP")]
    MeasurementDegenerate { net_force: f64 },

    #[error("Wrench distribution QP did not converge ({context})")]
    QpInfeasible { context: &'static str },

    #[error("No contact registered")]
    ContactMissing,

    #[error("Invalid input: {what}")]
    InvalidInput { what: &'static str },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{field} must be > 0, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} = {value} outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Unknown surface: {0}")]
    UnknownSurface(String),

    #[error("Unknown body: {0}")]
    UnknownBody(String),

    #[error("No robot at index {0}")]
    UnknownRobot(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stabilizer_error_from_config_error() {
        let err = ConfigError::NonPositive {
            field: "dcm_integrator_time_constant",
            value: -1.0,
        };
        let top: StabilizerError = err.into();
        assert!(matches!(top, StabilizerError::Config(_)));
        assert!(top.to_string().contains("-1"));
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            StabilizerError::MeasurementDegenerate { net_force: 0.5 }.to_string(),
            "Net normal force 0.500 N too low for a valid ZMP"
        );
        assert_eq!(
            StabilizerError::ContactMissing.to_string(),
            "No contact registered"
        );
        assert_eq!(
            ConfigError::OutOfRange {
                field: "dcm_prop_gain",
                value: 50.0,
                min: 0.0,
                max: 20.0
            }
            .to_string(),
            "dcm_prop_gain = 50 outside [0, 20]"
        );
        assert_eq!(
            ConfigError::UnknownSurface("LeftFootCenter".into()).to_string(),
            "Unknown surface: LeftFootCenter"
        );
    }
}
