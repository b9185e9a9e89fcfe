//! Stabilizer configuration.
//!
//! Every feedback gain is range-limited: [`StabilizerConfig::clamp`] stores
//! the nearest valid value and logs what it changed, so a bad configuration
//! degrades the controller instead of destabilizing the robot.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Safety bounds
// ---------------------------------------------------------------------------

/// Maximum DCM proportional gain in Hz.
pub const MAX_DCM_P_GAIN: f64 = 20.0;
/// Maximum DCM integral gain in Hz.
pub const MAX_DCM_I_GAIN: f64 = 100.0;
/// Maximum DCM derivative gain (dimensionless).
pub const MAX_DCM_D_GAIN: f64 = 2.0;
/// Maximum saturation of the average DCM error in m.
pub const MAX_AVERAGE_DCM_ERROR: f64 = 0.05;
/// Maximum per-axis CoM admittance.
pub const MAX_COM_ADMITTANCE: f64 = 20.0;
/// Maximum per-axis CoP admittance for foot damping control.
pub const MAX_COP_ADMITTANCE: f64 = 0.1;
/// Maximum foot force difference admittance in s/kg.
pub const MAX_DFZ_ADMITTANCE: f64 = 5e-4;
/// Maximum foot force difference damping in Hz.
pub const MAX_DFZ_DAMPING: f64 = 10.0;
/// Maximum x-axis angular velocity of foot damping control in rad/s.
pub const MAX_FDC_RX_VEL: f64 = 0.2;
/// Maximum y-axis angular velocity of foot damping control in rad/s.
pub const MAX_FDC_RY_VEL: f64 = 0.2;
/// Maximum z-axis angular velocity of foot damping control in rad/s.
pub const MAX_FDC_RZ_VEL: f64 = 0.2;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_dcm_prop_gain() -> f64 {
    1.4
}
const fn default_dcm_integral_gain() -> f64 {
    10.0
}
const fn default_dcm_deriv_gain() -> f64 {
    0.0
}
const fn default_dcm_integrator_time_constant() -> f64 {
    15.0
}
const fn default_dcm_derivator_time_constant() -> f64 {
    1.0
}
const fn default_com_admittance() -> [f64; 2] {
    [0.0, 0.0]
}
const fn default_com_offset_leak_rate() -> f64 {
    0.1
}
const fn default_cop_admittance() -> [f64; 2] {
    [0.01, 0.01]
}
const fn default_dfz_admittance() -> f64 {
    1e-4
}
const fn default_dfz_damping() -> f64 {
    0.0
}
const fn default_vdc_frequency() -> f64 {
    1.0
}
const fn default_vdc_stiffness() -> f64 {
    1000.0
}
const fn default_com_stiffness() -> [f64; 3] {
    [1000.0, 1000.0, 100.0]
}
const fn default_com_weight() -> f64 {
    1000.0
}
const fn default_foot_stiffness() -> f64 {
    2000.0
}
fn default_foot_damping() -> f64 {
    2.0 * default_foot_stiffness().sqrt()
}
const fn default_foot_weight() -> f64 {
    1000.0
}
const fn default_pelvis_stiffness() -> f64 {
    10.0
}
const fn default_pelvis_weight() -> f64 {
    100.0
}
const fn default_torso_stiffness() -> f64 {
    10.0
}
const fn default_torso_weight() -> f64 {
    100.0
}
const fn default_torso_pitch() -> f64 {
    0.0
}
const fn default_net_wrench_sqrt() -> f64 {
    100.0
}
const fn default_wrench_sqrt() -> f64 {
    1e-3
}
const fn default_ankle_torque_sqrt() -> f64 {
    10.0
}
const fn default_pressure_sqrt() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// FdqpWeights
// ---------------------------------------------------------------------------

/// Square-root weights of the force distribution QP objectives.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FdqpWeights {
    /// Net contact wrench tracking.
    #[serde(default = "default_net_wrench_sqrt")]
    pub net_wrench_sqrt: f64,
    /// Per-foot wrench regularization (force components).
    #[serde(default = "default_wrench_sqrt")]
    pub wrench_sqrt: f64,
    /// Per-foot ankle torque regularization (couple components).
    #[serde(default = "default_ankle_torque_sqrt")]
    pub ankle_torque_sqrt: f64,
    /// Pressure-ratio tracking between the feet in double support.
    #[serde(default = "default_pressure_sqrt")]
    pub pressure_sqrt: f64,
}

impl Default for FdqpWeights {
    fn default() -> Self {
        Self {
            net_wrench_sqrt: default_net_wrench_sqrt(),
            wrench_sqrt: default_wrench_sqrt(),
            ankle_torque_sqrt: default_ankle_torque_sqrt(),
            pressure_sqrt: default_pressure_sqrt(),
        }
    }
}

// ---------------------------------------------------------------------------
// StabilizerConfig
// ---------------------------------------------------------------------------

/// Tunable stabilizer parameters.
///
/// Defaults are a conservative double-support tuning; hosts override them
/// from TOML ([`from_file`](Self::from_file)) or programmatically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StabilizerConfig {
    /// DCM proportional gain in Hz, clamped to `[0, MAX_DCM_P_GAIN]`.
    #[serde(default = "default_dcm_prop_gain")]
    pub dcm_prop_gain: f64,

    /// DCM integral gain in Hz, clamped to `[0, MAX_DCM_I_GAIN]`.
    #[serde(default = "default_dcm_integral_gain")]
    pub dcm_integral_gain: f64,

    /// DCM derivative gain, clamped to `[0, MAX_DCM_D_GAIN]`.
    #[serde(default = "default_dcm_deriv_gain")]
    pub dcm_deriv_gain: f64,

    /// Time constant of the DCM error moving average in s, must be > 0.
    #[serde(default = "default_dcm_integrator_time_constant")]
    pub dcm_integrator_time_constant: f64,

    /// Time constant of the DCM error derivator in s, must be > 0.
    #[serde(default = "default_dcm_derivator_time_constant")]
    pub dcm_derivator_time_constant: f64,

    /// CoM admittance per horizontal axis, clamped to
    /// `[0, MAX_COM_ADMITTANCE]`. Converts ZMP error into a CoM offset.
    #[serde(default = "default_com_admittance")]
    pub com_admittance: [f64; 2],

    /// Leak rate of the CoM offset integrator in Hz.
    #[serde(default = "default_com_offset_leak_rate")]
    pub com_offset_leak_rate: f64,

    /// CoP admittance per tangential axis, clamped to
    /// `[0, MAX_COP_ADMITTANCE]`.
    #[serde(default = "default_cop_admittance")]
    pub cop_admittance: [f64; 2],

    /// Foot force difference admittance in s/kg, clamped to
    /// `[0, MAX_DFZ_ADMITTANCE]`.
    #[serde(default = "default_dfz_admittance")]
    pub dfz_admittance: f64,

    /// Foot force difference damping in Hz, clamped to
    /// `[0, MAX_DFZ_DAMPING]`.
    #[serde(default = "default_dfz_damping")]
    pub dfz_damping: f64,

    /// Vertical drift compensation frequency in Hz, ≥ 0.
    #[serde(default = "default_vdc_frequency")]
    pub vdc_frequency: f64,

    /// Vertical drift compensation stiffness in 1/s², ≥ 0.
    #[serde(default = "default_vdc_stiffness")]
    pub vdc_stiffness: f64,

    /// Force distribution QP weights, all ≥ 0.
    #[serde(default)]
    pub fdqp_weights: FdqpWeights,

    /// CoM task stiffness per axis.
    #[serde(default = "default_com_stiffness")]
    pub com_stiffness: [f64; 3],

    /// CoM task weight in the downstream whole-body program.
    #[serde(default = "default_com_weight")]
    pub com_weight: f64,

    /// Foot task stiffness.
    #[serde(default = "default_foot_stiffness")]
    pub foot_stiffness: f64,

    /// Foot task damping.
    #[serde(default = "default_foot_damping")]
    pub foot_damping: f64,

    /// Foot task weight in the downstream whole-body program.
    #[serde(default = "default_foot_weight")]
    pub foot_weight: f64,

    /// Pelvis orientation task stiffness.
    #[serde(default = "default_pelvis_stiffness")]
    pub pelvis_stiffness: f64,

    /// Pelvis orientation task weight.
    #[serde(default = "default_pelvis_weight")]
    pub pelvis_weight: f64,

    /// Torso orientation task stiffness.
    #[serde(default = "default_torso_stiffness")]
    pub torso_stiffness: f64,

    /// Torso orientation task weight.
    #[serde(default = "default_torso_weight")]
    pub torso_weight: f64,

    /// Torso pitch offset over the pelvis orientation in rad.
    #[serde(default = "default_torso_pitch")]
    pub torso_pitch: f64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            dcm_prop_gain: default_dcm_prop_gain(),
            dcm_integral_gain: default_dcm_integral_gain(),
            dcm_deriv_gain: default_dcm_deriv_gain(),
            dcm_integrator_time_constant: default_dcm_integrator_time_constant(),
            dcm_derivator_time_constant: default_dcm_derivator_time_constant(),
            com_admittance: default_com_admittance(),
            com_offset_leak_rate: default_com_offset_leak_rate(),
            cop_admittance: default_cop_admittance(),
            dfz_admittance: default_dfz_admittance(),
            dfz_damping: default_dfz_damping(),
            vdc_frequency: default_vdc_frequency(),
            vdc_stiffness: default_vdc_stiffness(),
            fdqp_weights: FdqpWeights::default(),
            com_stiffness: default_com_stiffness(),
            com_weight: default_com_weight(),
            foot_stiffness: default_foot_stiffness(),
            foot_damping: default_foot_damping(),
            foot_weight: default_foot_weight(),
            pelvis_stiffness: default_pelvis_stiffness(),
            pelvis_weight: default_pelvis_weight(),
            torso_stiffness: default_torso_stiffness(),
            torso_weight: default_torso_weight(),
            torso_pitch: default_torso_pitch(),
        }
    }
}

impl StabilizerConfig {
    /// A configuration with every feedback term zeroed: the stabilizer
    /// passes references through untouched.
    pub fn passive(&self) -> Self {
        Self {
            dcm_prop_gain: 0.0,
            dcm_integral_gain: 0.0,
            dcm_deriv_gain: 0.0,
            com_admittance: [0.0, 0.0],
            cop_admittance: [0.0, 0.0],
            dfz_admittance: 0.0,
            dfz_damping: 0.0,
            vdc_frequency: 0.0,
            vdc_stiffness: 0.0,
            ..self.clone()
        }
    }

    /// Validate structural requirements (strictly positive time constants).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dcm_integrator_time_constant <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "dcm_integrator_time_constant",
                value: self.dcm_integrator_time_constant,
            });
        }
        if self.dcm_derivator_time_constant <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "dcm_derivator_time_constant",
                value: self.dcm_derivator_time_constant,
            });
        }
        Ok(())
    }

    /// Clamp every gain to its safety range.
    ///
    /// When `verbose` is set, each out-of-range value is reported through the
    /// logging facade before being replaced by the nearest valid one.
    pub fn clamp(&mut self, verbose: bool) {
        clamp_field(&mut self.dcm_prop_gain, 0.0, MAX_DCM_P_GAIN, "dcm_prop_gain", verbose);
        clamp_field(
            &mut self.dcm_integral_gain,
            0.0,
            MAX_DCM_I_GAIN,
            "dcm_integral_gain",
            verbose,
        );
        clamp_field(&mut self.dcm_deriv_gain, 0.0, MAX_DCM_D_GAIN, "dcm_deriv_gain", verbose);
        for admittance in &mut self.com_admittance {
            clamp_field(admittance, 0.0, MAX_COM_ADMITTANCE, "com_admittance", verbose);
        }
        for admittance in &mut self.cop_admittance {
            clamp_field(admittance, 0.0, MAX_COP_ADMITTANCE, "cop_admittance", verbose);
        }
        clamp_field(
            &mut self.dfz_admittance,
            0.0,
            MAX_DFZ_ADMITTANCE,
            "dfz_admittance",
            verbose,
        );
        clamp_field(&mut self.dfz_damping, 0.0, MAX_DFZ_DAMPING, "dfz_damping", verbose);
        clamp_field(&mut self.vdc_frequency, 0.0, f64::INFINITY, "vdc_frequency", verbose);
        clamp_field(&mut self.vdc_stiffness, 0.0, f64::INFINITY, "vdc_stiffness", verbose);
        clamp_field(&mut self.com_offset_leak_rate, 0.0, f64::INFINITY, "com_offset_leak_rate", verbose);
        let weights = &mut self.fdqp_weights;
        clamp_field(&mut weights.net_wrench_sqrt, 0.0, f64::INFINITY, "net_wrench_sqrt", verbose);
        clamp_field(&mut weights.wrench_sqrt, 0.0, f64::INFINITY, "wrench_sqrt", verbose);
        clamp_field(
            &mut weights.ankle_torque_sqrt,
            0.0,
            f64::INFINITY,
            "ankle_torque_sqrt",
            verbose,
        );
        clamp_field(&mut weights.pressure_sqrt, 0.0, f64::INFINITY, "pressure_sqrt", verbose);
    }

    /// Load a configuration from a TOML file, validate and clamp it.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.validate()?;
        config.clamp(true);
        Ok(config)
    }
}

fn clamp_field(value: &mut f64, min: f64, max: f64, field: &'static str, verbose: bool) {
    if *value < min || *value > max {
        let clamped = value.clamp(min, max);
        if verbose {
            warn!("{field} = {value} outside [{min}, {max}], clamping to {clamped}");
        }
        *value = clamped;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_and_in_range() {
        let mut config = StabilizerConfig::default();
        assert!(config.validate().is_ok());
        let before = config.clone();
        config.clamp(false);
        assert_eq!(config, before);
    }

    #[test]
    fn clamp_pulls_gains_into_range() {
        let mut config = StabilizerConfig {
            dcm_prop_gain: 50.0,
            dcm_integral_gain: -1.0,
            dcm_deriv_gain: 3.0,
            dfz_admittance: 1.0,
            cop_admittance: [0.5, -0.1],
            ..StabilizerConfig::default()
        };
        config.clamp(false);
        assert_eq!(config.dcm_prop_gain, MAX_DCM_P_GAIN);
        assert_eq!(config.dcm_integral_gain, 0.0);
        assert_eq!(config.dcm_deriv_gain, MAX_DCM_D_GAIN);
        assert_eq!(config.dfz_admittance, MAX_DFZ_ADMITTANCE);
        assert_eq!(config.cop_admittance, [MAX_COP_ADMITTANCE, 0.0]);
    }

    #[test]
    fn validate_rejects_non_positive_time_constants() {
        let config = StabilizerConfig {
            dcm_integrator_time_constant: 0.0,
            ..StabilizerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { .. })
        ));
    }

    #[test]
    fn passive_config_zeroes_feedback() {
        let passive = StabilizerConfig::default().passive();
        assert_eq!(passive.dcm_prop_gain, 0.0);
        assert_eq!(passive.dcm_integral_gain, 0.0);
        assert_eq!(passive.dcm_deriv_gain, 0.0);
        assert_eq!(passive.dfz_admittance, 0.0);
        assert_eq!(passive.cop_admittance, [0.0, 0.0]);
        // Task gains are kept: the references are still tracked.
        assert_eq!(passive.com_weight, default_com_weight());
    }

    #[test]
    fn toml_deserialization_with_defaults() {
        let toml_str = r"
            dcm_prop_gain = 4.0
            dcm_integral_gain = 20.0

            [fdqp_weights]
            net_wrench_sqrt = 50.0
        ";
        let config: StabilizerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.dcm_prop_gain, 4.0);
        assert_eq!(config.dcm_integral_gain, 20.0);
        assert_eq!(config.fdqp_weights.net_wrench_sqrt, 50.0);
        // Omitted fields take defaults.
        assert_eq!(config.fdqp_weights.ankle_torque_sqrt, 10.0);
        assert_eq!(config.dcm_derivator_time_constant, 1.0);
    }

    #[test]
    fn from_file_roundtrip() {
        let dir = std::env::temp_dir().join("strider_test_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stabilizer.toml");
        std::fs::write(&path, "dcm_prop_gain = 100.0\n").unwrap();

        // Out-of-range file values are clamped on load.
        let config = StabilizerConfig::from_file(&path).unwrap();
        assert_eq!(config.dcm_prop_gain, MAX_DCM_P_GAIN);

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir(&dir);
    }

    #[test]
    fn from_file_invalid_time_constant() {
        let dir = std::env::temp_dir().join("strider_test_config_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stabilizer.toml");
        std::fs::write(&path, "dcm_integrator_time_constant = -5.0\n").unwrap();

        assert!(StabilizerConfig::from_file(&path).is_err());

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir(&dir);
    }
}
