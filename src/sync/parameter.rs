use anyhow::anyhow;
use std::{fmt, str::FromStr};

/// A display setting which can be controlled by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    Brightness,
    Contrast,
    ColorPreset,
}

impl Parameter {
    pub const ALL: [Parameter; 3] = [
        Parameter::Brightness,
        Parameter::Contrast,
        Parameter::ColorPreset,
    ];

    /// Whether values of this parameter are percentages or preset codes.
    pub fn is_level(&self) -> bool {
        !matches!(self, Parameter::ColorPreset)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parameter::Brightness => "brightness",
            Parameter::Contrast => "contrast",
            Parameter::ColorPreset => "color-preset",
        };
        f.write_str(name)
    }
}

impl FromStr for Parameter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brightness" => Ok(Parameter::Brightness),
            "contrast" => Ok(Parameter::Contrast),
            "color-preset" | "preset" => Ok(Parameter::ColorPreset),
            _ => Err(anyhow!(
                "Unknown parameter {}, expected brightness, contrast or color-preset",
                s
            )),
        }
    }
}

/// The value of a [Parameter].
///
/// Brightness and contrast are percentages, color presets are identified by
/// the monitor's preset code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Level(u8),
    Preset(String),
}

impl Value {
    /// A percentage clamped to `0..=100`.
    pub fn level(raw: i32) -> Value {
        Value::Level(raw.clamp(0, 100) as u8)
    }

    pub fn as_level(&self) -> Option<u8> {
        match self {
            Value::Level(level) => Some(*level),
            Value::Preset(_) => None,
        }
    }

    pub fn as_preset(&self) -> Option<&str> {
        match self {
            Value::Level(_) => None,
            Value::Preset(code) => Some(code),
        }
    }

    /// Whether the value has the right shape for the parameter.
    pub fn fits(&self, parameter: Parameter) -> bool {
        matches!(self, Value::Level(_)) == parameter.is_level()
    }
}

impl From<i32> for Value {
    fn from(raw: i32) -> Self {
        Value::level(raw)
    }
}

impl From<u8> for Value {
    fn from(level: u8) -> Self {
        Value::level(level as i32)
    }
}

impl From<&str> for Value {
    fn from(code: &str) -> Self {
        Value::Preset(code.to_owned())
    }
}

impl From<String> for Value {
    fn from(code: String) -> Self {
        Value::Preset(code)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Level(level) => write!(f, "{}%", level),
            Value::Preset(code) => f.write_str(code),
        }
    }
}

/// Engine-side bookkeeping for a single [Parameter].
///
/// `editing` spans from the first change requested by the user until the
/// device write carrying the last requested value has finished. While it's
/// set, readings from the device are not allowed to replace `current`.
#[derive(Debug, Clone)]
pub(crate) struct ParameterState {
    pub(crate) current: Value,
    pub(crate) pending: Option<Value>,
    pub(crate) in_flight: Option<Value>,
    pub(crate) editing: bool,
    /// Bumped on every local change, lets the poller detect that its reading
    /// raced with the user.
    pub(crate) revision: u64,
}

impl ParameterState {
    pub(crate) fn new(parameter: Parameter) -> ParameterState {
        let current = if parameter.is_level() {
            Value::Level(0)
        } else {
            Value::Preset(String::new())
        };
        ParameterState {
            current,
            pending: None,
            in_flight: None,
            editing: false,
            revision: 0,
        }
    }

    /// The value the user should see: the staged one if there is any, the
    /// last known-good one otherwise.
    pub(crate) fn visible(&self) -> &Value {
        self.pending.as_ref().unwrap_or(&self.current)
    }

    pub(crate) fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level_clamping() {
        assert_eq!(Value::from(105), Value::Level(100));
        assert_eq!(Value::from(-5), Value::Level(0));
        assert_eq!(Value::from(42), Value::Level(42));
        assert_eq!(Value::from(200u8), Value::Level(100));
    }

    #[test]
    fn test_value_shapes() {
        assert!(Value::from(10).fits(Parameter::Contrast));
        assert!(!Value::from(10).fits(Parameter::ColorPreset));
        assert!(Value::from("05").fits(Parameter::ColorPreset));
        assert!(!Value::from("05").fits(Parameter::Brightness));
    }

    #[test]
    fn test_parameter_names() {
        for parameter in Parameter::ALL {
            assert_eq!(parameter.to_string().parse::<Parameter>().unwrap(), parameter);
        }
        assert!("gamma".parse::<Parameter>().is_err());
    }

    #[test]
    fn test_visible_value_prefers_pending() {
        let mut state = ParameterState::new(Parameter::Brightness);
        assert_eq!(state.visible(), &Value::Level(0));
        state.pending = Some(Value::Level(40));
        assert_eq!(state.visible(), &Value::Level(40));
    }
}
