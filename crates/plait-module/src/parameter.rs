use serde_json::Value;

/// Scalar value carried by a [`Parameter`]: a primitive or its absence.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Convert from a JSON value. Arrays and objects are not scalars.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(flag) => Some(Self::Bool(*flag)),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Some(Self::Int(int))
                } else {
                    number.as_f64().map(Self::Float)
                }
            }
            Value::String(text) => Some(Self::Str(text.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Int(int) => Value::from(*int),
            Self::Float(float) => Value::from(*float),
            Self::Str(text) => Value::String(text.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(int) => Some(*int),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(float) => Some(*float),
            Self::Int(int) => Some(*int as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for Scalar {
    fn from(text: &str) -> Self {
        Self::Str(text.to_string())
    }
}

impl From<String> for Scalar {
    fn from(text: String) -> Self {
        Self::Str(text)
    }
}

impl From<i64> for Scalar {
    fn from(int: i64) -> Self {
        Self::Int(int)
    }
}

impl From<f64> for Scalar {
    fn from(float: f64) -> Self {
        Self::Float(float)
    }
}

impl From<bool> for Scalar {
    fn from(flag: bool) -> Self {
        Self::Bool(flag)
    }
}

/// Immutable named value holder attached inside a module's registry.
///
/// A parameter has no identity beyond the slot it occupies; replacing one is
/// done by re-attaching a new parameter under the same name.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    value: Scalar,
}

impl Parameter {
    pub fn new(value: impl Into<Scalar>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn null() -> Self {
        Self {
            value: Scalar::Null,
        }
    }

    pub fn value(&self) -> &Scalar {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_round_trips_through_json() {
        for value in [json!(null), json!(true), json!(3), json!(2.5), json!("text")] {
            let scalar = Scalar::from_json(&value).expect("scalar json should convert");
            assert_eq!(scalar.to_json(), value);
        }
    }

    #[test]
    fn compound_json_is_not_a_scalar() {
        assert!(Scalar::from_json(&json!([1, 2])).is_none());
        assert!(Scalar::from_json(&json!({"a": 1})).is_none());
    }

    #[test]
    fn int_widens_to_f64_on_demand() {
        assert_eq!(Scalar::Int(4).as_f64(), Some(4.0));
        assert_eq!(Scalar::Int(4).as_i64(), Some(4));
    }

    #[test]
    fn parameter_exposes_its_value() {
        let parameter = Parameter::new("two");
        assert_eq!(parameter.value().as_str(), Some("two"));
    }
}
