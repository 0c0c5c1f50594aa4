use thiserror::Error;

use crate::time::Instant;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Instant {t} is outside of the trajectory coverage [{t_min}, {t_max}]")]
    OutOfRange {
        t: Instant,
        t_min: Instant,
        t_max: Instant,
    },

    #[error("Unable to decode message: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Inconsistent message: {0}")]
    InvalidMessage(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unable to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Unknown integrator: {0}")]
    UnknownIntegrator(String),
}

impl PartialEq for FlowError {
    fn eq(&self, other: &Self) -> bool {
        use FlowError::*;
        match (self, other) {
            (
                OutOfRange {
                    t: a,
                    t_min: a_min,
                    t_max: a_max,
                },
                OutOfRange {
                    t: b,
                    t_min: b_min,
                    t_max: b_max,
                },
            ) => a == b && a_min == b_min && a_max == b_max,

            // Not comparable: equal when the variant matches
            (Decode(_), Decode(_)) => true,
            (ConfigParse(_), ConfigParse(_)) => true,
            (IoError(_), IoError(_)) => true,

            (InvalidMessage(a), InvalidMessage(b)) => a == b,
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (InvalidDate(a), InvalidDate(b)) => a == b,
            (UnknownIntegrator(a), UnknownIntegrator(b)) => a == b,

            _ => false,
        }
    }
}
