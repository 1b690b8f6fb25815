use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum XrAppError {
    #[error("`{call}` failed with {code} at {file}:{line}")]
    ExternalCall {
        call: &'static str,
        code: String,
        file: &'static str,
        line: u32,
    },
    #[error("assertion `{expr}` failed at {file}:{line}")]
    Assertion {
        expr: &'static str,
        file: &'static str,
        line: u32,
    },
    #[error("no {0} available")]
    Unavailable(String),
}

impl XrAppError {
    pub fn external(call: &'static str, code: impl fmt::Debug, file: &'static str, line: u32) -> Self {
        Self::ExternalCall {
            call,
            code: format!("{code:?}"),
            file,
            line,
        }
    }

    pub fn unavailable(what: impl Into<String>) -> Self {
        Self::Unavailable(what.into())
    }
}

pub type Result<T> = std::result::Result<T, XrAppError>;

/// Turns the error of a native call into [XrAppError::ExternalCall], recording the call
/// expression and where it was made.
#[macro_export]
macro_rules! check {
    ($call:expr) => {
        ($call).map_err(|code| {
            $crate::error::XrAppError::external(stringify!($call), code, file!(), line!())
        })
    };
}

/// Returns [XrAppError::Assertion] from the enclosing function when `cond` is false.
#[macro_export]
macro_rules! ensure {
    ($cond:expr) => {
        if !($cond) {
            return Err($crate::error::XrAppError::Assertion {
                expr: stringify!($cond),
                file: file!(),
                line: line!(),
            }
            .into());
        }
    };
}
