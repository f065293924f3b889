/// Return early with a resolution error (missing member, parameter or constructor)
#[macro_export]
macro_rules! resolution_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Resolution(format!($($arg)*)))
    };
}

/// Return early with an unsupported-construct error
#[macro_export]
macro_rules! unsupported_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::NotSupported(format!($($arg)*)))
    };
}

/// Return early with a structural validation error
#[macro_export]
macro_rules! validation_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Validation(format!($($arg)*)))
    };
}

/// Return early with a state (contract violation) error
#[macro_export]
macro_rules! state_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::State(format!($($arg)*)))
    };
}

/// wrap struct declare with derive Debug, Clone, PartialEq, Serialize, Deserialize
#[macro_export]
macro_rules! common_struct {
    ($(#[$attr:meta])* $vis:vis struct $name:ident { $($body:tt)* }) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        $vis struct $name { $($body)* }
    };
}

/// wrap enum declare with derive Debug, Clone, PartialEq, Serialize, Deserialize
#[macro_export]
macro_rules! common_enum {
    ($(#[$attr:meta])* $vis:vis enum $name:ident { $($body:tt)* }) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        $vis enum $name { $($body)* }
    };
}
