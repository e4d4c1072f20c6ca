//! Error macros for capsule-core

/// Return early with an invalid-request error
#[macro_export]
macro_rules! bail_invalid {
    ($($arg:tt)*) => {
        return Err($crate::error::CapsuleError::InvalidRequest(format!($($arg)*)))
    };
}

/// Map an unexpected database error to an internal error for `$op`
#[macro_export]
macro_rules! map_db_err {
    ($op:expr, $error:expr) => {
        $crate::error::CapsuleError::internal($op, $error)
    };
}
