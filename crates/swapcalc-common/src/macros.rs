/// Logs the error of a `Result` expression and hands the result back untouched.
#[macro_export]
macro_rules! log_if_error {
    ($e: expr) => {
        match $e {
            Ok(v) => Ok(v),
            Err(e) => {
                $crate::tracing::error!("{}", e);
                Err(e)
            },
        }
    };
}
