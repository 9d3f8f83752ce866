/// Returns early with `$error` unless `$predicate` holds.
///
/// ```ignore
/// ensure!(header_len <= self.max_header_bytes, ParseError::too_large_header(header_len, self.max_header_bytes));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
