//! Exit codes of the `moniker` binary.
//! These codes are part of the public contract.

use moniker_core::MonikerError;

pub const SUCCESS: i32 = 0;
pub const USAGE: i32 = 1; // Bad arguments, malformed name, bad cache geometry
pub const IO_ERROR: i32 = 2; // Stream or file failure
pub const FAILURE: i32 = 3; // Anything else

/// Map an error to its exit code.
///
/// The first [`MonikerError`] in the chain decides; bare I/O errors are
/// [`IO_ERROR`].
pub fn from_error(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<MonikerError>() {
            return e.exit_code();
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return IO_ERROR;
        }
    }
    FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_error() {
        let err = anyhow::Error::new(MonikerError::UnknownPrefix {
            name: "x:".to_string(),
        });
        assert_eq!(from_error(&err), USAGE);

        let err = anyhow::Error::new(std::io::Error::other("boom")).context("writing output");
        assert_eq!(from_error(&err), IO_ERROR);

        let err = anyhow::anyhow!("something else");
        assert_eq!(from_error(&err), FAILURE);
    }
}
