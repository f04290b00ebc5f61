use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("Invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("Invalid command line flag value")]
    InvalidCommandLineFlagValue,
}

/// Runtime configuration for the verifier binary.
#[derive(Debug, PartialEq)]
pub struct VerifierConfig {
    /// Address of the reference endpoint.
    pub reference_address: String,
    /// BLOCK duration used by the blocking-read scenario, in milliseconds.
    pub block_timeout_ms: u64,
    /// When set, serve the candidate engine on this address instead of
    /// running the comparison suite.
    pub serve_address: Option<String>,
}

impl VerifierConfig {
    pub fn new<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let mut iter = command_line_args.into_iter().skip(1);
        let mut reference_address: Option<String> = None;
        let mut block_timeout_ms: Option<u64> = None;
        let mut serve_address: Option<String> = None;

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--reference" => {
                    let Some(address) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    };

                    if !address.contains(':') {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    }

                    reference_address = Some(address);
                }
                "--block-timeout" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    };

                    let timeout = value
                        .parse::<u64>()
                        .map_err(|_| CliError::InvalidCommandLineFlagValue)?;

                    block_timeout_ms = Some(timeout);
                }
                "--serve" => {
                    let Some(address) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    };

                    if !address.contains(':') {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    }

                    serve_address = Some(address);
                }
                _ => return Err(CliError::InvalidCommandLineFlag),
            }
        }

        Ok(VerifierConfig {
            reference_address: reference_address.unwrap_or_else(|| "127.0.0.1:6379".to_string()),
            block_timeout_ms: block_timeout_ms.unwrap_or(5000),
            serve_address,
        })
    }
}
