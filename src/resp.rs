use thiserror::Error;

/// Errors produced while decoding RESP data.
#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("unknown RESP type")]
    UnknownRespType,
    #[error("failed to parse integer")]
    FailedToParseInteger,
    #[error("invalid bulk string")]
    InvalidBulkString,
    #[error("incomplete RESP input")]
    Incomplete,
}

/// A value in the Redis Serialization Protocol.
///
/// Both endpoints speak this type: the remote endpoint encodes commands and
/// decodes replies with it, and the in-memory endpoint produces it directly
/// from its command registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    NullBulkString,
    NullArray,
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Encodes the value into its wire representation.
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(content) => format!("+{}\r\n", content),
            RespValue::Error(content) => format!("-{}\r\n", content),
            RespValue::Integer(value) => format!(":{}\r\n", value),
            RespValue::BulkString(content) => format!("${}\r\n{}\r\n", content.len(), content),
            RespValue::NullBulkString => "$-1\r\n".to_string(),
            RespValue::NullArray => "*-1\r\n".to_string(),
            RespValue::Array(elements) => {
                let mut encoded = format!("*{}\r\n", elements.len());

                for element in elements {
                    encoded.push_str(&element.encode());
                }

                encoded
            }
        }
    }

    /// Parses a sequence of `\r\n`-separated lines into RESP values.
    ///
    /// Returns every complete top-level value found in the input. Running out
    /// of lines in the middle of a value yields [`RespError::Incomplete`], so
    /// callers accumulating bytes from a socket can distinguish "read more"
    /// from malformed data.
    pub fn parse(lines: Vec<&str>) -> Result<Vec<RespValue>, RespError> {
        let mut values = Vec::new();
        let mut index = 0;

        while index < lines.len() {
            values.push(Self::parse_value(&lines, &mut index)?);
        }

        Ok(values)
    }

    fn parse_value(lines: &[&str], index: &mut usize) -> Result<RespValue, RespError> {
        let Some(line) = lines.get(*index) else {
            return Err(RespError::Incomplete);
        };
        *index += 1;

        if let Some(content) = line.strip_prefix('+') {
            return Ok(RespValue::SimpleString(content.to_string()));
        }

        if let Some(content) = line.strip_prefix('-') {
            return Ok(RespValue::Error(content.to_string()));
        }

        if let Some(content) = line.strip_prefix(':') {
            let value = content
                .parse::<i64>()
                .map_err(|_| RespError::FailedToParseInteger)?;

            return Ok(RespValue::Integer(value));
        }

        if let Some(length_info) = line.strip_prefix('$') {
            if length_info == "-1" {
                return Ok(RespValue::NullBulkString);
            }

            let declared_length = length_info
                .parse::<usize>()
                .map_err(|_| RespError::FailedToParseInteger)?;

            let Some(content) = lines.get(*index) else {
                return Err(RespError::Incomplete);
            };
            *index += 1;

            if content.len() != declared_length {
                return Err(RespError::InvalidBulkString);
            }

            return Ok(RespValue::BulkString(content.to_string()));
        }

        if let Some(length_info) = line.strip_prefix('*') {
            if length_info == "-1" {
                return Ok(RespValue::NullArray);
            }

            let declared_length = length_info
                .parse::<usize>()
                .map_err(|_| RespError::FailedToParseInteger)?;

            let mut elements = Vec::with_capacity(declared_length);

            while elements.len() < declared_length {
                elements.push(Self::parse_value(lines, index)?);
            }

            return Ok(RespValue::Array(elements));
        }

        Err(RespError::UnknownRespType)
    }
}

#[cfg(test)]
mod tests {
    use super::{RespError, RespValue};

    #[test]
    fn test_parse_to_resp_values() {
        let test_cases = vec![
            (
                vec!["*3", "$4", "XADD", "$8", "mystream", "$1", "*"],
                Ok(vec![RespValue::Array(vec![
                    RespValue::BulkString("XADD".into()),
                    RespValue::BulkString("mystream".into()),
                    RespValue::BulkString("*".into()),
                ])]),
            ),
            (
                vec!["*2", "*2", "$8", "mystream", "$3", "0-1", "$2", "ok"],
                Ok(vec![RespValue::Array(vec![
                    RespValue::Array(vec![
                        RespValue::BulkString("mystream".into()),
                        RespValue::BulkString("0-1".into()),
                    ]),
                    RespValue::BulkString("ok".into()),
                ])]),
            ),
            (
                vec!["+PONG", ":42", "-ERR boom"],
                Ok(vec![
                    RespValue::SimpleString("PONG".into()),
                    RespValue::Integer(42),
                    RespValue::Error("ERR boom".into()),
                ]),
            ),
            (vec!["$-1"], Ok(vec![RespValue::NullBulkString])),
            (vec!["*-1"], Ok(vec![RespValue::NullArray])),
            (vec!["*2", "$4", "XADD"], Err(RespError::Incomplete)),
            (vec!["$5", "four"], Err(RespError::InvalidBulkString)),
            (vec!["hello"], Err(RespError::UnknownRespType)),
            (vec![":abc"], Err(RespError::FailedToParseInteger)),
        ];

        for (input, expected) in test_cases {
            assert_eq!(
                RespValue::parse(input.clone()),
                expected,
                "parsing lines {:?}",
                input
            );
        }
    }

    #[test]
    fn test_encode() {
        let test_cases = vec![
            (
                RespValue::SimpleString("OK".to_string()),
                "+OK\r\n".to_string(),
            ),
            (
                RespValue::Error("ERR unknown command".to_string()),
                "-ERR unknown command\r\n".to_string(),
            ),
            (RespValue::Integer(7), ":7\r\n".to_string()),
            (
                RespValue::BulkString("1526919030474-0".to_string()),
                "$15\r\n1526919030474-0\r\n".to_string(),
            ),
            (RespValue::NullBulkString, "$-1\r\n".to_string()),
            (RespValue::NullArray, "*-1\r\n".to_string()),
            (
                RespValue::Array(vec![
                    RespValue::BulkString("mystream".to_string()),
                    RespValue::Array(vec![]),
                ]),
                "*2\r\n$8\r\nmystream\r\n*0\r\n".to_string(),
            ),
        ];

        for (value, expected) in test_cases {
            assert_eq!(value.encode(), expected, "encoding {:?}", value);
        }
    }

    #[test]
    fn test_encode_then_parse_command() {
        let command = RespValue::Array(vec![
            RespValue::BulkString("XREAD".to_string()),
            RespValue::BulkString("STREAMS".to_string()),
            RespValue::BulkString("mystream".to_string()),
            RespValue::BulkString("0".to_string()),
        ]);

        let encoded = command.encode();
        let lines = encoded.split_terminator("\r\n").collect::<Vec<&str>>();

        assert_eq!(RespValue::parse(lines), Ok(vec![command]));
    }
}
