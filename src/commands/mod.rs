mod add;
mod command_error;
mod read;
mod stream_utils;

pub use add::add;
pub use command_error::CommandError;
pub use read::{read, ReadArguments};
pub use stream_utils::{read_result_from_resp, read_result_to_resp};
