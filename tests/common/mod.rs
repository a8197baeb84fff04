pub mod scratch;
pub mod test_utils;
