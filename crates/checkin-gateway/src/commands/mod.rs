pub mod check_in;
pub mod serve;
pub mod windows;
