use std::process::ExitCode;

use iris_roundtrip::harness::{main_check, Backend};

fn main() -> ExitCode {
    main_check(Backend::LightGbm)
}
