use std::process::ExitCode;

use iris_roundtrip::harness::{main_train, Backend};

fn main() -> ExitCode {
    main_train(Backend::LightGbm)
}
