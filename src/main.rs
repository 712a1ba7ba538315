use std::path::PathBuf;

use ixa::runner::run_with_args;
use ixa_vaccination::initialize;

fn main() {
    let output_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("output");

    run_with_args(move |context, _, _| initialize(context, &output_path)).unwrap();
}
