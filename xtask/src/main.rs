use std::env;

/// `cargo xtask bundle biquad_filter --release [--target <triple>]`
///
/// A `--target` argument also gets its own target directory, so bundles for different
/// platforms don't overwrite each other.
fn main() -> nih_plug_xtask::Result<()> {
    let args: Vec<String> = env::args().collect();

    if let Some(target) = args
        .iter()
        .position(|arg| arg == "--target")
        .and_then(|pos| args.get(pos + 1))
    {
        env::set_var("CARGO_TARGET_DIR", format!("target/{target}"));
    }

    nih_plug_xtask::main()
}
