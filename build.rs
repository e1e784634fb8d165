fn main() {
    // Queries are embedded with include_str!, rebuild when any of them change.
    println!("cargo:rerun-if-changed=queries");

    if let Err(e) = built::write_built_file() {
        println!("cargo:warning=failed to acquire build-time information: {e}");
    }
}
