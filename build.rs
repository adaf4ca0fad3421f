fn main() {
    println!("cargo:rerun-if-changed=proto/dnstap.proto");
    prost_build::compile_protos(&["proto/dnstap.proto"], &["proto/"])
        .expect("failed to compile dnstap.proto");
}
