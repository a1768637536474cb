fn main() {
    println!("cargo:rerun-if-changed=proto/transformation.proto");

    volo_build::Builder::protobuf()
        .add_service("proto/transformation.proto")
        .include_dirs(vec![std::path::PathBuf::from(".")])
        .write()
        .unwrap();
}
