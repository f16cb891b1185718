fn main() -> Result<(), Box<dyn std::error::Error>> {
    prost_build::compile_protos(
        &["proto/chunk_data.proto", "proto/malware_pattern_type.proto"],
        &["proto/"],
    )?;
    Ok(())
}
