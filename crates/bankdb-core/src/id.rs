use uuid::Uuid;

/// Generates a short uppercase identifier with the given prefix,
/// e.g. `next_id("TX")` -> `TX-9F04C2A1`.
pub fn next_id(prefix: &str) -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, raw[..8].to_uppercase())
}
