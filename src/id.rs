/// Returns 32 lowercase hex characters from a random v4 UUID.
///
/// The value never contains separators, so it can be used as-is in an XML
/// `ID` typed attribute.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
