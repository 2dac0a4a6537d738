use time::OffsetDateTime;

/// `YYYYMMDD'T'HHMMSS'Z'`, the timestamp layout used by request signing.
pub fn amz_timestamp(t: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}
